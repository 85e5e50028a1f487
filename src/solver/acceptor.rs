//! Acceptors decide whether a scored move may become the next step.

use rand::rngs::StdRng;
use rand::Rng;
use std::fmt::Debug;

use crate::config::AcceptorConfig;
use crate::score::HardSoftScore;

/// Accepts or rejects candidate moves during local search.
pub trait Acceptor: Send + Debug {
    /// Returns true if a move resulting in `move_score` should be accepted,
    /// given the previous step's score.
    fn is_accepted(&mut self, last_step_score: HardSoftScore, move_score: HardSoftScore) -> bool;

    /// Called once before the first step.
    fn phase_started(&mut self, _initial_score: HardSoftScore) {}

    /// Called after each step with the accepted score.
    fn step_ended(&mut self, _step_score: HardSoftScore) {}
}

/// Builds the acceptor described by `config`.
pub fn from_config(config: &AcceptorConfig, rng: StdRng) -> Box<dyn Acceptor> {
    match *config {
        AcceptorConfig::LateAcceptance { late_acceptance_size } => {
            Box::new(LateAcceptanceAcceptor::new(late_acceptance_size))
        }
        AcceptorConfig::SimulatedAnnealing {
            starting_temperature,
            decay_rate,
        } => Box::new(SimulatedAnnealingAcceptor::new(
            starting_temperature,
            decay_rate,
            rng,
        )),
        AcceptorConfig::HillClimbing => Box::new(HillClimbingAcceptor),
    }
}

/// Accepts moves that beat the last step or the step score from
/// `late_acceptance_size` steps ago.
#[derive(Debug, Clone)]
pub struct LateAcceptanceAcceptor {
    late_acceptance_size: usize,
    score_history: Vec<Option<HardSoftScore>>,
    current_index: usize,
}

impl LateAcceptanceAcceptor {
    pub fn new(late_acceptance_size: usize) -> Self {
        let size = late_acceptance_size.max(1);
        Self {
            late_acceptance_size: size,
            score_history: vec![None; size],
            current_index: 0,
        }
    }
}

impl Default for LateAcceptanceAcceptor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LATE_ACCEPTANCE_SIZE)
    }
}

impl Acceptor for LateAcceptanceAcceptor {
    fn is_accepted(&mut self, last_step_score: HardSoftScore, move_score: HardSoftScore) -> bool {
        if move_score > last_step_score {
            return true;
        }
        match self.score_history[self.current_index] {
            Some(late_score) => move_score >= late_score,
            None => true,
        }
    }

    fn phase_started(&mut self, initial_score: HardSoftScore) {
        for slot in &mut self.score_history {
            *slot = Some(initial_score);
        }
        self.current_index = 0;
    }

    fn step_ended(&mut self, step_score: HardSoftScore) {
        self.score_history[self.current_index] = Some(step_score);
        self.current_index = (self.current_index + 1) % self.late_acceptance_size;
    }
}

/// Accepts worsening moves with probability `exp(-delta / temperature)`,
/// cooling geometrically after every step.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealingAcceptor {
    starting_temperature: f64,
    current_temperature: f64,
    decay_rate: f64,
    rng: StdRng,
}

impl SimulatedAnnealingAcceptor {
    pub fn new(starting_temperature: f64, decay_rate: f64, rng: StdRng) -> Self {
        Self {
            starting_temperature,
            current_temperature: starting_temperature,
            decay_rate,
            rng,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.current_temperature
    }
}

impl Acceptor for SimulatedAnnealingAcceptor {
    fn is_accepted(&mut self, last_step_score: HardSoftScore, move_score: HardSoftScore) -> bool {
        if move_score >= last_step_score {
            return true;
        }
        if self.current_temperature <= 0.0 {
            return false;
        }
        let delta = last_step_score.to_scalar() - move_score.to_scalar();
        let probability = (-delta / self.current_temperature).exp();
        self.rng.gen::<f64>() < probability
    }

    fn phase_started(&mut self, _initial_score: HardSoftScore) {
        self.current_temperature = self.starting_temperature;
    }

    fn step_ended(&mut self, _step_score: HardSoftScore) {
        self.current_temperature *= self.decay_rate;
    }
}

/// Only accepts strictly improving moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct HillClimbingAcceptor;

impl Acceptor for HillClimbingAcceptor {
    fn is_accepted(&mut self, last_step_score: HardSoftScore, move_score: HardSoftScore) -> bool {
        move_score > last_step_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn score(hard: i64, soft: i64) -> HardSoftScore {
        HardSoftScore::of(hard, soft)
    }

    #[test]
    fn test_hill_climbing_requires_improvement() {
        let mut acceptor = HillClimbingAcceptor;
        assert!(acceptor.is_accepted(score(-1, 0), score(0, -50)));
        assert!(acceptor.is_accepted(score(0, -10), score(0, -9)));
        assert!(!acceptor.is_accepted(score(0, -10), score(0, -10)));
        assert!(!acceptor.is_accepted(score(0, -10), score(-1, 0)));
    }

    #[test]
    fn test_late_acceptance_compares_with_history() {
        let mut acceptor = LateAcceptanceAcceptor::new(3);
        acceptor.phase_started(score(0, -100));

        // Worse than the last step but as good as the late score
        assert!(acceptor.is_accepted(score(0, -50), score(0, -100)));
        assert!(!acceptor.is_accepted(score(0, -50), score(0, -101)));

        acceptor.step_ended(score(0, -50));
        acceptor.step_ended(score(0, -40));
        acceptor.step_ended(score(0, -30));
        // History wrapped, late score is now -50
        assert!(acceptor.is_accepted(score(0, -30), score(0, -50)));
        assert!(!acceptor.is_accepted(score(0, -30), score(0, -60)));
    }

    #[test]
    fn test_late_acceptance_zero_size_clamped() {
        let mut acceptor = LateAcceptanceAcceptor::new(0);
        acceptor.phase_started(score(0, 0));
        acceptor.step_ended(score(0, 1));
        assert!(acceptor.is_accepted(score(0, 1), score(0, 1)));
    }

    #[test]
    fn test_simulated_annealing_probability() {
        let rng = StdRng::seed_from_u64(42);
        let mut acceptor = SimulatedAnnealingAcceptor::new(1.0, 0.5, rng);
        acceptor.phase_started(score(0, 0));

        assert!(acceptor.is_accepted(score(0, -5), score(0, -4)));
        assert!(acceptor.is_accepted(score(0, -5), score(0, -5)));
        // A hard point is worth a million soft points; exp(-1e6) is zero
        assert!(!acceptor.is_accepted(score(0, 0), score(-1, 0)));

        acceptor.step_ended(score(0, 0));
        assert_eq!(acceptor.temperature(), 0.5);
    }

    #[test]
    fn test_simulated_annealing_frozen_rejects_worse() {
        let mut acceptor = SimulatedAnnealingAcceptor::new(0.0, 0.9, StdRng::seed_from_u64(1));
        assert!(!acceptor.is_accepted(score(0, 0), score(0, -1)));
    }

    #[test]
    fn test_simulated_annealing_hot_accepts_small_losses() {
        let mut acceptor = SimulatedAnnealingAcceptor::new(1e9, 0.99, StdRng::seed_from_u64(7));
        let accepted = (0..100)
            .filter(|_| acceptor.is_accepted(score(0, 0), score(0, -1)))
            .count();
        assert!(accepted > 90);
    }

    #[test]
    fn test_from_config() {
        let rng = StdRng::seed_from_u64(0);
        let acceptor = from_config(&AcceptorConfig::HillClimbing, rng.clone());
        assert!(format!("{:?}", acceptor).contains("HillClimbing"));
        let acceptor = from_config(&AcceptorConfig::default(), rng);
        assert!(format!("{:?}", acceptor).contains("LateAcceptance"));
    }
}
