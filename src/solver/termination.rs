//! Termination conditions for the local search.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::TerminationConfig;

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The external cancellation flag was raised.
    Cancelled,
    TimeLimit,
    StepLimit,
    MoveLimit,
    UnimprovedStepLimit,
    /// A full pass over the neighbourhood accepted no move.
    LocalOptimum,
}

impl TerminationReason {
    /// Returns true when the search was stopped from outside.
    pub fn is_early(&self) -> bool {
        matches!(self, TerminationReason::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::TimeLimit => "time limit",
            TerminationReason::StepLimit => "step limit",
            TerminationReason::MoveLimit => "move limit",
            TerminationReason::UnimprovedStepLimit => "unimproved step limit",
            TerminationReason::LocalOptimum => "local optimum",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters the termination checks read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchProgress {
    pub steps: u64,
    pub moves: u64,
    pub steps_since_improvement: u64,
}

/// All configured limits. The first one reached wins.
#[derive(Debug, Clone)]
pub struct Termination {
    time_limit: Option<Duration>,
    step_limit: Option<u64>,
    move_limit: Option<u64>,
    unimproved_step_limit: Option<u64>,
    started: Instant,
}

impl Termination {
    pub fn new(config: &TerminationConfig) -> Self {
        Self {
            time_limit: config.time_limit(),
            step_limit: config.step_count_limit,
            move_limit: config.move_count_limit,
            unimproved_step_limit: config.unimproved_step_count_limit,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Cancellation and the time limit only. Count limits do not apply
    /// before local search has started.
    pub fn check_time(&self, terminate: &AtomicBool) -> Option<TerminationReason> {
        if terminate.load(Ordering::SeqCst) {
            return Some(TerminationReason::Cancelled);
        }
        if self.time_limit.is_some_and(|limit| self.started.elapsed() >= limit) {
            return Some(TerminationReason::TimeLimit);
        }
        None
    }

    /// Returns the reason to stop, if any. Cancellation is checked first.
    pub fn check(&self, terminate: &AtomicBool, progress: &SearchProgress) -> Option<TerminationReason> {
        if let Some(reason) = self.check_time(terminate) {
            return Some(reason);
        }
        if self.step_limit.is_some_and(|limit| progress.steps >= limit) {
            return Some(TerminationReason::StepLimit);
        }
        if self.move_limit.is_some_and(|limit| progress.moves >= limit) {
            return Some(TerminationReason::MoveLimit);
        }
        if self
            .unimproved_step_limit
            .is_some_and(|limit| progress.steps_since_improvement >= limit)
        {
            return Some(TerminationReason::UnimprovedStepLimit);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_limits() -> TerminationConfig {
        TerminationConfig {
            seconds_spent_limit: None,
            millis_spent_limit: None,
            step_count_limit: None,
            move_count_limit: None,
            unimproved_step_count_limit: None,
        }
    }

    #[test]
    fn test_no_limits_never_terminates() {
        let termination = Termination::new(&no_limits());
        let flag = AtomicBool::new(false);
        let progress = SearchProgress {
            steps: u64::MAX,
            moves: u64::MAX,
            steps_since_improvement: u64::MAX,
        };
        assert_eq!(termination.check(&flag, &progress), None);
    }

    #[test]
    fn test_cancellation_wins() {
        let config = TerminationConfig {
            step_count_limit: Some(0),
            ..no_limits()
        };
        let termination = Termination::new(&config);
        let flag = AtomicBool::new(true);
        let reason = termination.check(&flag, &SearchProgress::default());
        assert_eq!(reason, Some(TerminationReason::Cancelled));
        assert!(reason.is_some_and(|r| r.is_early()));
    }

    #[test]
    fn test_count_limits() {
        let flag = AtomicBool::new(false);
        let config = TerminationConfig {
            step_count_limit: Some(10),
            move_count_limit: Some(100),
            unimproved_step_count_limit: Some(3),
            ..no_limits()
        };
        let termination = Termination::new(&config);

        let mut progress = SearchProgress::default();
        assert_eq!(termination.check(&flag, &progress), None);

        progress.steps_since_improvement = 3;
        assert_eq!(
            termination.check(&flag, &progress),
            Some(TerminationReason::UnimprovedStepLimit)
        );

        progress.moves = 100;
        assert_eq!(termination.check(&flag, &progress), Some(TerminationReason::MoveLimit));

        progress.steps = 10;
        assert_eq!(termination.check(&flag, &progress), Some(TerminationReason::StepLimit));
    }

    #[test]
    fn test_time_limit() {
        let config = TerminationConfig {
            millis_spent_limit: Some(0),
            ..no_limits()
        };
        let termination = Termination::new(&config);
        let flag = AtomicBool::new(false);
        assert_eq!(
            termination.check(&flag, &SearchProgress::default()),
            Some(TerminationReason::TimeLimit)
        );
        assert!(!TerminationReason::TimeLimit.is_early());
    }

    #[test]
    fn test_check_time_ignores_count_limits() {
        let config = TerminationConfig {
            step_count_limit: Some(0),
            move_count_limit: Some(0),
            ..no_limits()
        };
        let termination = Termination::new(&config);
        assert_eq!(termination.check_time(&AtomicBool::new(false)), None);
        assert_eq!(
            termination.check_time(&AtomicBool::new(true)),
            Some(TerminationReason::Cancelled)
        );
    }
}
