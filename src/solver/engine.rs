//! Local search engine: construction followed by a first-accepted
//! improve-or-accept loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::acceptor::{self, Acceptor};
use super::construction::construction_heuristic;
use super::moves::MoveSelector;
use super::termination::{SearchProgress, Termination, TerminationReason};
use crate::config::SolverConfig;
#[cfg(feature = "console")]
use crate::console::{self, PhaseTimer};
use crate::constraints::calculate_score;
use crate::domain::{IntegrityViolation, Schedule};
use crate::score::HardSoftScore;

/// Lifecycle of a [`LocalSearchEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Terminated,
    Failed,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("corrupt schedule: {0}")]
    CorruptSchedule(IntegrityViolation),
}

/// Counters collected over one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStatistics {
    pub construction_moves: u64,
    pub steps: u64,
    pub moves: u64,
    /// Times the best-solution callback fired.
    pub best_solutions: u64,
    pub elapsed: Duration,
}

impl SolveStatistics {
    pub fn moves_per_second(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            ((self.construction_moves + self.moves) as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Outcome of a finished search.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Best schedule found, with its score set.
    pub schedule: Schedule,
    pub score: HardSoftScore,
    pub reason: TerminationReason,
    pub statistics: SolveStatistics,
}

/// Improves a schedule until a termination condition fires.
///
/// # Examples
///
/// ```
/// use dance_timetable::config::SolverConfig;
/// use dance_timetable::demo_data::{generate, DemoData};
/// use dance_timetable::solver::engine::{EngineState, LocalSearchEngine};
/// use std::sync::atomic::AtomicBool;
///
/// let schedule = generate(DemoData::Small);
/// let config = SolverConfig::default().with_random_seed(1).with_step_limit(50);
/// let mut engine = LocalSearchEngine::new(config);
///
/// let mut reported = 0;
/// let result = engine
///     .solve(schedule, &AtomicBool::new(false), |_best| reported += 1)
///     .unwrap();
///
/// assert_eq!(engine.state(), EngineState::Completed);
/// assert!(result.schedule.is_fully_assigned());
/// assert!(reported >= 1);
/// ```
#[derive(Debug)]
pub struct LocalSearchEngine {
    config: SolverConfig,
    state: EngineState,
}

impl LocalSearchEngine {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves `schedule`, calling `on_best` with a validated copy every time
    /// the best score improves. The first call happens after construction.
    ///
    /// Only fully assigned bests are reported while the search runs. If none
    /// was, the final best is reported when the search ends. Nothing is
    /// reported when cancellation or the time limit interrupts construction,
    /// or when cancellation is raised before local search starts.
    ///
    /// Pinned lessons are never changed. Raising `terminate` stops the search
    /// between moves and ends the engine as [`EngineState::Terminated`].
    pub fn solve<F>(
        &mut self,
        schedule: Schedule,
        terminate: &AtomicBool,
        mut on_best: F,
    ) -> Result<SolveResult, SolveError>
    where
        F: FnMut(&Schedule),
    {
        self.state = EngineState::Running;
        let result = self.run(schedule, terminate, &mut on_best);
        self.state = match &result {
            Ok(r) if r.reason.is_early() => EngineState::Terminated,
            Ok(_) => EngineState::Completed,
            Err(_) => EngineState::Failed,
        };
        result
    }

    fn run(
        &self,
        schedule: Schedule,
        terminate: &AtomicBool,
        on_best: &mut dyn FnMut(&Schedule),
    ) -> Result<SolveResult, SolveError> {
        schedule.validate().map_err(SolveError::CorruptSchedule)?;

        let solve_start = Instant::now();
        let termination = Termination::new(&self.config.termination);
        let problem_id = schedule.id;
        let mut working = schedule;
        let mut stats = SolveStatistics::default();
        let mut rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            problem_id,
            lessons = working.lessons.len(),
            timeslots = working.timeslots.len(),
            rooms = working.rooms.len(),
            "Starting solver"
        );

        // Phase 1: construction
        let (mut current_score, interrupted) = if self.config.construction_heuristic {
            #[cfg(feature = "console")]
            let mut ch_timer = PhaseTimer::start("ConstructionHeuristic", 0);
            let construction = construction_heuristic(&mut working, &termination, terminate);
            stats.construction_moves = construction.moves;
            debug!(
                problem_id,
                assigned = construction.assigned,
                moves = construction.moves,
                score = %construction.score,
                "Construction heuristic ended"
            );
            #[cfg(feature = "console")]
            {
                ch_timer.record_accepted(construction.score);
                ch_timer.finish();
            }
            (construction.score, construction.interrupted)
        } else {
            (calculate_score(&working), None)
        };

        let interrupted = interrupted.or_else(|| {
            terminate
                .load(Ordering::SeqCst)
                .then_some(TerminationReason::Cancelled)
        });
        if let Some(reason) = interrupted {
            stats.elapsed = solve_start.elapsed();
            warn!(
                problem_id,
                assigned = working.assigned_count(),
                reason = %reason,
                "Stopped before local search, no solution reported"
            );
            return Ok(SolveResult {
                schedule: snapshot(&working, current_score)?,
                score: current_score,
                reason,
                statistics: stats,
            });
        }

        #[cfg(feature = "console")]
        console::print_solving_started(
            solve_start.elapsed(),
            current_score,
            working.movable_lessons().len(),
            working.timeslots.len() * working.rooms.len(),
        );

        let mut best_score = current_score;
        let mut best = snapshot(&working, best_score)?;
        if best.is_fully_assigned() {
            stats.best_solutions += 1;
            on_best(&best);
        }

        // Phase 2: local search
        let mut selector = MoveSelector::new(StdRng::seed_from_u64(rng.gen()));
        let mut acceptor = acceptor::from_config(
            &self.config.acceptor,
            StdRng::seed_from_u64(rng.gen()),
        );
        acceptor.phase_started(current_score);

        #[cfg(feature = "console")]
        let mut ls_timer = PhaseTimer::start("LocalSearch", 1);
        debug!(problem_id, acceptor = ?self.config.acceptor, "Local search started");

        let mut progress = SearchProgress::default();
        let reason = 'search: loop {
            if let Some(reason) = termination.check(terminate, &progress) {
                break reason;
            }

            let mut accepted = None;
            for mv in selector.pass(&working) {
                if let Some(reason) = termination.check(terminate, &progress) {
                    break 'search reason;
                }
                if !mv.is_doable(&working) {
                    trace!(problem_id, ?mv, "Discarding move that is not doable");
                    continue;
                }

                progress.moves += 1;
                #[cfg(feature = "console")]
                ls_timer.record_move();

                let undo = mv.do_move(&mut working);
                let move_score = calculate_score(&working);

                if is_step_accepted(acceptor.as_mut(), best_score, current_score, move_score) {
                    accepted = Some(move_score);
                    break;
                }
                undo.apply(&mut working);
            }

            let Some(step_score) = accepted else {
                break TerminationReason::LocalOptimum;
            };

            progress.steps += 1;
            acceptor.step_ended(step_score);
            current_score = step_score;
            #[cfg(feature = "console")]
            ls_timer.record_accepted(step_score);

            if step_score > best_score {
                best_score = step_score;
                progress.steps_since_improvement = 0;
                best = snapshot(&working, best_score)?;
                debug!(
                    problem_id,
                    score = %best_score,
                    steps = progress.steps,
                    moves = progress.moves,
                    "New best solution"
                );
                if best.is_fully_assigned() {
                    stats.best_solutions += 1;
                    on_best(&best);
                }
            } else {
                progress.steps_since_improvement += 1;
            }

            if progress.steps % 1000 == 0 {
                trace!(
                    problem_id,
                    steps = progress.steps,
                    moves = progress.moves,
                    score = %current_score,
                    "Local search progress"
                );
            }
        };

        #[cfg(feature = "console")]
        ls_timer.finish();

        if stats.best_solutions == 0 && !reason.is_early() {
            stats.best_solutions += 1;
            on_best(&best);
        }

        stats.steps = progress.steps;
        stats.moves = progress.moves;
        stats.elapsed = solve_start.elapsed();

        #[cfg(feature = "console")]
        console::print_solving_ended(
            stats.elapsed,
            stats.construction_moves + stats.moves,
            2,
            best_score,
        );

        info!(
            problem_id,
            score = %best_score,
            steps = stats.steps,
            moves = stats.moves,
            reason = %reason,
            "Solving ended"
        );

        Ok(SolveResult {
            schedule: best,
            score: best_score,
            reason,
            statistics: stats,
        })
    }
}

/// Asks the acceptor about a move, except that once a feasible best exists a
/// move that lowers the hard score of the current step is always rejected.
fn is_step_accepted(
    acceptor: &mut dyn Acceptor,
    best_score: HardSoftScore,
    current_score: HardSoftScore,
    move_score: HardSoftScore,
) -> bool {
    if best_score.is_feasible() && move_score.hard() < current_score.hard() {
        return false;
    }
    acceptor.is_accepted(current_score, move_score)
}

/// Deep copy of the working schedule with its score, checked for integrity.
fn snapshot(working: &Schedule, score: HardSoftScore) -> Result<Schedule, SolveError> {
    let mut copy = working.clone();
    copy.score = Some(score);
    copy.validate().map_err(SolveError::CorruptSchedule)?;
    Ok(copy)
}
