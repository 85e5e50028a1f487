//! Timetable optimization engine.
//!
//! - [`moves`]: change and swap moves plus the randomized move selector
//! - [`construction`]: first-fit construction heuristic
//! - [`acceptor`]: late acceptance, simulated annealing and hill climbing
//! - [`termination`]: time, count and cancellation limits
//! - [`engine`]: the local search loop
//! - [`manager`]: background sessions keyed by problem id

pub mod acceptor;
pub mod construction;
pub mod engine;
pub mod manager;
pub mod moves;
pub mod termination;

pub use engine::{EngineState, LocalSearchEngine, SolveError, SolveResult, SolveStatistics};
pub use manager::{
    LoadError, PersistError, SessionError, SessionManager, SessionOutcome, SolverStatus,
};
pub use termination::TerminationReason;
