//! Solver service: binds a repository to the session manager.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SolverConfig;
use crate::constraints::{analyze, calculate_score, ScoreAnalysis};
use crate::domain::{ProblemId, Schedule};
use crate::score::HardSoftScore;
use crate::solver::{LoadError, PersistError, SessionError, SessionManager, SessionOutcome, SolverStatus};
use crate::store::{ScheduleRepository, StoreError};

/// Starts, tracks and stops optimizations of the stored timetable.
///
/// # Examples
///
/// ```
/// use dance_timetable::config::SolverConfig;
/// use dance_timetable::demo_data::{generate, DemoData};
/// use dance_timetable::service::SolverService;
/// use dance_timetable::store::InMemoryStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::from_schedule(&generate(DemoData::Small)).unwrap());
/// let service = SolverService::new(store, SolverConfig::default().with_step_limit(20));
///
/// service.solve(1).unwrap();
/// service.wait(1);
///
/// let solution = service.current_solution(1).unwrap();
/// assert!(solution.is_fully_assigned());
/// assert!(solution.score.is_some());
/// ```
pub struct SolverService {
    repository: Arc<dyn ScheduleRepository>,
    manager: SessionManager,
}

impl SolverService {
    pub fn new(repository: Arc<dyn ScheduleRepository>, config: SolverConfig) -> Self {
        Self {
            repository,
            manager: SessionManager::new(config),
        }
    }

    /// Loads problem `id` from the repository and starts solving it in the
    /// background. Every improving solution is written back.
    pub fn solve(&self, id: ProblemId) -> Result<ProblemId, SessionError> {
        info!(problem_id = id, "Starting solver");
        let loader = self.repository.clone();
        let persister = self.repository.clone();
        self.manager.start(
            id,
            move |id| loader.load_problem(id).map_err(LoadError::from),
            move |schedule| persister.save_solution(schedule).map_err(PersistError::from),
        )?;
        Ok(id)
    }

    pub fn status(&self, id: ProblemId) -> SolverStatus {
        self.manager.status(id)
    }

    /// Returns false when no search is running for `id`.
    pub fn terminate_early(&self, id: ProblemId) -> bool {
        let terminated = self.manager.terminate_early(id);
        if !terminated {
            warn!(problem_id = id, "Cannot terminate, solver is not running");
        }
        terminated
    }

    /// The stored schedule with a freshly calculated score. Never waits for
    /// a running search.
    pub fn current_solution(&self, id: ProblemId) -> Result<Schedule, StoreError> {
        let mut schedule = self.repository.current_snapshot(id)?;
        schedule.score = Some(calculate_score(&schedule));
        Ok(schedule)
    }

    /// Per-constraint breakdown of the stored schedule.
    pub fn analyze(&self, id: ProblemId) -> Result<ScoreAnalysis, StoreError> {
        let schedule = self.repository.current_snapshot(id)?;
        Ok(analyze(&schedule))
    }

    pub fn is_fully_assigned(&self, schedule: &Schedule) -> bool {
        schedule.is_fully_assigned()
    }

    pub fn best_score(&self, id: ProblemId) -> Option<HardSoftScore> {
        self.manager.best_score(id)
    }

    pub fn outcome(&self, id: ProblemId) -> Option<SessionOutcome> {
        self.manager.outcome(id)
    }

    /// Blocks until the search for `id` and its writes have finished.
    pub fn wait(&self, id: ProblemId) {
        self.manager.wait(id);
    }

    pub fn list_sessions(&self) -> Vec<ProblemId> {
        self.manager.list_sessions()
    }
}
