//! Session manager: one background search per problem id.
//!
//! Every session owns a worker thread that loads and solves the schedule, and
//! a persister thread fed through a bounded queue so slow storage never
//! stalls the search.

use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::engine::{LocalSearchEngine, SolveError};
use crate::config::SolverConfig;
use crate::domain::{ProblemId, Schedule};
use crate::score::HardSoftScore;

/// Status of a solving session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    /// No search is scheduled or running.
    NotSolving,
    /// Accepted; the problem is still being loaded.
    SolvingScheduled,
    /// The engine is searching.
    SolvingActive,
}

impl SolverStatus {
    /// Returns the status as a SCREAMING_SNAKE_CASE string for API responses.
    ///
    /// ```
    /// use dance_timetable::solver::SolverStatus;
    ///
    /// assert_eq!(SolverStatus::NotSolving.as_str(), "NOT_SOLVING");
    /// assert_eq!(SolverStatus::SolvingScheduled.as_str(), "SOLVING_SCHEDULED");
    /// assert_eq!(SolverStatus::SolvingActive.as_str(), "SOLVING_ACTIVE");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::NotSolving => "NOT_SOLVING",
            SolverStatus::SolvingScheduled => "SOLVING_SCHEDULED",
            SolverStatus::SolvingActive => "SOLVING_ACTIVE",
        }
    }

    pub fn is_solving(self) -> bool {
        self != SolverStatus::NotSolving
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SolverStatus::SolvingScheduled,
            2 => SolverStatus::SolvingActive,
            _ => SolverStatus::NotSolving,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    /// Stopped by [`SessionManager::terminate_early`].
    Terminated,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("problem {0} not found")]
    NotFound(ProblemId),

    #[error("failed to load problem: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("lesson {0} no longer exists")]
    LessonNotFound(u64),

    #[error("failed to persist solution: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("problem {0} is already being solved")]
    AlreadySolving(ProblemId),

    #[error("failed to spawn solver thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error)]
enum SessionFailure {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error("solver panicked: {0}")]
    Panic(String),
}

/// Finished sessions kept for status and outcome queries.
pub const DEFAULT_RETAINED_SESSIONS: usize = 64;

struct Session {
    id: ProblemId,
    /// Start order, used to evict the oldest finished sessions.
    seq: u64,
    status: AtomicU8,
    terminate: AtomicBool,
    best_score: Mutex<Option<HardSoftScore>>,
    outcome: Mutex<Option<SessionOutcome>>,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

impl Session {
    fn new(id: ProblemId, seq: u64) -> Self {
        Self {
            id,
            seq,
            status: AtomicU8::new(SolverStatus::SolvingScheduled as u8),
            terminate: AtomicBool::new(false),
            best_score: Mutex::new(None),
            outcome: Mutex::new(None),
            finished: Mutex::new(false),
            finished_cv: Condvar::new(),
        }
    }

    fn status(&self) -> SolverStatus {
        SolverStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: SolverStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    fn finish(&self, outcome: SessionOutcome) {
        *self.outcome.lock() = Some(outcome);
        self.set_status(SolverStatus::NotSolving);
        let mut finished = self.finished.lock();
        *finished = true;
        self.finished_cv.notify_all();
    }

    fn is_finished(&self) -> bool {
        *self.finished.lock()
    }

    fn wait(&self) {
        let mut finished = self.finished.lock();
        while !*finished {
            self.finished_cv.wait(&mut finished);
        }
    }
}

/// Runs at most one search per problem id, each on its own worker thread.
///
/// # Examples
///
/// ```
/// use dance_timetable::config::SolverConfig;
/// use dance_timetable::demo_data::{generate, DemoData};
/// use dance_timetable::solver::{SessionManager, SessionOutcome, SolverStatus};
///
/// let manager = SessionManager::new(SolverConfig::default().with_step_limit(20));
/// manager
///     .start(1, |_| Ok(generate(DemoData::Small)), |_best| Ok(()))
///     .unwrap();
///
/// manager.wait(1);
/// assert_eq!(manager.status(1), SolverStatus::NotSolving);
/// assert_eq!(manager.outcome(1), Some(SessionOutcome::Completed));
/// assert!(manager.best_score(1).is_some());
/// ```
pub struct SessionManager {
    sessions: RwLock<HashMap<ProblemId, Arc<Session>>>,
    config: SolverConfig,
    next_seq: AtomicU64,
    retained: usize,
}

impl SessionManager {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            next_seq: AtomicU64::new(0),
            retained: DEFAULT_RETAINED_SESSIONS,
        }
    }

    /// Keeps at most `retained` finished sessions. Older ones are forgotten
    /// when a new session starts and then report as unknown ids.
    pub fn with_retained_sessions(mut self, retained: usize) -> Self {
        self.retained = retained;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Starts solving problem `id` in the background.
    ///
    /// `loader` runs on the worker thread; `persister` runs on a dedicated
    /// thread for every improving solution, and always for the final best.
    pub fn start<L, P>(&self, id: ProblemId, loader: L, persister: P) -> Result<(), SessionError>
    where
        L: FnOnce(ProblemId) -> Result<Schedule, LoadError> + Send + 'static,
        P: Fn(&Schedule) -> Result<(), PersistError> + Send + 'static,
    {
        let session = {
            let mut sessions = self.sessions.write();
            if sessions.get(&id).is_some_and(|s| s.status().is_solving()) {
                return Err(SessionError::AlreadySolving(id));
            }
            self.evict_finished(&mut sessions);
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            let session = Arc::new(Session::new(id, seq));
            sessions.insert(id, session.clone());
            session
        };

        let worker = session.clone();
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name(format!("solver-{}", id))
            .spawn(move || run_session(worker, config, loader, persister));

        if let Err(e) = spawned {
            error!(problem_id = id, error = %e, "Failed to spawn solver thread");
            session.finish(SessionOutcome::Failed(e.to_string()));
            return Err(SessionError::Spawn(e));
        }

        info!(problem_id = id, "Solving scheduled");
        Ok(())
    }

    /// Unknown ids report [`SolverStatus::NotSolving`].
    pub fn status(&self, id: ProblemId) -> SolverStatus {
        self.session(id)
            .map(|s| s.status())
            .unwrap_or(SolverStatus::NotSolving)
    }

    /// Asks a scheduled or active session to stop. Returns false if there is
    /// nothing to stop.
    pub fn terminate_early(&self, id: ProblemId) -> bool {
        match self.session(id) {
            Some(session) if session.status().is_solving() => {
                session.terminate.store(true, Ordering::SeqCst);
                info!(problem_id = id, "Early termination requested");
                true
            }
            _ => false,
        }
    }

    /// Final outcome, once the session has ended.
    pub fn outcome(&self, id: ProblemId) -> Option<SessionOutcome> {
        self.session(id).and_then(|s| s.outcome.lock().clone())
    }

    /// Score of the last best solution reported by the session.
    pub fn best_score(&self, id: ProblemId) -> Option<HardSoftScore> {
        self.session(id).and_then(|s| *s.best_score.lock())
    }

    /// Blocks until the session's worker and persister have finished.
    /// Returns immediately for unknown ids.
    pub fn wait(&self, id: ProblemId) {
        if let Some(session) = self.session(id) {
            session.wait();
        }
    }

    /// Ids of all known sessions, in ascending order.
    pub fn list_sessions(&self) -> Vec<ProblemId> {
        let mut ids: Vec<ProblemId> = self.sessions.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn evict_finished(&self, sessions: &mut HashMap<ProblemId, Arc<Session>>) {
        let mut finished: Vec<(u64, ProblemId)> = sessions
            .values()
            .filter(|s| s.is_finished())
            .map(|s| (s.seq, s.id))
            .collect();
        if finished.len() <= self.retained {
            return;
        }
        finished.sort_unstable();
        let excess = finished.len() - self.retained;
        for (_, id) in finished.into_iter().take(excess) {
            sessions.remove(&id);
            debug!(problem_id = id, "Evicted finished session");
        }
    }

    fn session(&self, id: ProblemId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

fn run_session<L, P>(session: Arc<Session>, config: SolverConfig, loader: L, persister: P)
where
    L: FnOnce(ProblemId) -> Result<Schedule, LoadError>,
    P: Fn(&Schedule) -> Result<(), PersistError> + Send + 'static,
{
    let id = session.id;
    let (tx, rx) = mpsc::sync_channel::<Schedule>(config.best_solution_queue_capacity.max(1));

    let persister_thread = thread::Builder::new()
        .name(format!("persister-{}", id))
        .spawn(move || {
            for schedule in rx {
                if let Err(e) = persister(&schedule) {
                    warn!(problem_id = id, error = %e, "Failed to persist best solution");
                }
            }
        });
    let persister_thread = match persister_thread {
        Ok(handle) => handle,
        Err(e) => {
            error!(problem_id = id, error = %e, "Failed to spawn persister thread");
            session.finish(SessionOutcome::Failed(e.to_string()));
            return;
        }
    };

    // Newest best that did not fit in the queue.
    let mut pending: Option<Schedule> = None;

    let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<_, SessionFailure> {
        let schedule = loader(id)?;
        session.set_status(SolverStatus::SolvingActive);
        info!(problem_id = id, lessons = schedule.lessons.len(), "Solving started");

        let mut engine = LocalSearchEngine::new(config);
        let result = engine.solve(schedule, &session.terminate, |best| {
            *session.best_score.lock() = best.score;
            match tx.try_send(best.clone()) {
                Ok(()) => pending = None,
                Err(TrySendError::Full(schedule)) => pending = Some(schedule),
                Err(TrySendError::Disconnected(_)) => {
                    warn!(problem_id = id, "Persister is gone, dropping best solution");
                }
            }
        })?;
        Ok(result)
    }))
    .unwrap_or_else(|payload| Err(SessionFailure::Panic(panic_message(payload.as_ref()))));

    if let Some(schedule) = pending.take() {
        if tx.send(schedule).is_err() {
            warn!(problem_id = id, "Persister is gone, dropping final best solution");
        }
    }
    drop(tx);
    if persister_thread.join().is_err() {
        error!(problem_id = id, "Persister thread panicked");
    }

    let outcome = match result {
        Ok(result) if result.reason.is_early() => {
            info!(problem_id = id, score = %result.score, "Solving terminated early");
            SessionOutcome::Terminated
        }
        Ok(result) => {
            info!(problem_id = id, score = %result.score, reason = %result.reason, "Solving completed");
            SessionOutcome::Completed
        }
        Err(failure) => {
            error!(problem_id = id, error = %failure, "Solving failed");
            SessionOutcome::Failed(failure.to_string())
        }
    };
    session.finish(outcome);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{generate, DemoData};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn quick_manager() -> SessionManager {
        SessionManager::new(
            SolverConfig::default()
                .with_random_seed(5)
                .with_time_limit(Duration::from_secs(5))
                .with_step_limit(100),
        )
    }

    fn long_manager() -> SessionManager {
        SessionManager::new(
            SolverConfig::default()
                .with_random_seed(5)
                .with_time_limit(Duration::from_secs(60)),
        )
    }

    #[test]
    fn test_unknown_id() {
        let manager = quick_manager();
        assert_eq!(manager.status(42), SolverStatus::NotSolving);
        assert!(!manager.terminate_early(42));
        assert_eq!(manager.outcome(42), None);
        assert_eq!(manager.best_score(42), None);
        manager.wait(42);
        assert!(manager.list_sessions().is_empty());
    }

    #[test]
    fn test_completes_and_persists_final_best() {
        let manager = quick_manager();
        let saved: Arc<Mutex<Vec<HardSoftScore>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = saved.clone();

        manager
            .start(
                1,
                |id| {
                    let mut schedule = generate(DemoData::Small);
                    schedule.id = id;
                    Ok(schedule)
                },
                move |best| {
                    assert_eq!(best.id, 1);
                    sink.lock().extend(best.score);
                    Ok(())
                },
            )
            .unwrap();
        manager.wait(1);

        assert_eq!(manager.status(1), SolverStatus::NotSolving);
        assert_eq!(manager.outcome(1), Some(SessionOutcome::Completed));
        let saved = saved.lock();
        assert!(!saved.is_empty());
        assert_eq!(saved.last().copied(), manager.best_score(1));
        assert_eq!(manager.list_sessions(), vec![1]);
    }

    #[test]
    fn test_rejects_second_start_while_solving() {
        let manager = long_manager();
        manager
            .start(7, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
            .unwrap();

        let err = manager
            .start(7, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadySolving(7)));

        assert!(manager.terminate_early(7));
        manager.wait(7);
        assert_eq!(manager.outcome(7), Some(SessionOutcome::Terminated));
        assert!(!manager.terminate_early(7));

        // A fresh session for the same id may start once the old one ended
        manager
            .start(7, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
            .unwrap();
        assert!(manager.terminate_early(7));
        manager.wait(7);
    }

    #[test]
    fn test_terminate_early_on_idle_id_leaves_persisted_state() {
        let manager = quick_manager();
        let persisted = Arc::new(AtomicUsize::new(0));
        let counter = persisted.clone();

        manager
            .start(3, |_| Ok(generate(DemoData::Small)), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        manager.wait(3);
        let writes = persisted.load(Ordering::SeqCst);

        assert!(!manager.terminate_early(3));
        assert!(!manager.terminate_early(99));
        assert_eq!(persisted.load(Ordering::SeqCst), writes);
        assert_eq!(manager.outcome(3), Some(SessionOutcome::Completed));
    }

    #[test]
    fn test_loader_failure_is_failed() {
        let manager = quick_manager();
        manager
            .start(5, |id| Err(LoadError::NotFound(id)), |_| Ok(()))
            .unwrap();
        manager.wait(5);

        assert_eq!(manager.status(5), SolverStatus::NotSolving);
        match manager.outcome(5) {
            Some(SessionOutcome::Failed(reason)) => assert!(reason.contains("not found")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(manager.best_score(5), None);
    }

    #[test]
    fn test_panic_is_failed_and_restartable() {
        let manager = quick_manager();
        manager
            .start(6, |_| -> Result<Schedule, LoadError> { panic!("boom") }, |_| Ok(()))
            .unwrap();
        manager.wait(6);
        assert_eq!(
            manager.outcome(6),
            Some(SessionOutcome::Failed("solver panicked: boom".to_string()))
        );

        manager
            .start(6, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
            .unwrap();
        manager.wait(6);
        assert_eq!(manager.outcome(6), Some(SessionOutcome::Completed));
    }

    #[test]
    fn test_corrupt_schedule_fails_without_persisting() {
        let manager = quick_manager();
        let persisted = Arc::new(AtomicUsize::new(0));
        let counter = persisted.clone();
        manager
            .start(
                8,
                |_| {
                    let mut schedule = generate(DemoData::Small);
                    schedule.lessons[0].room = Some(999);
                    Ok(schedule)
                },
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap();
        manager.wait(8);

        assert!(matches!(manager.outcome(8), Some(SessionOutcome::Failed(_))));
        assert_eq!(persisted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_persist_errors_do_not_stop_search() {
        let manager = quick_manager();
        manager
            .start(
                9,
                |_| Ok(generate(DemoData::Small)),
                |_| Err(PersistError::Storage("disk full".into())),
            )
            .unwrap();
        manager.wait(9);
        assert_eq!(manager.outcome(9), Some(SessionOutcome::Completed));
    }

    #[test]
    fn test_slow_persister_still_gets_final_best() {
        let manager = SessionManager::new(
            SolverConfig::default()
                .with_random_seed(11)
                .with_time_limit(Duration::from_secs(5))
                .with_step_limit(2_000),
        );
        let last: Arc<Mutex<Option<HardSoftScore>>> = Arc::new(Mutex::new(None));
        let sink = last.clone();
        manager
            .start(10, |_| Ok(generate(DemoData::Small)), move |best| {
                thread::sleep(Duration::from_millis(5));
                *sink.lock() = best.score;
                Ok(())
            })
            .unwrap();
        manager.wait(10);

        assert_eq!(*last.lock(), manager.best_score(10));
    }

    #[test]
    fn test_distinct_ids_run_concurrently() {
        let manager = long_manager();
        for id in 20..23 {
            manager
                .start(id, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
                .unwrap();
        }
        for id in 20..23 {
            assert!(manager.status(id).is_solving());
        }
        for id in 20..23 {
            assert!(manager.terminate_early(id));
        }
        for id in 20..23 {
            manager.wait(id);
            assert_eq!(manager.outcome(id), Some(SessionOutcome::Terminated));
        }
        assert_eq!(manager.list_sessions(), vec![20, 21, 22]);
    }

    #[test]
    fn test_oldest_finished_sessions_are_evicted() {
        let manager = quick_manager().with_retained_sessions(2);
        for id in 1..=4 {
            manager
                .start(id, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
                .unwrap();
            manager.wait(id);
        }

        // Sessions 1 to 3 were finished when 4 started, one over the limit
        assert_eq!(manager.list_sessions(), vec![2, 3, 4]);
        assert_eq!(manager.outcome(1), None);
        assert_eq!(manager.status(1), SolverStatus::NotSolving);
        assert_eq!(manager.outcome(2), Some(SessionOutcome::Completed));
    }

    #[test]
    fn test_running_sessions_are_never_evicted() {
        let manager = long_manager().with_retained_sessions(0);
        manager
            .start(30, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
            .unwrap();
        manager
            .start(31, |_| Ok(generate(DemoData::Small)), |_| Ok(()))
            .unwrap();
        assert_eq!(manager.list_sessions(), vec![30, 31]);

        for id in [30, 31] {
            assert!(manager.terminate_early(id));
            manager.wait(id);
        }
    }
}
