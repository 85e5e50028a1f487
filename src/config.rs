//! Solver configuration.
//!
//! Load from a TOML file to tune termination and acceptance without code
//! changes.
//!
//! # Examples
//!
//! ```
//! use dance_timetable::config::{AcceptorConfig, SolverConfig};
//! use std::time::Duration;
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     random_seed = 7
//!
//!     [termination]
//!     seconds_spent_limit = 10
//!     unimproved_step_count_limit = 5000
//!
//!     [acceptor]
//!     type = "simulated_annealing"
//!     starting_temperature = 2.0
//!     decay_rate = 0.999
//! "#).unwrap();
//!
//! assert_eq!(config.time_limit(), Some(Duration::from_secs(10)));
//! assert!(matches!(config.acceptor, AcceptorConfig::SimulatedAnnealing { .. }));
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default solving time: 30 seconds.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 30;

/// Late acceptance history size.
pub const DEFAULT_LATE_ACCEPTANCE_SIZE: usize = 400;

/// Number of best solutions that may wait for the persister.
pub const DEFAULT_BEST_SOLUTION_QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main solver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SolverConfig {
    /// Random seed for reproducible runs; random when absent.
    pub random_seed: Option<u64>,
    /// Run the first-fit construction heuristic before local search.
    pub construction_heuristic: bool,
    /// Capacity of the queue between the search and the persister.
    pub best_solution_queue_capacity: usize,
    pub termination: TerminationConfig,
    pub acceptor: AcceptorConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            random_seed: None,
            construction_heuristic: true,
            best_solution_queue_capacity: DEFAULT_BEST_SOLUTION_QUEUE_CAPACITY,
            termination: TerminationConfig::default(),
            acceptor: AcceptorConfig::default(),
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SolverConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.best_solution_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "best_solution_queue_capacity must be at least 1".into(),
            ));
        }
        match self.acceptor {
            AcceptorConfig::LateAcceptance { late_acceptance_size } if late_acceptance_size == 0 => {
                Err(ConfigError::Invalid("late_acceptance_size must be at least 1".into()))
            }
            AcceptorConfig::SimulatedAnnealing {
                starting_temperature,
                decay_rate,
            } if starting_temperature < 0.0 || !(0.0..=1.0).contains(&decay_rate) => {
                Err(ConfigError::Invalid(
                    "simulated annealing needs a non-negative temperature and a decay rate in [0, 1]"
                        .into(),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.termination.seconds_spent_limit = None;
        self.termination.millis_spent_limit = Some(limit.as_millis() as u64);
        self
    }

    pub fn with_step_limit(mut self, steps: u64) -> Self {
        self.termination.step_count_limit = Some(steps);
        self
    }

    pub fn with_unimproved_step_limit(mut self, steps: u64) -> Self {
        self.termination.unimproved_step_count_limit = Some(steps);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_acceptor(mut self, acceptor: AcceptorConfig) -> Self {
        self.acceptor = acceptor;
        self
    }

    /// Returns the termination time limit, if configured.
    pub fn time_limit(&self) -> Option<Duration> {
        self.termination.time_limit()
    }
}

/// When to stop searching. All configured limits apply; the first reached wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TerminationConfig {
    pub seconds_spent_limit: Option<u64>,
    pub millis_spent_limit: Option<u64>,
    pub step_count_limit: Option<u64>,
    pub move_count_limit: Option<u64>,
    /// Stop after this many steps without a new best solution.
    pub unimproved_step_count_limit: Option<u64>,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            seconds_spent_limit: Some(DEFAULT_TIME_LIMIT_SECS),
            millis_spent_limit: None,
            step_count_limit: None,
            move_count_limit: None,
            unimproved_step_count_limit: None,
        }
    }
}

impl TerminationConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        let secs = self.seconds_spent_limit.map(Duration::from_secs);
        let millis = self.millis_spent_limit.map(Duration::from_millis);
        match (secs, millis) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Local search acceptance strategy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcceptorConfig {
    LateAcceptance {
        #[serde(default = "default_late_acceptance_size")]
        late_acceptance_size: usize,
    },
    SimulatedAnnealing {
        starting_temperature: f64,
        decay_rate: f64,
    },
    HillClimbing,
}

fn default_late_acceptance_size() -> usize {
    DEFAULT_LATE_ACCEPTANCE_SIZE
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        AcceptorConfig::LateAcceptance {
            late_acceptance_size: DEFAULT_LATE_ACCEPTANCE_SIZE,
        }
    }
}
