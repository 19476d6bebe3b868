//! Runner Configuration
//!
//! Settings shared by the threaded runners, loadable from YAML:
//!
//! ```yaml
//! name: background
//! tick_interval_ms: 1
//! relaxed: true
//! record_timeline: false
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// Worker count used when no explicit thread count is given.
pub static DEFAULT_WORKER_THREADS: Lazy<usize> = Lazy::new(|| num_cpus::get().max(1));

/// How a runner paces its passes over scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pacing {
    /// Wait this long between passes.
    Interval(Duration),
    /// Yield the thread between passes.
    Yield,
    /// Busy-spin between passes.
    Spin,
}

/// Configuration for a runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Diagnostic name, also used for the worker thread name.
    pub name: String,

    /// Minimum delay between passes in milliseconds. `None` or `0` runs
    /// passes back to back.
    pub tick_interval_ms: Option<u64>,

    /// Yield the CPU between back-to-back passes instead of busy-spinning.
    pub relaxed: bool,

    /// Record run lifecycle events on a [`Timeline`](crate::monitoring::Timeline).
    pub record_timeline: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "runner".to_string(),
            tick_interval_ms: None,
            relaxed: true,
            record_timeline: false,
        }
    }
}

impl RunnerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Paces the runner to one pass every `ms` milliseconds.
    pub fn with_tick_interval(mut self, ms: u64) -> Self {
        self.tick_interval_ms = Some(ms);
        self
    }

    /// Busy-spins between passes instead of yielding.
    pub fn with_spin_loop(mut self) -> Self {
        self.tick_interval_ms = None;
        self.relaxed = false;
        self
    }

    pub fn with_timeline(mut self, record: bool) -> Self {
        self.record_timeline = record;
        self
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.name.trim().is_empty() {
            return Err(RunnerError::InvalidConfig(
                "runner name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RunnerError> {
        let config: RunnerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn pacing(&self) -> Pacing {
        match self.tick_interval_ms {
            Some(ms) if ms > 0 => Pacing::Interval(Duration::from_millis(ms)),
            _ if self.relaxed => Pacing::Yield,
            _ => Pacing::Spin,
        }
    }
}

/// Loads a runner configuration from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use taskrunner::runner::{load_runner_config, MultiThreadRunner};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_runner_config("runner.yaml")?;
///     let runner = MultiThreadRunner::with_config(config)?;
///     runner.dispose();
///     Ok(())
/// }
/// ```
pub fn load_runner_config(path: impl AsRef<Path>) -> Result<RunnerConfig, RunnerError> {
    let path = path.as_ref();
    info!("Loading runner config from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| RunnerError::ReadConfig {
        path: path.display().to_string(),
        source,
    })?;
    debug!("Runner config loaded ({} bytes)", content.len());

    RunnerConfig::from_yaml_str(&content)
}
