//! Error Types
//!
//! Errors are split by the boundary that reports them:
//! - [`TaskError`]: a fault raised while advancing a task
//! - [`RunnerError`]: a runner could not accept or drive work
//! - [`RoutineError`]: a task routine was misused or could not be scheduled

use std::any::Any;
use std::io;

/// A fault raised while advancing a task.
///
/// Faults are recovered at the run boundary (task routine or runner) and are
/// never retried. The type is `Clone` so the same fault can be handed to a
/// fault callback and stored on the run's [`Continuator`](crate::Continuator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task returned an error from `advance()`.
    #[error("task failed: {0}")]
    Failed(String),

    /// The task panicked while being advanced.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Creates a [`TaskError::Failed`] from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Converts a panic payload caught with `catch_unwind` into a fault.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// Errors reported by runners.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("runner '{runner}' has been disposed")]
    Disposed { runner: String },

    #[error("failed to spawn worker thread for runner '{runner}': {source}")]
    Spawn {
        runner: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid runner config: {0}")]
    InvalidConfig(String),

    #[error("failed to read runner config {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse runner config: {0}")]
    ParseConfig(#[from] serde_yaml::Error),
}

/// Errors reported synchronously by [`TaskRoutine::start`](crate::TaskRoutine::start).
#[derive(Debug, thiserror::Error)]
pub enum RoutineError {
    #[error("task routine '{routine}' has no runner bound")]
    NoRunner { routine: String },

    #[error("task routine '{routine}' has no task or task factory set")]
    NoTask { routine: String },

    #[error(transparent)]
    Runner(#[from] RunnerError),
}
