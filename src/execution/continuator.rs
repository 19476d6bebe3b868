//! Continuator
//!
//! The handle returned for every scheduled run. It can be polled, blocked
//! on, or yielded from another task to wait for the run to finish.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::error::TaskError;
use crate::task::{Step, Task};

use super::lock;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The root task terminated normally.
    Completed,
    /// The root task yielded `Break`.
    Broken,
    /// The run observed a stop request at a step boundary.
    Stopped,
    /// A step returned an error or panicked.
    Faulted(TaskError),
    /// A newer start of the same routine replaced this run.
    Superseded,
    /// The runner was disposed before the run finished.
    Abandoned,
}

impl Outcome {
    /// True for the two clean terminations: completion and break.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Broken)
    }
}

struct Shared {
    completed: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
    value: Mutex<Option<Value>>,
    signal: Condvar,
}

/// Cross-thread handle to one in-flight run.
///
/// Clones observe the same run. The runner marks it complete exactly once,
/// from the thread driving the run, after every run callback has fired.
///
/// A continuator is itself a [`Task`]: yielding it from another task suspends
/// that task until the run finishes, even when the run lives on a different
/// runner. If the run faulted, the fault is re-raised in the waiting task.
#[derive(Clone)]
pub struct Continuator {
    shared: Arc<Shared>,
}

impl Continuator {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                completed: AtomicBool::new(false),
                outcome: Mutex::new(None),
                value: Mutex::new(None),
                signal: Condvar::new(),
            }),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// Returns `true` while the run is still going.
    pub fn advance_or_complete(&self) -> bool {
        !self.is_completed()
    }

    /// The outcome, once the run has finished.
    pub fn outcome(&self) -> Option<Outcome> {
        lock(&self.shared.outcome).clone()
    }

    /// The fault that ended the run, if any.
    pub fn fault(&self) -> Option<TaskError> {
        match self.outcome() {
            Some(Outcome::Faulted(e)) => Some(e),
            _ => None,
        }
    }

    /// The last [`Yield::Value`](crate::task::Yield::Value) produced by the
    /// root task.
    pub fn value(&self) -> Option<Value> {
        lock(&self.shared.value).clone()
    }

    /// Blocks until the run finishes.
    pub fn wait(&self) -> Outcome {
        let mut outcome = lock(&self.shared.outcome);
        loop {
            if let Some(outcome) = outcome.as_ref() {
                return outcome.clone();
            }
            outcome = self
                .shared
                .signal
                .wait(outcome)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Blocks until the run finishes or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let guard = lock(&self.shared.outcome);
        let (guard, _) = self
            .shared
            .signal
            .wait_timeout_while(guard, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    pub(crate) fn set_value(&self, value: Value) {
        *lock(&self.shared.value) = Some(value);
    }

    /// Records the outcome and wakes every waiter. Only the first call wins.
    pub(crate) fn complete(&self, outcome: Outcome) -> bool {
        let mut slot = lock(&self.shared.outcome);
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.shared.completed.store(true, Ordering::Release);
        drop(slot);
        self.shared.signal.notify_all();
        true
    }
}

impl fmt::Debug for Continuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuator")
            .field("completed", &self.is_completed())
            .field("outcome", &self.outcome())
            .finish()
    }
}

impl Task for Continuator {
    fn advance(&mut self) -> Result<Step, TaskError> {
        if !self.is_completed() {
            return Ok(Step::pending());
        }
        match self.fault() {
            Some(e) => Err(e),
            None => Ok(Step::Done),
        }
    }
}
