//! Runtime Context
//!
//! Allocates task routines explicitly instead of through a process-wide
//! registry. Keep one `Runtime` wherever routines are created and pass it to
//! the code that needs them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;

use crate::error::RunnerError;
use crate::runner::{Runner, RunnerExt};
use crate::task::Task;

use super::continuator::Continuator;
use super::routine::TaskRoutine;

/// Hands out named task routines.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskrunner::task::{from_iter, Yield};
/// use taskrunner::{Runtime, SyncRunner};
///
/// let runtime = Runtime::new();
/// let routine = runtime.allocate_routine_on(Arc::new(SyncRunner::new()));
/// routine.set_task(from_iter(vec![Yield::Nothing]));
///
/// assert!(routine.start().unwrap().is_completed());
/// assert_eq!(routine.name(), "routine-1");
/// ```
#[derive(Debug, Default)]
pub struct Runtime {
    allocated: AtomicUsize,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an unbound routine named `routine-<n>`.
    pub fn allocate_routine(&self) -> TaskRoutine {
        let id = self.allocated.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("routine-{}", id);
        debug!("Allocated task routine '{}'", name);
        TaskRoutine::new(name)
    }

    /// Allocates a routine already bound to `runner`.
    pub fn allocate_routine_on(&self, runner: Arc<dyn Runner>) -> TaskRoutine {
        let routine = self.allocate_routine();
        routine.bind(runner);
        routine
    }

    /// Number of routines handed out so far.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Runs a plain task on `runner` without a routine.
    pub fn run_on<R, T>(&self, runner: &R, task: T) -> Result<Continuator, RunnerError>
    where
        R: Runner + ?Sized,
        T: Task + 'static,
    {
        runner.run(task)
    }
}
