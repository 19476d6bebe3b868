//! Runners
//!
//! A runner is an execution strategy: it holds scheduled runs and decides on
//! which thread, and at what cadence, their steps happen.
//!
//! - [`sync`]: drains runs inline on the caller's thread
//! - [`manual`]: advances runs once per explicit `tick()` (host frame loops)
//! - [`multi_thread`]: pumps runs on a dedicated worker thread
//! - [`config`]: runner configuration and YAML loading

pub mod config;
pub mod manual;
pub mod multi_thread;
pub mod sync;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RunnerError;
use crate::execution::{Continuator, Process, Tick};
use crate::task::Task;

pub use config::{load_runner_config, RunnerConfig, DEFAULT_WORKER_THREADS};
pub use manual::ManualRunner;
pub use multi_thread::MultiThreadRunner;
pub use sync::SyncRunner;

/// An execution strategy for scheduled runs.
pub trait Runner: Send + Sync {
    /// Diagnostic name.
    fn name(&self) -> &str;

    /// Takes ownership of a run.
    ///
    /// Returns an error, dropping the run, when the runner can no longer
    /// accept work.
    fn schedule(&self, process: Process) -> Result<(), RunnerError>;

    /// Number of runs accepted and not yet finished.
    fn pending(&self) -> usize;

    /// Whether [`schedule`](Runner::schedule) would currently accept a run.
    fn is_accepting(&self) -> bool {
        true
    }
}

/// Convenience methods available on every runner.
pub trait RunnerExt: Runner {
    /// Schedules a plain task and returns its continuator.
    fn run<T: Task + 'static>(&self, task: T) -> Result<Continuator, RunnerError> {
        let process = Process::new(Box::new(task));
        let continuator = process.continuator();
        self.schedule(process)?;
        Ok(continuator)
    }
}

impl<R: Runner + ?Sized> RunnerExt for R {}

/// Ticks every run once, keeping those still running.
pub(crate) fn tick_all(processes: &mut Vec<Process>) {
    processes.retain_mut(|process| process.tick() == Tick::Running);
}

/// Like [`tick_all`], but starts no further step once `halt` is set.
///
/// Runs skipped after the halt are kept unticked.
pub(crate) fn tick_until(processes: &mut Vec<Process>, halt: &AtomicBool) {
    processes.retain_mut(|process| {
        halt.load(Ordering::Acquire) || process.tick() == Tick::Running
    });
}
