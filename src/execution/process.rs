//! Scheduled Runs
//!
//! A [`Process`] is what a runner actually holds: the task stack of one run,
//! the continuator handed to the caller, and, for runs started through a
//! [`TaskRoutine`](crate::TaskRoutine), the routine's control flags.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};

use crate::error::TaskError;
use crate::monitoring::{EventType, Timeline};
use crate::task::{Step, Task, TaskStack, Yield};

use super::continuator::{Continuator, Outcome};
use super::routine::{Callbacks, RoutineControl};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// State of a process after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running,
    Finished,
}

/// Ties a run to the routine that started it.
pub(crate) struct Binding {
    pub(crate) control: Arc<RoutineControl>,
    pub(crate) generation: u64,
    pub(crate) callbacks: Callbacks,
}

/// One scheduled run.
///
/// Runners call [`tick`](Process::tick) once per pass until it reports
/// [`Tick::Finished`]. Dropping an unfinished process completes its
/// continuator with [`Outcome::Abandoned`].
pub struct Process {
    label: String,
    task: TaskStack,
    continuator: Continuator,
    binding: Option<Binding>,
    timeline: Option<Timeline>,
    finished: bool,
}

impl Process {
    /// Wraps a plain task that is not owned by any routine.
    pub fn new(task: Box<dyn Task>) -> Self {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        Self::build(format!("task-{}", id), task, None)
    }

    pub(crate) fn bound(label: String, task: Box<dyn Task>, binding: Binding) -> Self {
        Self::build(label, task, Some(binding))
    }

    fn build(label: String, task: Box<dyn Task>, binding: Option<Binding>) -> Self {
        Self {
            label,
            task: TaskStack::new(task),
            continuator: Continuator::new(),
            binding,
            timeline: None,
            finished: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// A handle to this run.
    pub fn continuator(&self) -> Continuator {
        self.continuator.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records lifecycle events of this run on `timeline`.
    pub(crate) fn attach_timeline(&mut self, timeline: &Timeline) {
        timeline.record(&self.label, EventType::Scheduled);
        self.timeline = Some(timeline.clone());
    }

    /// Advances the run by at most one step.
    ///
    /// Routine-bound runs first check, under the routine's step gate, for a
    /// newer start, then a stop request, then a pause. A superseded run ends
    /// as such even when a stop was requested after the newer start. A paused
    /// run is polled but its task is not advanced.
    pub fn tick(&mut self) -> Tick {
        if self.finished {
            return Tick::Finished;
        }

        let outcome = match self.binding.as_ref() {
            None => self.step(),
            Some(binding) => {
                let control = Arc::clone(&binding.control);
                let generation = binding.generation;

                let _gate = control.gate();
                if control.generation() != generation {
                    Some(Outcome::Superseded)
                } else if control.is_stop_requested(generation) {
                    Some(Outcome::Stopped)
                } else if control.is_paused() {
                    None
                } else {
                    self.step()
                }
            }
        };

        match outcome {
            Some(outcome) => {
                self.finish(outcome);
                Tick::Finished
            }
            None => Tick::Running,
        }
    }

    /// Ticks until the run finishes and returns its outcome.
    pub fn run_to_completion(&mut self) -> Outcome {
        while self.tick() == Tick::Running {}
        self.continuator.wait()
    }

    fn step(&mut self) -> Option<Outcome> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.task.advance()));
        match result {
            Ok(Ok(Step::Done)) => Some(Outcome::Completed),
            Ok(Ok(Step::Continue(Yield::Break))) => Some(Outcome::Broken),
            Ok(Ok(Step::Continue(Yield::Value(value)))) => {
                self.continuator.set_value(value);
                None
            }
            Ok(Ok(Step::Continue(_))) => None,
            Ok(Err(e)) => Some(Outcome::Faulted(e)),
            Err(payload) => Some(Outcome::Faulted(TaskError::from_panic(payload))),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.finished {
            return;
        }
        self.finished = true;

        match &outcome {
            Outcome::Faulted(e) => error!("Run '{}' faulted: {}", self.label, e),
            Outcome::Stopped => warn!("Run '{}' stopped", self.label),
            Outcome::Abandoned => warn!("Run '{}' abandoned by its runner", self.label),
            other => debug!("Run '{}' finished: {:?}", self.label, other),
        }

        if let Some(binding) = self.binding.take() {
            binding.control.settle(binding.generation, &outcome);
            binding.callbacks.fire(&self.label, &outcome);
        }
        if let Some(timeline) = &self.timeline {
            timeline.record(&self.label, EventType::from(&outcome));
        }
        self.continuator.complete(outcome);
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        self.finish(Outcome::Abandoned);
    }
}
