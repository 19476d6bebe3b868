//! Task Routines
//!
//! A [`TaskRoutine`] is a reusable, named slot bound to one runner. It owns
//! the task to run (a fixed instance or a factory) and mediates every
//! lifecycle transition of the runs it starts.
//!
//! Control is level-triggered: stop and pause are flags checked by the run at
//! each step boundary, so repeated calls are idempotent. Each start opens a
//! new generation; runs of an older generation end at their next tick.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info};

use crate::error::{RoutineError, RunnerError, TaskError};
use crate::runner::Runner;
use crate::task::{Step, Task};

use super::continuator::{Continuator, Outcome};
use super::lock;
use super::process::{Binding, Process};

/// Called once with the fault that ended a run.
pub type FaultCallback = Box<dyn FnOnce(&TaskError) + Send>;

/// Called once when a run acknowledges a stop request.
pub type StopCallback = Box<dyn FnOnce() + Send>;

/// Per-run callbacks passed to [`TaskRoutine::start_with`].
///
/// Callbacks execute on the thread that drives the run, before the run's
/// continuator is marked complete. Marshal back to another thread yourself if
/// needed.
#[derive(Default)]
pub struct Callbacks {
    on_fault: Option<FaultCallback>,
    on_stop: Option<StopCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_fault(mut self, callback: impl FnOnce(&TaskError) + Send + 'static) -> Self {
        self.on_fault = Some(Box::new(callback));
        self
    }

    pub fn on_stop(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_stop = Some(Box::new(callback));
        self
    }

    pub(crate) fn fire(self, label: &str, outcome: &Outcome) {
        let result = match outcome {
            Outcome::Faulted(e) => match self.on_fault {
                Some(callback) => panic::catch_unwind(AssertUnwindSafe(|| callback(e))),
                None => Ok(()),
            },
            Outcome::Stopped => match self.on_stop {
                Some(callback) => panic::catch_unwind(AssertUnwindSafe(callback)),
                None => Ok(()),
            },
            _ => Ok(()),
        };
        if let Err(payload) = result {
            error!(
                "Callback of run '{}' panicked: {}",
                label,
                TaskError::from_panic(payload)
            );
        }
    }
}

/// Lifecycle state of a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineState {
    /// Never started.
    Idle,
    Running,
    /// Running, but its steps are suspended.
    Paused,
    /// The last run completed or broke out cleanly.
    Completed,
    Faulted,
    /// The last run was stopped or dropped by its runner.
    Stopped,
}

/// Flags shared between a routine and the runs it started.
pub(crate) struct RoutineControl {
    name: String,
    generation: AtomicU64,
    stopped_through: AtomicU64,
    paused: AtomicBool,
    state: Mutex<RoutineState>,
    gate: Mutex<()>,
}

impl RoutineControl {
    fn new(name: String) -> Self {
        Self {
            name,
            generation: AtomicU64::new(0),
            stopped_through: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            state: Mutex::new(RoutineState::Idle),
            gate: Mutex::new(()),
        }
    }

    /// Serializes step execution against starts of the same routine.
    pub(crate) fn gate(&self) -> MutexGuard<'_, ()> {
        lock(&self.gate)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn is_stop_requested(&self, generation: u64) -> bool {
        self.stopped_through.load(Ordering::Acquire) >= generation
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Opens a new generation. Must be called with the gate held.
    fn begin_run(&self) -> u64 {
        let mut state = lock(&self.state);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.paused.store(false, Ordering::Release);
        *state = RoutineState::Running;
        generation
    }

    /// Records how the run of `generation` ended, unless a newer run exists.
    pub(crate) fn settle(&self, generation: u64, outcome: &Outcome) {
        let mut state = lock(&self.state);
        if self.generation() != generation {
            return;
        }
        *state = match outcome {
            Outcome::Completed | Outcome::Broken => RoutineState::Completed,
            Outcome::Faulted(_) => RoutineState::Faulted,
            Outcome::Stopped | Outcome::Abandoned => RoutineState::Stopped,
            Outcome::Superseded => return,
        };
    }

    fn state(&self) -> RoutineState {
        let state = *lock(&self.state);
        if state == RoutineState::Running && self.is_paused() {
            RoutineState::Paused
        } else {
            state
        }
    }
}

/// Where a routine gets the task for each run.
#[derive(Clone)]
enum TaskSource {
    /// One instance reused by every run, reset before each start.
    Instance(Arc<Mutex<Box<dyn Task>>>),
    /// Builds a fresh task for every run.
    Factory(Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>),
}

/// Drives a routine's reusable instance from inside a process.
struct SharedInstance(Arc<Mutex<Box<dyn Task>>>);

impl Task for SharedInstance {
    fn advance(&mut self) -> Result<Step, TaskError> {
        lock(&self.0).advance()
    }

    fn reset(&mut self) -> bool {
        lock(&self.0).reset()
    }
}

#[derive(Default)]
struct Slot {
    runner: Option<Arc<dyn Runner>>,
    source: Option<TaskSource>,
}

/// A reusable, named execution slot bound to one runner.
///
/// All methods take `&self` and may be called from any thread; share the
/// routine with an `Arc` to control it from several places.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskrunner::task::{from_iter, Yield};
/// use taskrunner::{Outcome, RoutineState, SyncRunner, TaskRoutine};
///
/// let routine = TaskRoutine::new("loader");
/// routine.bind(Arc::new(SyncRunner::new()));
/// routine.set_factory(|| from_iter(vec![Yield::Nothing, Yield::Nothing]));
///
/// let continuator = routine.start().unwrap();
/// assert_eq!(continuator.outcome(), Some(Outcome::Completed));
/// assert_eq!(routine.state(), RoutineState::Completed);
/// ```
pub struct TaskRoutine {
    control: Arc<RoutineControl>,
    slot: Mutex<Slot>,
}

impl TaskRoutine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            control: Arc::new(RoutineControl::new(name.into())),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.control.name
    }

    /// Binds the runner used by every later start.
    pub fn bind(&self, runner: Arc<dyn Runner>) -> &Self {
        debug!("Routine '{}' bound to runner '{}'", self.name(), runner.name());
        lock(&self.slot).runner = Some(runner);
        self
    }

    /// Uses one task instance for every run.
    ///
    /// The instance is reset before each start. Tasks that cannot reset will
    /// resume from wherever the previous run left them.
    pub fn set_task(&self, task: impl Task + 'static) -> &Self {
        let instance: Box<dyn Task> = Box::new(task);
        lock(&self.slot).source = Some(TaskSource::Instance(Arc::new(Mutex::new(instance))));
        self
    }

    /// Builds a fresh task for every run.
    pub fn set_factory<F, T>(&self, factory: F) -> &Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Task + 'static,
    {
        let factory = move || -> Box<dyn Task> { Box::new(factory()) };
        lock(&self.slot).source = Some(TaskSource::Factory(Arc::new(factory)));
        self
    }

    /// Starts a new run without callbacks.
    pub fn start(&self) -> Result<Continuator, RoutineError> {
        self.start_with(Callbacks::new())
    }

    /// Starts a new run.
    ///
    /// Fails before anything is queued when no runner is bound, no task is
    /// set, or the runner has been disposed. A failed start leaves any run in
    /// flight and the task instance untouched. A run still in flight is superseded: it performs no further steps
    /// and fires no callbacks. The new run starts unpaused.
    ///
    /// Must not be called from inside a step of this routine's own run.
    pub fn start_with(&self, callbacks: Callbacks) -> Result<Continuator, RoutineError> {
        let (runner, source) = {
            let slot = lock(&self.slot);
            let runner = slot.runner.clone().ok_or_else(|| RoutineError::NoRunner {
                routine: self.name().to_string(),
            })?;
            let source = slot.source.clone().ok_or_else(|| RoutineError::NoTask {
                routine: self.name().to_string(),
            })?;
            (runner, source)
        };

        // A rejected start must leave the run in flight untouched.
        if !runner.is_accepting() {
            return Err(RunnerError::Disposed {
                runner: runner.name().to_string(),
            }
            .into());
        }

        let (task, instance): (Box<dyn Task>, _) = match source {
            TaskSource::Factory(factory) => (factory(), None),
            TaskSource::Instance(instance) => (
                Box::new(SharedInstance(Arc::clone(&instance))),
                Some(instance),
            ),
        };

        let generation = {
            let _gate = self.control.gate();
            if let Some(instance) = &instance {
                if !lock(instance).reset() {
                    debug!(
                        "Routine '{}' task does not support reset; resuming its progress",
                        self.name()
                    );
                }
            }
            self.control.begin_run()
        };

        let label = format!("{}#{}", self.name(), generation);
        info!("Starting routine run '{}' on runner '{}'", label, runner.name());

        let process = Process::bound(
            label,
            task,
            Binding {
                control: Arc::clone(&self.control),
                generation,
                callbacks,
            },
        );
        let continuator = process.continuator();
        runner.schedule(process)?;
        Ok(continuator)
    }

    /// Same contract as [`start`](Self::start).
    ///
    /// Every start synchronizes with the runner through the routine's step
    /// gate, so this is safe from any thread.
    pub fn thread_safe_start(&self) -> Result<Continuator, RoutineError> {
        self.start()
    }

    /// Same contract as [`start_with`](Self::start_with).
    pub fn thread_safe_start_with(&self, callbacks: Callbacks) -> Result<Continuator, RoutineError> {
        self.start_with(callbacks)
    }

    /// Requests cooperative cancellation of the current run.
    ///
    /// Returns immediately. The run performs no step after it observes the
    /// request; poll its continuator to know when that has happened.
    pub fn stop(&self) {
        let generation = self.control.generation();
        self.control
            .stopped_through
            .fetch_max(generation, Ordering::AcqRel);
        debug!("Stop requested for routine '{}'", self.name());
    }

    /// Suspends the current run at its next step boundary.
    pub fn pause(&self) {
        self.control.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.control.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn state(&self) -> RoutineState {
        self.control.state()
    }
}
