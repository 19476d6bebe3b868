//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::TaskError;
use crate::task::{ChainJob, Job, Step, Task};

/// Installs env_logger once; repeated calls are ignored.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Observable progress of a [`Counter`], shared with the test body.
#[derive(Clone, Default)]
pub(crate) struct Progress {
    count: Arc<AtomicUsize>,
    finished_at: Arc<Mutex<Option<Instant>>>,
}

impl Progress {
    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn finished_at(&self) -> Option<Instant> {
        *self.finished_at.lock().unwrap()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished_at().is_some()
    }
}

/// Counts up to `total`, one increment per step, then finishes.
pub(crate) struct Counter {
    total: usize,
    progress: Progress,
}

impl Counter {
    pub(crate) fn new(total: usize) -> (Self, Progress) {
        let progress = Progress::default();
        (
            Self {
                total,
                progress: progress.clone(),
            },
            progress,
        )
    }
}

impl Task for Counter {
    fn advance(&mut self) -> Result<Step, TaskError> {
        if self.progress.count() < self.total {
            self.progress.count.fetch_add(1, Ordering::SeqCst);
            return Ok(Step::pending());
        }
        *self.progress.finished_at.lock().unwrap() = Some(Instant::now());
        Ok(Step::Done)
    }

    fn reset(&mut self) -> bool {
        self.progress.count.store(0, Ordering::SeqCst);
        *self.progress.finished_at.lock().unwrap() = None;
        true
    }
}

/// Fails on its `fail_at`-th step.
pub(crate) struct FailAfter {
    steps: usize,
    fail_at: usize,
}

impl FailAfter {
    pub(crate) fn new(fail_at: usize) -> Self {
        Self { steps: 0, fail_at }
    }
}

impl Task for FailAfter {
    fn advance(&mut self) -> Result<Step, TaskError> {
        self.steps += 1;
        if self.steps >= self.fail_at {
            return Err(TaskError::failed(format!("failed at step {}", self.steps)));
        }
        Ok(Step::pending())
    }
}

/// Blocks the driving thread for `duration` inside a single step.
pub(crate) struct Sleep {
    duration: Duration,
}

impl Sleep {
    pub(crate) fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Task for Sleep {
    fn advance(&mut self) -> Result<Step, TaskError> {
        thread::sleep(self.duration);
        Ok(Step::Done)
    }
}

/// Non-blocking timer wait: keeps continuing until the deadline passes.
///
/// The deadline is armed on the first step.
pub(crate) struct WaitFor {
    duration: Duration,
    deadline: Option<Instant>,
}

impl WaitFor {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            deadline: None,
        }
    }
}

impl Task for WaitFor {
    fn advance(&mut self) -> Result<Step, TaskError> {
        let deadline = *self
            .deadline
            .get_or_insert_with(|| Instant::now() + self.duration);
        if Instant::now() >= deadline {
            Ok(Step::Done)
        } else {
            Ok(Step::pending())
        }
    }

    fn reset(&mut self) -> bool {
        self.deadline = None;
        true
    }
}

/// A job completed by a timer thread after `delay`.
pub(crate) struct DelayedJob {
    delay: Duration,
    done: Arc<AtomicBool>,
}

impl DelayedJob {
    pub(crate) fn new(delay: Duration) -> (Self, Arc<AtomicBool>) {
        let done = Arc::new(AtomicBool::new(false));
        (
            Self {
                delay,
                done: Arc::clone(&done),
            },
            done,
        )
    }
}

impl Job for DelayedJob {
    fn execute(&mut self) -> Result<(), TaskError> {
        let done = Arc::clone(&self.done);
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            done.store(true, Ordering::Release);
        });
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Token shared by the children of a chained collection.
#[derive(Default)]
pub(crate) struct Tally {
    pub(crate) counter: AtomicUsize,
}

/// Increments the collection token once and finishes.
pub(crate) struct Bump {
    done: bool,
}

impl Bump {
    pub(crate) fn new() -> Self {
        Self { done: false }
    }
}

impl ChainJob<Tally> for Bump {
    fn execute(&mut self, token: &Tally) -> Result<(), TaskError> {
        token.counter.fetch_add(1, Ordering::SeqCst);
        self.done = true;
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
