//! Multi-Thread Runner
//!
//! Owns one dedicated worker thread that pumps every scheduled run once per
//! pass, at the cadence given by its [`RunnerConfig`].

use std::hint;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::error::RunnerError;
use crate::execution::{lock, Process};
use crate::monitoring::Timeline;

use super::config::{Pacing, RunnerConfig};
use super::{tick_until, Runner};

/// State shared between the runner handle and its worker thread.
struct WorkerShared {
    incoming: Mutex<Vec<Process>>,
    wake: Condvar,
    disposed: AtomicBool,
    paused: AtomicBool,
    active: AtomicUsize,
    pacing: Pacing,
}

/// Runner backed by a dedicated worker thread.
///
/// Steps never run on the caller's thread. Disposal (explicit or on drop)
/// lets the step in flight finish, stops the worker and drops every queued
/// run; their continuators complete as
/// [`Outcome::Abandoned`](crate::Outcome::Abandoned).
///
/// # Example
///
/// ```
/// use taskrunner::task::{from_iter, Yield};
/// use taskrunner::{MultiThreadRunner, Outcome, RunnerExt};
///
/// let runner = MultiThreadRunner::new("background").unwrap();
/// let continuator = runner.run(from_iter(vec![Yield::Nothing, Yield::Nothing])).unwrap();
/// assert_eq!(continuator.wait(), Outcome::Completed);
/// ```
pub struct MultiThreadRunner {
    name: String,
    shared: Arc<WorkerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    timeline: Option<Timeline>,
}

impl MultiThreadRunner {
    /// Creates a runner with back-to-back passes that yield the CPU.
    pub fn new(name: impl Into<String>) -> Result<Self, RunnerError> {
        Self::with_config(RunnerConfig::new(name))
    }

    /// Creates a runner performing at most one pass every `ms` milliseconds.
    pub fn with_interval(name: impl Into<String>, ms: u64) -> Result<Self, RunnerError> {
        Self::with_config(RunnerConfig::new(name).with_tick_interval(ms))
    }

    pub fn with_config(config: RunnerConfig) -> Result<Self, RunnerError> {
        config.validate()?;

        let shared = Arc::new(WorkerShared {
            incoming: Mutex::new(Vec::new()),
            wake: Condvar::new(),
            disposed: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            pacing: config.pacing(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_name = config.name.clone();
        let handle = thread::Builder::new()
            .name(format!("taskrunner-{}", config.name))
            .spawn(move || work(worker_shared, worker_name))
            .map_err(|source| RunnerError::Spawn {
                runner: config.name.clone(),
                source,
            })?;

        let timeline = config.record_timeline.then(Timeline::new);

        Ok(Self {
            name: config.name,
            shared,
            handle: Mutex::new(Some(handle)),
            timeline,
        })
    }

    /// Stops stepping until [`resume`](Self::resume). Queued runs are kept.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
        debug!("Runner '{}' paused", self.name);
    }

    pub fn resume(&self) {
        let _incoming = lock(&self.shared.incoming);
        self.shared.paused.store(false, Ordering::Release);
        self.shared.wake.notify_all();
        debug!("Runner '{}' resumed", self.name);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// The timeline, when enabled by `record_timeline`.
    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    /// Stops the worker thread and drops all scheduled runs.
    ///
    /// Idempotent. Blocks until the worker has exited, unless called from the
    /// worker thread itself.
    pub fn dispose(&self) {
        {
            let _incoming = lock(&self.shared.incoming);
            if self.shared.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.shared.wake.notify_all();
        }

        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                debug!("Runner '{}' disposed from its own worker", self.name);
                return;
            }
            if handle.join().is_err() {
                error!("Runner '{}' worker thread panicked", self.name);
            }
        }
        info!("Runner '{}' disposed", self.name);
    }
}

impl Runner for MultiThreadRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, mut process: Process) -> Result<(), RunnerError> {
        if let Some(timeline) = &self.timeline {
            process.attach_timeline(timeline);
        }

        let mut incoming = lock(&self.shared.incoming);
        if self.shared.disposed.load(Ordering::Acquire) {
            drop(incoming);
            return Err(RunnerError::Disposed {
                runner: self.name.clone(),
            });
        }
        debug!("Runner '{}' queued run '{}'", self.name, process.label());
        incoming.push(process);
        self.shared.wake.notify_all();
        Ok(())
    }

    fn pending(&self) -> usize {
        lock(&self.shared.incoming).len() + self.shared.active.load(Ordering::Acquire)
    }

    fn is_accepting(&self) -> bool {
        !self.is_disposed()
    }
}

impl Drop for MultiThreadRunner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Worker loop: one pass over every run, then pace, until disposed.
fn work(shared: Arc<WorkerShared>, name: String) {
    info!("Runner '{}' worker started", name);
    let mut active: Vec<Process> = Vec::new();

    'passes: loop {
        {
            let mut incoming = lock(&shared.incoming);
            loop {
                if shared.disposed.load(Ordering::Acquire) {
                    break 'passes;
                }
                let has_work = !active.is_empty() || !incoming.is_empty();
                if has_work && !shared.paused.load(Ordering::Acquire) {
                    break;
                }
                incoming = shared
                    .wake
                    .wait(incoming)
                    .unwrap_or_else(|e| e.into_inner());
            }
            active.append(&mut incoming);
            shared.active.store(active.len(), Ordering::Release);
        }

        tick_until(&mut active, &shared.disposed);
        shared.active.store(active.len(), Ordering::Release);

        if active.is_empty() {
            continue;
        }
        match shared.pacing {
            Pacing::Interval(interval) => {
                let incoming = lock(&shared.incoming);
                let _ = shared
                    .wake
                    .wait_timeout_while(incoming, interval, |_| {
                        !shared.disposed.load(Ordering::Acquire)
                    })
                    .unwrap_or_else(|e| e.into_inner());
            }
            Pacing::Yield => thread::yield_now(),
            Pacing::Spin => hint::spin_loop(),
        }
    }

    let queued = mem::take(&mut *lock(&shared.incoming));
    let dropped = active.len() + queued.len();
    drop(active);
    drop(queued);
    shared.active.store(0, Ordering::Release);
    info!("Runner '{}' worker stopped ({} runs dropped)", name, dropped);
}
