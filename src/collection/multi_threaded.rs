//! Multi-Threaded Parallel Collection
//!
//! Spreads children over a fixed number of worker threads. Each worker runs a
//! [`ParallelCollection`] of its share of the children on a dedicated
//! [`MultiThreadRunner`], so children on different workers truly overlap,
//! including children that block inside a step.

use std::mem;
use std::time::Duration;

use log::{debug, warn};

use crate::error::TaskError;
use crate::execution::{Continuator, Outcome};
use crate::runner::config::DEFAULT_WORKER_THREADS;
use crate::runner::{MultiThreadRunner, RunnerConfig, RunnerExt};
use crate::task::{Step, Task, Yield};

use super::{fire, CollectionState, CompletionCallback, ParallelCollection};

/// A running bucket: the worker that owns it and the handle of its run.
struct Worker {
    runner: MultiThreadRunner,
    continuator: Continuator,
}

/// Runs one worker's share of the children and reports a break upward.
struct Bucket(ParallelCollection);

impl Task for Bucket {
    fn advance(&mut self) -> Result<Step, TaskError> {
        match self.0.advance()? {
            Step::Done if self.0.is_broken() => Ok(Step::Continue(Yield::Break)),
            step => Ok(step),
        }
    }
}

/// Parallel collection whose children run on their own threads.
///
/// Children are assigned round-robin to `threads` buckets when added. The
/// workers are spawned on the first advance and disposed as soon as the run
/// ends. A break in any bucket aborts the whole collection; the other workers
/// are disposed and [`is_broken`](Self::is_broken) reports it.
///
/// Children added while a run is in flight are kept for the next run.
pub struct MultiThreadedParallelCollection {
    threads: usize,
    staged: Vec<ParallelCollection>,
    staged_count: usize,
    workers: Vec<Worker>,
    state: CollectionState,
    on_complete: Vec<CompletionCallback>,
}

impl MultiThreadedParallelCollection {
    /// Creates a collection backed by `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        Self {
            threads,
            staged: Self::empty_buckets(threads),
            staged_count: 0,
            workers: Vec::new(),
            state: CollectionState::Ready,
            on_complete: Vec::new(),
        }
    }

    /// Creates a collection with one worker per available CPU.
    pub fn with_default_threads() -> Self {
        Self::new(*DEFAULT_WORKER_THREADS)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn add(&mut self, task: impl Task + 'static) -> &mut Self {
        let bucket = self.staged_count % self.threads;
        self.staged[bucket].add(task);
        self.staged_count += 1;
        if self.state.is_terminal() {
            self.state = CollectionState::Ready;
        }
        self
    }

    /// Registers a callback fired once when every worker has finished, or
    /// when a child breaks.
    pub fn on_complete(&mut self, callback: impl FnMut() + Send + 'static) -> &mut Self {
        self.on_complete.push(Box::new(callback));
        self
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == CollectionState::Completed
    }

    pub fn is_broken(&self) -> bool {
        self.state == CollectionState::Broken
    }

    /// Runs the collection to completion, blocking the calling thread.
    pub fn complete(&mut self) -> Result<(), TaskError> {
        loop {
            if self.advance()?.is_done() {
                return Ok(());
            }
            // Short waits so a break on any worker is noticed promptly.
            if let Some(worker) = self.workers.iter().find(|w| !w.continuator.is_completed()) {
                worker.continuator.wait_timeout(Duration::from_millis(1));
            }
        }
    }

    fn empty_buckets(threads: usize) -> Vec<ParallelCollection> {
        (0..threads).map(|_| ParallelCollection::new()).collect()
    }

    fn spawn_workers(&mut self) -> Result<(), TaskError> {
        let buckets = mem::replace(&mut self.staged, Self::empty_buckets(self.threads));
        self.staged_count = 0;

        for (index, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let config = RunnerConfig::new(format!("parallel-worker-{}", index));
            let runner = MultiThreadRunner::with_config(config)
                .map_err(|e| TaskError::failed(e.to_string()))?;
            let continuator = runner
                .run(Bucket(bucket))
                .map_err(|e| TaskError::failed(e.to_string()))?;
            self.workers.push(Worker {
                runner,
                continuator,
            });
        }

        debug!(
            "Multi-threaded collection started {} workers",
            self.workers.len()
        );
        Ok(())
    }

    fn shut_down(&mut self) {
        for worker in self.workers.drain(..) {
            worker.runner.dispose();
        }
    }

    fn end(&mut self, state: CollectionState) {
        self.shut_down();
        self.state = if state.is_terminal() && self.staged_count > 0 {
            CollectionState::Ready
        } else {
            state
        };
    }
}

impl Default for MultiThreadedParallelCollection {
    fn default() -> Self {
        Self::with_default_threads()
    }
}

impl Task for MultiThreadedParallelCollection {
    fn advance(&mut self) -> Result<Step, TaskError> {
        if self.state.is_terminal() {
            return Ok(Step::Done);
        }
        if self.state == CollectionState::Ready {
            self.state = CollectionState::Running;
            if let Err(e) = self.spawn_workers() {
                self.end(CollectionState::Faulted);
                return Err(e);
            }
        }

        let fault = self.workers.iter().find_map(|w| match w.continuator.outcome() {
            Some(Outcome::Faulted(e)) => Some(e),
            _ => None,
        });
        if let Some(e) = fault {
            warn!("Multi-threaded collection worker faulted: {}", e);
            self.end(CollectionState::Faulted);
            return Err(e);
        }

        let broken = self
            .workers
            .iter()
            .any(|w| w.continuator.outcome() == Some(Outcome::Broken));
        if broken {
            debug!("Multi-threaded collection broken; disposing remaining workers");
            self.end(CollectionState::Broken);
            fire(&mut self.on_complete);
            return Ok(Step::Done);
        }

        if self.workers.iter().all(|w| w.continuator.is_completed()) {
            self.end(CollectionState::Completed);
            fire(&mut self.on_complete);
            return Ok(Step::Done);
        }

        Ok(Step::pending())
    }
}

impl Drop for MultiThreadedParallelCollection {
    fn drop(&mut self) {
        self.shut_down();
    }
}
