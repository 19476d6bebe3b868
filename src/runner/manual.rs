//! Manual Runner
//!
//! Advances scheduled runs only when told to, one step per [`tick`]. Suited
//! to a host frame loop that drives the runner once per frame.
//!
//! [`tick`]: ManualRunner::tick

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use log::debug;

use crate::error::RunnerError;
use crate::execution::{lock, Process};
use crate::monitoring::Timeline;

use super::{tick_all, Runner};

/// Runner driven by explicit calls to [`tick`](Self::tick).
///
/// Runs scheduled during a tick (from a step or a callback) join on the next
/// tick.
pub struct ManualRunner {
    name: String,
    incoming: Mutex<Vec<Process>>,
    active: Mutex<Vec<Process>>,
    active_count: AtomicUsize,
    timeline: Option<Timeline>,
}

impl ManualRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            incoming: Mutex::new(Vec::new()),
            active: Mutex::new(Vec::new()),
            active_count: AtomicUsize::new(0),
            timeline: None,
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Advances every scheduled run by one step.
    ///
    /// Returns the number of runs still pending afterwards.
    pub fn tick(&self) -> usize {
        let incoming = mem::take(&mut *lock(&self.incoming));

        let mut active = lock(&self.active);
        active.extend(incoming);
        tick_all(&mut active);
        self.active_count.store(active.len(), Ordering::SeqCst);
        drop(active);

        self.pending()
    }

    /// Ticks until no run is pending and returns the number of ticks.
    ///
    /// Never returns while a paused run is scheduled.
    pub fn run_until_idle(&self) -> usize {
        let mut ticks = 0;
        while self.pending() > 0 {
            self.tick();
            ticks += 1;
        }
        debug!("Runner '{}' idle after {} ticks", self.name, ticks);
        ticks
    }
}

impl Runner for ManualRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, mut process: Process) -> Result<(), RunnerError> {
        if let Some(timeline) = &self.timeline {
            process.attach_timeline(timeline);
        }
        debug!("Runner '{}' queued run '{}'", self.name, process.label());
        lock(&self.incoming).push(process);
        Ok(())
    }

    fn pending(&self) -> usize {
        lock(&self.incoming).len() + self.active_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ParallelCollection;
    use crate::execution::Outcome;
    use crate::runner::RunnerExt;
    use crate::task::{from_fn, Step};
    use crate::test_support::Counter;
    use std::sync::Arc;

    #[test]
    fn test_one_step_per_tick() {
        let runner = ManualRunner::new("frames");
        let (a, a_progress) = Counter::new(3);
        let (b, b_progress) = Counter::new(5);
        runner.run(a).unwrap();
        runner.run(b).unwrap();

        assert_eq!(runner.pending(), 2);
        assert_eq!(runner.tick(), 2);
        assert_eq!(a_progress.count(), 1);
        assert_eq!(b_progress.count(), 1);
    }

    #[test]
    fn test_parallel_children_advance_once_per_tick() {
        let runner = ManualRunner::new("frames");
        let (short, short_progress) = Counter::new(2);
        let (long, long_progress) = Counter::new(4);
        let mut parallel = ParallelCollection::new();
        parallel.add(short).add(long);
        let continuator = runner.run(parallel).unwrap();

        for tick in 1..=2 {
            runner.tick();
            assert_eq!(short_progress.count(), tick);
            assert_eq!(long_progress.count(), tick);
        }

        assert_eq!(runner.run_until_idle(), 3);
        assert_eq!(continuator.outcome(), Some(Outcome::Completed));
        assert_eq!(long_progress.count(), 4);
    }

    #[test]
    fn test_schedule_during_tick_joins_next_tick() {
        let runner = Arc::new(ManualRunner::new("frames"));
        let spawner = Arc::clone(&runner);
        let (counter, progress) = Counter::new(1);
        let mut counter = Some(counter);

        runner
            .run(from_fn(move || {
                if let Some(counter) = counter.take() {
                    spawner.run(counter).unwrap();
                }
                Ok(Step::Done)
            }))
            .unwrap();

        assert_eq!(runner.tick(), 1);
        assert_eq!(progress.count(), 0);
        runner.tick();
        assert_eq!(progress.count(), 1);
        assert_eq!(runner.tick(), 0);
    }

    #[test]
    fn test_drop_abandons_queued_runs() {
        let runner = ManualRunner::new("frames");
        let (counter, _) = Counter::new(10);
        let continuator = runner.run(counter).unwrap();
        runner.tick();
        drop(runner);

        assert_eq!(continuator.outcome(), Some(Outcome::Abandoned));
    }
}
