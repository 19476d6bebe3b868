//! Synchronous Runner
//!
//! Drains every scheduled run inline, on the thread that schedules it.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::error::RunnerError;
use crate::execution::Process;
use crate::monitoring::Timeline;

use super::Runner;

/// Runs each scheduled task to completion before `schedule` returns.
///
/// There is no yielding back to the caller between steps, which makes runs
/// deterministic and is mostly useful in tests and leaf-level execution.
/// A routine paused from inside its own run on this runner never resumes, as
/// nothing else can make progress on the calling thread.
pub struct SyncRunner {
    name: String,
    running: AtomicUsize,
    timeline: Option<Timeline>,
}

impl SyncRunner {
    pub fn new() -> Self {
        Self::named("sync")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: AtomicUsize::new(0),
            timeline: None,
        }
    }

    /// Records the lifecycle of every run on `timeline`.
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }
}

impl Default for SyncRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner for SyncRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, mut process: Process) -> Result<(), RunnerError> {
        if let Some(timeline) = &self.timeline {
            process.attach_timeline(timeline);
        }
        debug!("Runner '{}' draining run '{}'", self.name, process.label());

        self.running.fetch_add(1, Ordering::SeqCst);
        let outcome = process.run_to_completion();
        self.running.fetch_sub(1, Ordering::SeqCst);

        debug!(
            "Runner '{}' finished run '{}': {:?}",
            self.name,
            process.label(),
            outcome
        );
        Ok(())
    }

    fn pending(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Outcome;
    use crate::monitoring::EventType;
    use crate::runner::RunnerExt;
    use crate::task::{from_fn, Step};
    use crate::test_support::Counter;
    use std::sync::Arc;

    #[test]
    fn test_run_completes_before_returning() {
        let runner = SyncRunner::new();
        let (counter, progress) = Counter::new(50);

        let continuator = runner.run(counter).unwrap();

        assert!(continuator.is_completed());
        assert_eq!(progress.count(), 50);
        assert_eq!(runner.pending(), 0);
        assert_eq!(runner.name(), "sync");
    }

    #[test]
    fn test_pending_counts_inflight_run() {
        let runner = Arc::new(SyncRunner::named("inline"));
        let observer = Arc::clone(&runner);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let continuator = runner
            .run(from_fn(move || {
                seen_clone.store(observer.pending(), Ordering::SeqCst);
                Ok(Step::Done)
            }))
            .unwrap();

        assert_eq!(continuator.outcome(), Some(Outcome::Completed));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(runner.pending(), 0);
    }

    #[test]
    fn test_nested_schedule_runs_inline() {
        let runner = Arc::new(SyncRunner::new());
        let inner_runner = Arc::clone(&runner);
        let (counter, progress) = Counter::new(3);
        let mut counter = Some(counter);

        runner
            .run(from_fn(move || {
                if let Some(counter) = counter.take() {
                    let handle = inner_runner.run(counter).unwrap();
                    assert!(handle.is_completed());
                }
                Ok(Step::Done)
            }))
            .unwrap();

        assert_eq!(progress.count(), 3);
    }

    #[test]
    fn test_timeline_records_runs() {
        let timeline = Timeline::new();
        let runner = SyncRunner::new().with_timeline(timeline.clone());
        runner.run(from_fn(|| Ok(Step::Done))).unwrap();

        let types: Vec<_> = timeline.events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::Scheduled, EventType::Completed]);
        assert!(runner.timeline().is_some());
    }
}
