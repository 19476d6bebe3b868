//! Serial Task Collection
//!
//! Runs its children strictly one after another. A cursor points at the only
//! child being advanced; every child before the cursor has run to completion.

use std::sync::Arc;

use log::debug;

use crate::error::TaskError;
use crate::task::{ChainJob, ChainStep, Step, Task, Yield};

use super::{fire, Child, CollectionState, CompletionCallback};

/// Ordered sequence of tasks advanced one at a time.
///
/// `T` is the token handed to chained children (see [`ChainJob`]); plain
/// collections use `()`.
///
/// # Example
///
/// ```
/// use taskrunner::collection::SerialCollection;
/// use taskrunner::task::{from_iter, Yield};
/// use taskrunner::{RunnerExt, SyncRunner};
///
/// let mut serial = SerialCollection::new();
/// serial.add(from_iter(vec![Yield::Nothing, Yield::Nothing]));
/// serial.add(from_iter(vec![Yield::Nothing]));
///
/// let continuator = SyncRunner::new().run(serial).unwrap();
/// assert!(continuator.is_completed());
/// ```
pub struct SerialCollection<T = ()> {
    token: Arc<T>,
    children: Vec<Child<T>>,
    cursor: usize,
    state: CollectionState,
    on_complete: Vec<CompletionCallback>,
}

impl SerialCollection<()> {
    pub fn new() -> Self {
        Self::with_token(Arc::new(()))
    }
}

impl Default for SerialCollection<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SerialCollection<T> {
    /// Creates a collection whose chained children share `token`.
    pub fn with_token(token: Arc<T>) -> Self {
        Self {
            token,
            children: Vec::new(),
            cursor: 0,
            state: CollectionState::Ready,
            on_complete: Vec::new(),
        }
    }

    pub fn token(&self) -> &Arc<T> {
        &self.token
    }

    /// Appends a task.
    ///
    /// Adding to a collection whose run has ended re-arms it: the next
    /// advance runs only the children added since.
    pub fn add(&mut self, task: impl Task + 'static) -> &mut Self {
        self.push(Child::task(task))
    }

    /// Appends a job that receives the collection token.
    pub fn add_chain(&mut self, job: impl ChainJob<T> + 'static) -> &mut Self {
        self.push(Child::Chain(ChainStep::new(job)))
    }

    /// Registers a callback fired once when a run completes cleanly.
    ///
    /// Breaks and faults never fire it.
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

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Drops every child and returns to [`CollectionState::Ready`].
    pub fn clear(&mut self) {
        self.children.clear();
        self.cursor = 0;
        self.state = CollectionState::Ready;
    }

    fn push(&mut self, child: Child<T>) -> &mut Self {
        self.children.push(child);
        if self.state.is_terminal() {
            self.state = CollectionState::Ready;
        }
        self
    }

    fn end(&mut self, state: CollectionState) {
        self.state = state;
        // children after the cursor are retired and never start
        self.cursor = self.children.len();
    }

    fn complete(&mut self) -> Step {
        self.end(CollectionState::Completed);
        debug!("Serial collection completed ({} children)", self.children.len());
        fire(&mut self.on_complete);
        Step::Done
    }
}

impl<T: Send + Sync> Task for SerialCollection<T> {
    fn advance(&mut self) -> Result<Step, TaskError> {
        if self.state.is_terminal() {
            return Ok(Step::Done);
        }
        self.state = CollectionState::Running;

        let step = match self.children.get_mut(self.cursor) {
            Some(child) => child.advance(&self.token),
            None => return Ok(self.complete()),
        };

        match step {
            Err(e) => {
                self.end(CollectionState::Faulted);
                Err(e)
            }
            Ok(Step::Continue(Yield::Break)) => {
                debug!("Serial collection broken at child {}", self.cursor);
                self.end(CollectionState::Broken);
                Ok(Step::Done)
            }
            Ok(Step::Continue(yielded)) => Ok(Step::Continue(yielded)),
            Ok(Step::Done) => {
                self.cursor += 1;
                if self.cursor >= self.children.len() {
                    Ok(self.complete())
                } else {
                    Ok(Step::pending())
                }
            }
        }
    }

    fn reset(&mut self) -> bool {
        let mut all_reset = true;
        for child in &mut self.children {
            all_reset &= child.reset();
        }
        self.cursor = 0;
        self.state = CollectionState::Ready;
        all_reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::from_iter;
    use crate::test_support::{Bump, Counter, FailAfter, Tally};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn drain(task: &mut impl Task) -> Result<usize, TaskError> {
        let mut steps = 1;
        while !task.advance()?.is_done() {
            steps += 1;
        }
        Ok(steps)
    }

    fn completion_counter(serial: &mut SerialCollection<impl Send + Sync>) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        serial.on_complete(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        fired
    }

    #[test]
    fn test_children_complete_in_order() {
        let (first, first_progress) = Counter::new(1000);
        let (second, second_progress) = Counter::new(1000);

        let mut serial = SerialCollection::new();
        serial.add(first).add(second);
        let fired = completion_counter(&mut serial);

        drain(&mut serial).unwrap();

        assert_eq!(first_progress.count() + second_progress.count(), 2000);
        assert!(first_progress.finished_at().unwrap() <= second_progress.finished_at().unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(serial.is_completed());
    }

    #[test]
    fn test_only_one_child_is_active() {
        let (first, first_progress) = Counter::new(3);
        let (second, second_progress) = Counter::new(3);

        let mut serial = SerialCollection::new();
        serial.add(first).add(second);

        for _ in 0..3 {
            serial.advance().unwrap();
        }
        assert_eq!(first_progress.count(), 3);
        assert_eq!(second_progress.count(), 0);
    }

    #[test]
    fn test_completion_fires_in_last_childs_terminal_step() {
        let mut serial = SerialCollection::new();
        serial.add(from_iter(vec![Yield::Nothing]));
        let fired = completion_counter(&mut serial);

        assert!(!serial.advance().unwrap().is_done());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(serial.advance().unwrap().is_done());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_break_stops_later_children() {
        let (first, first_progress) = Counter::new(10);
        let (third, third_progress) = Counter::new(10);

        let mut serial = SerialCollection::new();
        serial
            .add(first)
            .add(from_iter(vec![Yield::Break]))
            .add(third);
        let fired = completion_counter(&mut serial);

        drain(&mut serial).unwrap();

        assert!(first_progress.is_finished());
        assert_eq!(third_progress.count(), 0);
        assert!(serial.is_broken());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fault_propagates_and_suppresses_completion() {
        let (first, first_progress) = Counter::new(2);
        let (third, third_progress) = Counter::new(2);

        let mut serial = SerialCollection::new();
        serial.add(first).add(FailAfter::new(2)).add(third);
        let fired = completion_counter(&mut serial);

        let err = drain(&mut serial).unwrap_err();

        assert_eq!(err, TaskError::failed("failed at step 2"));
        assert!(first_progress.is_finished());
        assert_eq!(third_progress.count(), 0);
        assert_eq!(serial.state(), CollectionState::Faulted);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(serial.advance().unwrap().is_done());
    }

    #[test]
    fn test_token_is_shared_by_chained_children() {
        let token = Arc::new(Tally::default());
        let mut serial = SerialCollection::with_token(Arc::clone(&token));
        serial.add_chain(Bump::new()).add_chain(Bump::new());

        drain(&mut serial).unwrap();

        assert_eq!(token.counter.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(serial.token(), &token));
    }

    #[test]
    fn test_empty_collection_completes_immediately() {
        let mut serial = SerialCollection::new();
        let fired = completion_counter(&mut serial);

        assert!(serial.advance().unwrap().is_done());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(serial.is_empty());
    }

    #[test]
    fn test_completed_collection_stays_terminal() {
        let mut serial = SerialCollection::new();
        serial.add(from_iter(vec![Yield::Nothing]));
        let fired = completion_counter(&mut serial);

        drain(&mut serial).unwrap();
        assert!(serial.advance().unwrap().is_done());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_after_completion_runs_only_new_children() {
        let (first, first_progress) = Counter::new(2);
        let (second, second_progress) = Counter::new(2);

        let mut serial = SerialCollection::new();
        serial.add(first);
        let fired = completion_counter(&mut serial);
        drain(&mut serial).unwrap();

        serial.add(second);
        assert_eq!(serial.state(), CollectionState::Ready);
        drain(&mut serial).unwrap();

        assert_eq!(first_progress.count(), 2);
        assert!(second_progress.is_finished());
        assert_eq!(serial.len(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_rewinds_children() {
        let (first, first_progress) = Counter::new(3);
        let mut serial = SerialCollection::new();
        serial.add(first);

        drain(&mut serial).unwrap();
        assert_eq!(first_progress.count(), 3);

        assert!(serial.reset());
        assert_eq!(first_progress.count(), 0);
        assert_eq!(serial.state(), CollectionState::Ready);

        drain(&mut serial).unwrap();
        assert_eq!(first_progress.count(), 3);
    }

    #[test]
    fn test_reset_reports_unsupported_children() {
        let mut serial = SerialCollection::new();
        serial.add(from_iter(vec![Yield::Nothing]));
        assert!(!serial.reset());
    }

    #[test]
    fn test_values_pass_through() {
        let mut serial = SerialCollection::new();
        serial.add(from_iter(vec![Yield::value("ready")]));

        match serial.advance().unwrap() {
            Step::Continue(Yield::Value(v)) => assert_eq!(v.as_str(), Some("ready")),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_clear_drops_children() {
        let mut serial = SerialCollection::new();
        serial.add(from_iter(vec![Yield::Break]));
        drain(&mut serial).unwrap();

        serial.clear();
        assert!(serial.is_empty());
        assert_eq!(serial.state(), CollectionState::Ready);
    }
}
