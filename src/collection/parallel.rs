//! Parallel Task Collection
//!
//! Interleaves its children: each step advances every pending child exactly
//! once, in insertion order. Children that finish are excluded from later
//! steps.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::error::TaskError;
use crate::task::{ChainJob, ChainStep, Step, Task, Yield};

use super::{fire, Child, CollectionState, CompletionCallback};

/// Set of tasks advanced side by side on the thread that drives the
/// collection.
pub struct ParallelCollection<T = ()> {
    token: Arc<T>,
    children: Vec<Child<T>>,
    pending: Vec<bool>,
    state: CollectionState,
    on_complete: Vec<CompletionCallback>,
}

enum Interruption {
    Fault(TaskError),
    Break(usize),
}

impl ParallelCollection<()> {
    pub fn new() -> Self {
        Self::with_token(Arc::new(()))
    }
}

impl Default for ParallelCollection<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ParallelCollection<T> {
    /// Creates a collection whose chained children share `token`.
    pub fn with_token(token: Arc<T>) -> Self {
        Self {
            token,
            children: Vec::new(),
            pending: Vec::new(),
            state: CollectionState::Ready,
            on_complete: Vec::new(),
        }
    }

    pub fn token(&self) -> &Arc<T> {
        &self.token
    }

    /// Adds a task; re-arms the collection if its run has ended.
    pub fn add(&mut self, task: impl Task + 'static) -> &mut Self {
        self.push(Child::task(task))
    }

    /// Adds a job that receives the collection token.
    pub fn add_chain(&mut self, job: impl ChainJob<T> + 'static) -> &mut Self {
        self.push(Child::Chain(ChainStep::new(job)))
    }

    /// Registers a callback fired once per run, when every child has
    /// completed or when a child breaks. Use [`is_broken`](Self::is_broken)
    /// inside the callback to tell the two apart. Faults never fire it.
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

    /// Number of children that have not finished yet.
    pub fn pending(&self) -> usize {
        self.pending.iter().filter(|p| **p).count()
    }

    /// Drops every child and returns to [`CollectionState::Ready`].
    pub fn clear(&mut self) {
        self.children.clear();
        self.pending.clear();
        self.state = CollectionState::Ready;
    }

    fn push(&mut self, child: Child<T>) -> &mut Self {
        self.children.push(child);
        self.pending.push(true);
        if self.state.is_terminal() {
            self.state = CollectionState::Ready;
        }
        self
    }

    fn end(&mut self, state: CollectionState) {
        self.state = state;
        self.pending.fill(false);
        if state != CollectionState::Faulted {
            fire(&mut self.on_complete);
        }
    }
}

impl<T: Send + Sync> Task for ParallelCollection<T> {
    fn advance(&mut self) -> Result<Step, TaskError> {
        if self.state.is_terminal() {
            return Ok(Step::Done);
        }
        self.state = CollectionState::Running;

        let mut interruption = None;
        let mut last_value: Option<Value> = None;

        for (index, (child, pending)) in self
            .children
            .iter_mut()
            .zip(self.pending.iter_mut())
            .enumerate()
        {
            if !*pending {
                continue;
            }
            match child.advance(&self.token) {
                Err(e) => {
                    interruption = Some(Interruption::Fault(e));
                    break;
                }
                Ok(Step::Continue(Yield::Break)) => {
                    interruption = Some(Interruption::Break(index));
                    break;
                }
                Ok(Step::Continue(Yield::Value(value))) => last_value = Some(value),
                Ok(Step::Continue(_)) => {}
                Ok(Step::Done) => *pending = false,
            }
        }

        match interruption {
            Some(Interruption::Fault(e)) => {
                self.end(CollectionState::Faulted);
                Err(e)
            }
            Some(Interruption::Break(index)) => {
                debug!("Parallel collection broken by child {}", index);
                self.end(CollectionState::Broken);
                Ok(Step::Done)
            }
            None if self.pending() == 0 => {
                debug!("Parallel collection completed ({} children)", self.children.len());
                self.end(CollectionState::Completed);
                Ok(Step::Done)
            }
            None => Ok(Step::Continue(last_value.map_or(Yield::Nothing, Yield::Value))),
        }
    }

    fn reset(&mut self) -> bool {
        let mut all_reset = true;
        for child in &mut self.children {
            all_reset &= child.reset();
        }
        self.pending.fill(true);
        self.state = CollectionState::Ready;
        all_reset
    }
}
