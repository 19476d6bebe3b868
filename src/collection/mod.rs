//! Task Collections
//!
//! Composite tasks that own an ordered set of child tasks and apply a
//! composition rule to them.
//!
//! - [`serial`]: children run one after another, in insertion order
//! - [`parallel`]: every pending child advances once per step
//! - [`multi_threaded`]: children spread over dedicated worker threads

pub mod multi_threaded;
pub mod parallel;
pub mod serial;

use crate::error::TaskError;
use crate::task::{ChainStep, Step, Task, TaskStack};

pub use multi_threaded::MultiThreadedParallelCollection;
pub use parallel::ParallelCollection;
pub use serial::SerialCollection;

/// Callback fired when a collection run ends.
pub type CompletionCallback = Box<dyn FnMut() + Send>;

/// Lifecycle of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// Not advanced since construction, reset or re-arm.
    Ready,
    Running,
    /// Every child ran to completion.
    Completed,
    /// A child yielded `Break`.
    Broken,
    /// A child raised a fault.
    Faulted,
}

impl CollectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Broken | Self::Faulted)
    }
}

/// A child of a collection: a regular task or a job chained on the token.
pub(crate) enum Child<T> {
    Task(TaskStack),
    Chain(ChainStep<T>),
}

impl<T> Child<T> {
    pub(crate) fn task(task: impl Task + 'static) -> Self {
        Self::Task(TaskStack::new(Box::new(task)))
    }

    pub(crate) fn advance(&mut self, token: &T) -> Result<Step, TaskError> {
        match self {
            Self::Task(stack) => stack.advance(),
            Self::Chain(step) => step.advance(token),
        }
    }

    pub(crate) fn reset(&mut self) -> bool {
        match self {
            Self::Task(stack) => stack.reset(),
            Self::Chain(step) => step.reset(),
        }
    }
}

pub(crate) fn fire(callbacks: &mut [CompletionCallback]) {
    for callback in callbacks.iter_mut() {
        callback();
    }
}
