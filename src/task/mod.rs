//! Task Definition Module
//!
//! A [`Task`] is the atomic unit of cooperative work: something that can be
//! asked to make one step of progress and report whether it is done.
//!
//! # Structure
//!
//! - [`leaf`]: Adapters turning closures, iterators and jobs into tasks
//! - [`stack`]: Driver for tasks that yield nested tasks

pub mod leaf;
pub mod stack;

use std::fmt;

use serde_json::Value;

use crate::error::{RunnerError, TaskError};
use crate::execution::Continuator;
use crate::runner::{Runner, RunnerExt};

pub use leaf::{from_fn, from_iter, ChainJob, ChainStep, FnTask, IterTask, Job, JobTask};
pub use stack::TaskStack;

/// What a task produced on its last step.
///
/// Replaces untyped "current value" objects with one variant type: nothing,
/// a control signal, a typed payload, or a nested task.
pub enum Yield {
    /// The task made progress and has nothing to report.
    Nothing,
    /// Abort the enclosing collection (or the whole run at top level).
    Break,
    /// A payload for whoever consumes this task's output.
    Value(Value),
    /// A nested task that must run to completion before this one resumes.
    Task(Box<dyn Task>),
}

impl Yield {
    /// Wraps a task as a nested yield.
    pub fn task(task: impl Task + 'static) -> Self {
        Self::Task(Box::new(task))
    }

    /// Wraps a payload as a value yield.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn is_break(&self) -> bool {
        matches!(self, Self::Break)
    }
}

impl fmt::Debug for Yield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "Nothing"),
            Self::Break => write!(f, "Break"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Task(_) => write!(f, "Task(..)"),
        }
    }
}

/// Result of a single step.
#[derive(Debug)]
pub enum Step {
    /// The task is still running; the yield describes this step.
    Continue(Yield),
    /// The task has terminated.
    Done,
}

impl Step {
    /// A step that continues without yielding anything.
    pub fn pending() -> Self {
        Self::Continue(Yield::Nothing)
    }

    /// A step that asks the enclosing collection to abort.
    pub fn brk() -> Self {
        Self::Continue(Yield::Break)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// A unit of cooperative work advanced one step at a time.
///
/// Every call to [`advance`](Task::advance) is a non-preemptible unit of work:
/// runners only suspend, pause or cancel a task between two calls. All context
/// a task needs must be captured when it is constructed.
pub trait Task: Send {
    /// Makes one step of progress.
    fn advance(&mut self) -> Result<Step, TaskError>;

    /// Rewinds the task to its initial progress.
    ///
    /// Returns `false` when the task cannot be reset, which is the default.
    fn reset(&mut self) -> bool {
        false
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn advance(&mut self) -> Result<Step, TaskError> {
        (**self).advance()
    }

    fn reset(&mut self) -> bool {
        (**self).reset()
    }
}

/// Convenience methods available on every task.
pub trait TaskExt: Task + Sized + 'static {
    /// Schedules this task on a runner and returns its continuator.
    fn run_on<R: Runner + ?Sized>(self, runner: &R) -> Result<Continuator, RunnerError> {
        runner.run(self)
    }

    /// Boxes the task.
    fn boxed(self) -> Box<dyn Task> {
        Box::new(self)
    }
}

impl<T: Task + Sized + 'static> TaskExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yield_value_conversion() {
        match Yield::value(42) {
            Yield::Value(v) => assert_eq!(v.as_i64(), Some(42)),
            other => panic!("unexpected yield: {:?}", other),
        }
    }

    #[test]
    fn test_yield_debug_hides_task() {
        let nested = Yield::task(from_fn(|| Ok(Step::Done)));
        assert_eq!(format!("{:?}", nested), "Task(..)");
        assert_eq!(format!("{:?}", Yield::Break), "Break");
    }

    #[test]
    fn test_step_helpers() {
        assert!(Step::Done.is_done());
        assert!(!Step::pending().is_done());
        assert!(matches!(Step::brk(), Step::Continue(y) if y.is_break()));
    }

    #[test]
    fn test_boxed_task_forwards_calls() {
        let mut calls = 0;
        let mut task = from_fn(move || {
            calls += 1;
            if calls < 3 {
                Ok(Step::pending())
            } else {
                Ok(Step::Done)
            }
        })
        .boxed();

        assert!(!task.advance().unwrap().is_done());
        assert!(!task.advance().unwrap().is_done());
        assert!(task.advance().unwrap().is_done());
        assert!(!task.reset());
    }
}
