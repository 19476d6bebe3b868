//! Nested Task Driver
//!
//! A task may yield another task ([`Yield::Task`]) to wait for it. The
//! [`TaskStack`] keeps those nested tasks on a stack and always advances the
//! innermost one, resuming the parent as soon as the child finishes.

use crate::error::TaskError;

use super::{Step, Task, Yield};

/// Drives a root task together with the tasks it yields.
///
/// Within a single call to [`advance`](Task::advance):
/// - a yielded task is pushed and advanced immediately
/// - a finished nested task is popped and its parent advanced immediately
///
/// `Break` and values yielded at any depth are returned to the caller, so the
/// enclosing collection or runner sees them exactly as if the root had
/// yielded them.
pub struct TaskStack {
    root: Box<dyn Task>,
    nested: Vec<Box<dyn Task>>,
}

impl TaskStack {
    pub fn new(root: Box<dyn Task>) -> Self {
        Self {
            root,
            nested: Vec::new(),
        }
    }

    /// Number of nested tasks currently waited on.
    pub fn depth(&self) -> usize {
        self.nested.len()
    }

    fn advance_top(&mut self) -> Result<Step, TaskError> {
        match self.nested.last_mut() {
            Some(task) => task.advance(),
            None => self.root.advance(),
        }
    }
}

impl Task for TaskStack {
    fn advance(&mut self) -> Result<Step, TaskError> {
        loop {
            match self.advance_top()? {
                Step::Continue(Yield::Task(task)) => self.nested.push(task),
                Step::Done if !self.nested.is_empty() => {
                    self.nested.pop();
                }
                step => return Ok(step),
            }
        }
    }

    fn reset(&mut self) -> bool {
        self.nested.clear();
        self.root.reset()
    }
}
