//! Leaf Tasks
//!
//! Adapters that turn plain units of work into [`Task`]s:
//! - [`FnTask`]: a closure called once per step
//! - [`IterTask`]: a lazy iterator of [`Yield`]s, optionally restartable
//! - [`JobTask`]: a [`Job`] that is started once and polled until done
//! - [`ChainStep`]: a [`ChainJob`] that receives a collection's shared token

use crate::error::TaskError;

use super::{Step, Task, Yield};

/// A task backed by a closure; each call to the closure is one step.
pub struct FnTask<F> {
    step: F,
}

/// Creates a task that calls `step` on every advance.
///
/// # Example
///
/// ```
/// use taskrunner::task::{from_fn, Step, Task};
///
/// let mut remaining = 3;
/// let mut task = from_fn(move || {
///     remaining -= 1;
///     Ok(if remaining == 0 { Step::Done } else { Step::pending() })
/// });
///
/// while !task.advance().unwrap().is_done() {}
/// ```
pub fn from_fn<F>(step: F) -> FnTask<F>
where
    F: FnMut() -> Result<Step, TaskError> + Send,
{
    FnTask { step }
}

impl<F> Task for FnTask<F>
where
    F: FnMut() -> Result<Step, TaskError> + Send,
{
    fn advance(&mut self) -> Result<Step, TaskError> {
        (self.step)()
    }
}

/// A task that yields the items of an iterator, one per step.
///
/// When built with [`IterTask::restartable`] the task keeps the factory that
/// produced the iterator and supports [`Task::reset`].
pub struct IterTask<I> {
    iter: I,
    factory: Option<Box<dyn Fn() -> I + Send>>,
}

/// Creates a task from a lazy sequence of yields.
///
/// The sequence ends the task when it runs out of items. Use
/// [`std::iter::once_with`] and friends to keep each item lazy.
pub fn from_iter<I>(items: I) -> IterTask<I::IntoIter>
where
    I: IntoIterator<Item = Yield>,
    I::IntoIter: Send,
{
    IterTask {
        iter: items.into_iter(),
        factory: None,
    }
}

impl<I> IterTask<I>
where
    I: Iterator<Item = Yield> + Send,
{
    /// Creates a task that rebuilds its iterator from `factory` on reset.
    pub fn restartable<F>(factory: F) -> Self
    where
        F: Fn() -> I + Send + 'static,
    {
        Self {
            iter: factory(),
            factory: Some(Box::new(factory)),
        }
    }
}

impl<I> Task for IterTask<I>
where
    I: Iterator<Item = Yield> + Send,
{
    fn advance(&mut self) -> Result<Step, TaskError> {
        Ok(match self.iter.next() {
            Some(item) => Step::Continue(item),
            None => Step::Done,
        })
    }

    fn reset(&mut self) -> bool {
        match &self.factory {
            Some(factory) => {
                self.iter = factory();
                true
            }
            None => false,
        }
    }
}

/// Work that is started once and completes on its own, possibly on another
/// thread (a timer, an I/O callback).
///
/// `is_done` is polled from the thread driving the task, so implementations
/// whose completion is set elsewhere must publish it through an atomic or a
/// lock.
pub trait Job: Send {
    fn execute(&mut self) -> Result<(), TaskError>;

    fn is_done(&self) -> bool;

    fn reset(&mut self) -> bool {
        false
    }
}

/// Adapts a [`Job`] to the step protocol.
///
/// The first step executes the job; every step reports `Done` once the job's
/// done flag is set.
pub struct JobTask<J> {
    job: J,
    started: bool,
}

impl<J: Job> JobTask<J> {
    pub fn new(job: J) -> Self {
        Self {
            job,
            started: false,
        }
    }

    pub fn job(&self) -> &J {
        &self.job
    }
}

impl<J: Job> Task for JobTask<J> {
    fn advance(&mut self) -> Result<Step, TaskError> {
        if !self.started {
            self.started = true;
            self.job.execute()?;
        }

        Ok(if self.job.is_done() {
            Step::Done
        } else {
            Step::pending()
        })
    }

    fn reset(&mut self) -> bool {
        if self.job.reset() {
            self.started = false;
            true
        } else {
            false
        }
    }
}

/// A job that works on a token shared by every child of a collection.
///
/// The token is handed over by reference and is never copied; jobs that
/// mutate it must use interior mutability safe for whatever threads the
/// token is exposed to.
pub trait ChainJob<T>: Send {
    fn execute(&mut self, token: &T) -> Result<(), TaskError>;

    fn is_done(&self) -> bool;

    fn reset(&mut self) -> bool {
        false
    }
}

/// Drives a [`ChainJob`] with the token supplied by its collection.
pub struct ChainStep<T> {
    job: Box<dyn ChainJob<T>>,
    started: bool,
}

impl<T> ChainStep<T> {
    pub fn new(job: impl ChainJob<T> + 'static) -> Self {
        Self {
            job: Box::new(job),
            started: false,
        }
    }

    pub fn advance(&mut self, token: &T) -> Result<Step, TaskError> {
        if !self.started {
            self.started = true;
            self.job.execute(token)?;
        }

        Ok(if self.job.is_done() {
            Step::Done
        } else {
            Step::pending()
        })
    }

    pub fn reset(&mut self) -> bool {
        if self.job.reset() {
            self.started = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Flagged {
        executed: usize,
        done: Arc<AtomicBool>,
    }

    impl Job for Flagged {
        fn execute(&mut self) -> Result<(), TaskError> {
            self.executed += 1;
            Ok(())
        }

        fn is_done(&self) -> bool {
            self.done.load(Ordering::Acquire)
        }
    }

    struct Increment {
        done: bool,
    }

    impl ChainJob<AtomicUsize> for Increment {
        fn execute(&mut self, token: &AtomicUsize) -> Result<(), TaskError> {
            token.fetch_add(1, Ordering::SeqCst);
            self.done = true;
            Ok(())
        }

        fn is_done(&self) -> bool {
            self.done
        }

        fn reset(&mut self) -> bool {
            self.done = false;
            true
        }
    }

    #[test]
    fn test_iter_task_yields_items_in_order() {
        let mut task = from_iter(vec![Yield::value(1), Yield::Break, Yield::Nothing]);

        assert!(matches!(task.advance().unwrap(), Step::Continue(Yield::Value(_))));
        assert!(matches!(task.advance().unwrap(), Step::Continue(Yield::Break)));
        assert!(matches!(task.advance().unwrap(), Step::Continue(Yield::Nothing)));
        assert!(task.advance().unwrap().is_done());
        assert!(!task.reset());
    }

    #[test]
    fn test_restartable_iter_task_resets() {
        let mut task = IterTask::restartable(|| iter::repeat_with(|| Yield::Nothing).take(2));

        assert!(!task.advance().unwrap().is_done());
        assert!(!task.advance().unwrap().is_done());
        assert!(task.advance().unwrap().is_done());

        assert!(task.reset());
        assert!(!task.advance().unwrap().is_done());
    }

    #[test]
    fn test_job_task_executes_once_and_waits_for_flag() {
        let done = Arc::new(AtomicBool::new(false));
        let mut task = JobTask::new(Flagged {
            executed: 0,
            done: Arc::clone(&done),
        });

        assert!(!task.advance().unwrap().is_done());
        assert!(!task.advance().unwrap().is_done());
        assert_eq!(task.job().executed, 1);

        done.store(true, Ordering::Release);
        assert!(task.advance().unwrap().is_done());
        assert_eq!(task.job().executed, 1);
    }

    #[test]
    fn test_job_task_reset_requires_job_support() {
        let mut task = JobTask::new(Flagged {
            executed: 0,
            done: Arc::new(AtomicBool::new(true)),
        });
        task.advance().unwrap();
        assert!(!task.reset());
    }

    #[test]
    fn test_job_task_propagates_execute_failure() {
        struct Failing;
        impl Job for Failing {
            fn execute(&mut self) -> Result<(), TaskError> {
                Err(TaskError::failed("cannot start"))
            }
            fn is_done(&self) -> bool {
                false
            }
        }

        let mut task = JobTask::new(Failing);
        assert_eq!(
            task.advance().unwrap_err(),
            TaskError::failed("cannot start")
        );
    }

    #[test]
    fn test_chain_step_mutates_token() {
        let token = AtomicUsize::new(0);
        let mut step = ChainStep::new(Increment { done: false });

        assert!(step.advance(&token).unwrap().is_done());
        assert!(step.advance(&token).unwrap().is_done());
        assert_eq!(token.load(Ordering::SeqCst), 1);

        assert!(step.reset());
        assert!(step.advance(&token).unwrap().is_done());
        assert_eq!(token.load(Ordering::SeqCst), 2);
    }
}
