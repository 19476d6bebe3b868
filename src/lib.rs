//! TaskRunner - Cooperative Task Scheduling Runtime
//!
//! Express units of work as tasks that advance one step at a time, compose
//! them serially or in parallel, and run them inline or on background worker
//! threads with pause, stop, restart and fault reporting.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`task`]: The step protocol and leaf task adapters
//! - [`collection`]: Serial, parallel and multi-threaded composites
//! - [`execution`]: Continuators, task routines and the runtime context
//! - [`runner`]: Synchronous, manual and multi-threaded runners
//! - [`monitoring`]: Run lifecycle timeline
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use taskrunner::collection::SerialCollection;
//! use taskrunner::task::{from_iter, Yield};
//! use taskrunner::{MultiThreadRunner, Outcome, Runtime};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = Runtime::new();
//!     let runner = Arc::new(MultiThreadRunner::new("background")?);
//!
//!     let routine = runtime.allocate_routine_on(runner);
//!     routine.set_factory(|| {
//!         let mut serial = SerialCollection::new();
//!         serial.add(from_iter(vec![Yield::Nothing, Yield::value(1)]));
//!         serial.add(from_iter(vec![Yield::Nothing]));
//!         serial
//!     });
//!
//!     let continuator = routine.start()?;
//!     assert_eq!(continuator.wait(), Outcome::Completed);
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod runner;
pub mod task;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use collection::{MultiThreadedParallelCollection, ParallelCollection, SerialCollection};
pub use error::{RoutineError, RunnerError, TaskError};
pub use execution::{Callbacks, Continuator, Outcome, RoutineState, Runtime, TaskRoutine};
pub use runner::{
    load_runner_config, ManualRunner, MultiThreadRunner, Runner, RunnerConfig, RunnerExt,
    SyncRunner,
};
pub use task::{Step, Task, TaskExt, Yield};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "TaskRunner";
