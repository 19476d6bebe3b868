//! Task Execution Module
//!
//! Everything between a task and the runner that drives it: the handle a
//! caller keeps for one run, the per-run bookkeeping runners hold, and the
//! reusable routine slot with its start/stop/pause/resume state machine.
//!
//! # Architecture
//!
//! - [`continuator`]: Cross-thread handle observing one run
//! - [`process`]: A scheduled run as seen by a runner
//! - [`routine`]: Reusable named execution slot bound to one runner
//! - [`runtime`]: Explicit context that allocates routines

pub mod continuator;
pub mod process;
pub mod routine;
pub mod runtime;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use continuator::{Continuator, Outcome};
pub use process::{Process, Tick};
pub use routine::{Callbacks, RoutineState, TaskRoutine};
pub use runtime::Runtime;

/// Locks a mutex, recovering the data if a panicking step poisoned it.
///
/// Step panics are already reported as faults, so the guarded state is
/// still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
