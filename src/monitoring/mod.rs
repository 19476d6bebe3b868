//! Run Monitoring Module
//!
//! Records the lifecycle of scheduled runs for timing reports.
//!
//! # Components
//!
//! - [`Timeline`]: Run scheduling and termination events, Gantt charts

pub mod timeline;

pub use timeline::{EventType, Timeline, TimelineEvent};
