//! Run Timeline
//!
//! Records when runs are scheduled and how they end, for timing reports and
//! Gantt charts of a runner's activity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::{lock, Outcome};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Run accepted by a runner
    Scheduled,
    Completed,
    Broken,
    Faulted,
    Stopped,
    Superseded,
    Abandoned,
}

impl EventType {
    /// True for every event that ends a run.
    pub fn is_terminal(self) -> bool {
        self != Self::Scheduled
    }
}

impl From<&Outcome> for EventType {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Completed => Self::Completed,
            Outcome::Broken => Self::Broken,
            Outcome::Stopped => Self::Stopped,
            Outcome::Faulted(_) => Self::Faulted,
            Outcome::Superseded => Self::Superseded,
            Outcome::Abandoned => Self::Abandoned,
        }
    }
}

/// A single event in the timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    /// Label of the run
    pub run: String,
    pub event_type: EventType,
    /// Monotonic time of the event
    #[serde(skip)]
    pub timestamp: Instant,
    /// Wall-clock time of the event
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

/// Shared, append-only record of run lifecycle events.
///
/// Clones record into the same timeline, so one timeline can be handed to
/// several runners.
#[derive(Debug, Clone)]
pub struct Timeline {
    inner: Arc<Mutex<Inner>>,
}

impl Timeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                events: Vec::new(),
                start_time: Instant::now(),
            })),
        }
    }

    /// Records an event for a run.
    pub fn record(&self, run: &str, event_type: EventType) {
        lock(&self.inner).events.push(TimelineEvent {
            run: run.to_string(),
            event_type,
            timestamp: Instant::now(),
            recorded_at: Utc::now(),
        });
    }

    /// Returns a snapshot of all recorded events.
    pub fn events(&self) -> Vec<TimelineEvent> {
        lock(&self.inner).events.clone()
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        lock(&self.inner).start_time.elapsed()
    }

    /// Returns run durations in milliseconds, from scheduling to the end.
    ///
    /// Runs that have not ended are left out.
    pub fn durations(&self) -> HashMap<String, u128> {
        let inner = lock(&self.inner);
        let mut starts: HashMap<&str, Instant> = HashMap::new();
        let mut durations = HashMap::new();

        for event in &inner.events {
            if event.event_type.is_terminal() {
                if let Some(start) = starts.get(event.run.as_str()) {
                    durations.insert(
                        event.run.clone(),
                        event.timestamp.duration_since(*start).as_millis(),
                    );
                }
            } else {
                starts.insert(&event.run, event.timestamp);
            }
        }

        durations
    }

    /// Generates an ASCII Gantt chart of the finished runs.
    pub fn gantt_chart(&self) -> String {
        let inner = lock(&self.inner);
        let mut output = String::from("\nRun Timeline:\n\n");

        let total_time = inner.start_time.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        let mut spans: HashMap<&str, (u128, Option<(u128, EventType)>)> = HashMap::new();
        for event in &inner.events {
            let elapsed = event.timestamp.duration_since(inner.start_time).as_millis();
            if event.event_type.is_terminal() {
                if let Some(span) = spans.get_mut(event.run.as_str()) {
                    span.1 = Some((elapsed, event.event_type));
                }
            } else {
                spans.insert(&event.run, (elapsed, None));
            }
        }

        let mut sorted: Vec<_> = spans
            .into_iter()
            .filter_map(|(run, (start, end))| end.map(|(end, kind)| (run, start, end, kind)))
            .collect();
        sorted.sort_by_key(|(run, start, _, _)| (*start, *run));

        for (run, start, end, kind) in sorted {
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            output.push_str(&format!(
                "{:12} |{}| ({} ms, {:?})\n",
                truncate(run, 12),
                bar,
                end - start,
                kind
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    /// Exports the events as a JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&lock(&self.inner).events)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a label to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
