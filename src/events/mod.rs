//! # Event log
//!
//! Every state change the coordinator makes is reported to an [`EventSink`]
//! as a categorized, timestamped record. The coordinator only depends on the
//! trait; storage is up to the sink:
//!
//! - [`MemoryEventLog`]: bounded in-process history, used by tests and the monitor
//! - [`FileEventLog`]: append-only per-category files written by a background task
//! - [`TracingEventSink`]: forwards records to `tracing`
//!
//! [`journal`] holds the message formats shared by all producers.

pub mod file;
pub mod journal;
pub mod memory;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use file::FileEventLog;
pub use memory::MemoryEventLog;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EventCategory {
    Device,
    Energy,
    Battery,
    System,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Device,
        EventCategory::Energy,
        EventCategory::Battery,
        EventCategory::System,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub category: EventCategory,
    /// Name of the battery, source, device or component the event is about.
    pub subject: String,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

impl EventRecord {
    pub fn now(category: EventCategory, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            subject: subject.into(),
            message: message.into(),
            timestamp: Local::now(),
        }
    }
}

/// Destination for coordinator events.
///
/// `publish` is called from worker tasks and must return quickly; sinks that
/// do IO hand the record off instead of writing inline.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: EventRecord);

    fn record(&self, category: EventCategory, subject: &str, message: &str) {
        self.publish(EventRecord::now(category, subject, message));
    }
}

/// Sink that turns every record into a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: EventRecord) {
        info!(
            category = %event.category,
            subject = %event.subject,
            "{}",
            event.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_use_lowercase_names() {
        let names: Vec<String> = EventCategory::ALL.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["device", "energy", "battery", "system"]);
        assert_eq!("BATTERY".parse::<EventCategory>().unwrap(), EventCategory::Battery);
    }

    #[test]
    fn record_builds_timestamped_event() {
        let log = MemoryEventLog::default();
        log.record(EventCategory::System, "System Monitor", "hello");
        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject, "System Monitor");
        assert_eq!(records[0].message, "hello");
    }
}
