use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{EventCategory, EventRecord, EventSink};

const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded in-memory event history. Oldest records are dropped first.
#[derive(Debug)]
pub struct MemoryEventLog {
    records: Mutex<VecDeque<EventRecord>>,
    capacity: usize,
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryEventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn by_category(&self, category: EventCategory) -> Vec<EventRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    /// Records whose subject or message contains `keyword`.
    pub fn search(&self, keyword: &str) -> Vec<EventRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.subject.contains(keyword) || r.message.contains(keyword))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl EventSink for MemoryEventLog {
    fn publish(&self, event: EventRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(event);
    }
}
