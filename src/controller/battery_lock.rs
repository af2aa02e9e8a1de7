use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// One mutex per battery id.
///
/// Charge and power workers take the battery's mutex around every
/// read-modify-write of its charge, so flows on the same battery serialize
/// while different batteries never contend. Guards are never held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct BatteryLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl BatteryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, battery_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(battery_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the mutex of a battery nobody is using anymore.
    pub fn forget(&self, battery_id: Uuid) {
        let mut locks = self.locks.lock();
        if locks
            .get(&battery_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&battery_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
