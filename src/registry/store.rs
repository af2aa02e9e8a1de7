use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::domain::Entity;
use crate::error::GridError;
use crate::events::{journal, EventSink};

/// Thread-safe keyed store for one entity kind.
pub struct Registry<T: Entity> {
    items: RwLock<HashMap<Uuid, T>>,
    events: Arc<dyn EventSink>,
}

impl<T: Entity> Registry<T> {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Validates and stores `item`, replacing any record with the same id.
    pub fn add(&self, item: T) -> Result<Uuid, GridError> {
        item.validate()?;
        let id = item.id();
        let name = item.name().to_owned();
        self.items.write().insert(id, item);
        journal::registry_event(self.events.as_ref(), T::KIND, "Added new", &name);
        Ok(id)
    }

    pub fn remove_by_id(&self, id: Uuid) -> Option<T> {
        let removed = self.items.write().remove(&id);
        match &removed {
            Some(item) => journal::registry_event(self.events.as_ref(), T::KIND, "Removed", item.name()),
            None => warn!(kind = %T::KIND, %id, "attempted to remove a record that does not exist"),
        }
        removed
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<T, GridError> {
        self.items
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GridError::not_found(T::KIND, id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.read().contains_key(&id)
    }

    /// All records, ordered by name.
    pub fn list_all(&self) -> Vec<T> {
        self.list_by(|_| true)
    }

    pub fn list_by(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut items: Vec<T> = self
            .items
            .read()
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        items
    }

    pub fn ids_by(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<Uuid> {
        self.items
            .read()
            .values()
            .filter(|item| predicate(item))
            .map(|item| item.id())
            .collect()
    }

    pub fn fold<A>(&self, init: A, f: impl FnMut(A, &T) -> A) -> A {
        self.items.read().values().fold(init, f)
    }

    /// Applies `f` to the record under the write lock.
    ///
    /// `f` must not call back into this registry.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut T) -> R) -> Result<R, GridError> {
        let mut items = self.items.write();
        let item = items
            .get_mut(&id)
            .ok_or_else(|| GridError::not_found(T::KIND, id))?;
        Ok(f(item))
    }

    /// Applies `f` to every record; used for bulk state resets.
    pub fn update_all(&self, mut f: impl FnMut(&mut T)) {
        self.items.write().values_mut().for_each(|item| f(item));
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Battery, Device, DeviceKind, EntityKind};
    use crate::events::MemoryEventLog;

    fn store<T: Entity>() -> (Registry<T>, Arc<MemoryEventLog>) {
        let log = Arc::new(MemoryEventLog::default());
        (Registry::new(log.clone()), log)
    }

    #[test]
    fn add_then_lookup_and_remove() {
        let (batteries, log) = store::<Battery>();
        let id = batteries.add(Battery::new("Garage", 1000.0, 100.0)).unwrap();

        assert_eq!(batteries.get_by_id(id).unwrap().name, "Garage");
        assert!(batteries.contains(id));
        assert_eq!(batteries.remove_by_id(id).unwrap().name, "Garage");
        assert!(batteries.remove_by_id(id).is_none());

        let messages: Vec<String> = log.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["Added new battery: Garage", "Removed battery: Garage"]);
    }

    #[test]
    fn missing_record_is_not_found() {
        let (devices, _) = store::<Device>();
        let id = Uuid::new_v4();
        match devices.get_by_id(id) {
            Err(GridError::NotFound { kind, id: missing }) => {
                assert_eq!(kind, EntityKind::Device);
                assert_eq!(missing, id);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(devices.update(id, |d| d.is_active = true).is_err());
    }

    #[test]
    fn invalid_records_are_not_stored() {
        let (batteries, log) = store::<Battery>();
        assert!(batteries.add(Battery::new("Broken", -1.0, 10.0)).is_err());
        assert!(batteries.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn list_by_filters_and_orders_by_name() {
        let (devices, _) = store::<Device>();
        devices.add(Device::new("Toaster", DeviceKind::Appliance, 800.0).active()).unwrap();
        devices.add(Device::new("Lamp", DeviceKind::Lighting, 15.0).active()).unwrap();
        devices.add(Device::new("Heater", DeviceKind::Heating, 1500.0)).unwrap();

        let names: Vec<String> = devices.list_by(|d| d.is_active).into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["Lamp", "Toaster"]);
        assert_eq!(devices.list_all().len(), 3);

        devices.update_all(|d| d.is_active = false);
        assert!(devices.ids_by(|d| d.is_active).is_empty());
        devices.clear();
        assert_eq!(devices.len(), 0);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let (batteries, _) = store::<Battery>();
        let batteries = Arc::new(batteries);
        let id = batteries.add(Battery::new("Shared", 10_000.0, 1.0)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let batteries = batteries.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        batteries.update(id, |b| b.current_charge += 1.0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(batteries.get_by_id(id).unwrap().current_charge, 800.0);
    }
}
