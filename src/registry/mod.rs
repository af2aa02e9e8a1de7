//! # Registries
//!
//! Keyed stores for batteries, energy sources and devices. Each store is a
//! `parking_lot::RwLock<HashMap<Uuid, T>>`: reads hand out clones, writes go
//! through [`Registry::update`] so every mutation is applied atomically with
//! respect to other registry calls.
//!
//! Multi-step read-modify-write sequences on a battery's charge are not the
//! registry's business; the coordinator serializes those with its per-battery
//! locks.

mod store;

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Battery, Device, EnergySource, Entity};
use crate::error::GridError;
use crate::events::{journal, EventSink};

pub use store::Registry;

/// The three registries the coordinator works against.
pub struct Registries {
    pub batteries: Registry<Battery>,
    pub sources: Registry<EnergySource>,
    pub devices: Registry<Device>,
    events: Arc<dyn EventSink>,
}

impl Registries {
    pub fn new(events: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            batteries: Registry::new(events.clone()),
            sources: Registry::new(events.clone()),
            devices: Registry::new(events.clone()),
            events,
        })
    }

    pub fn active_sources(&self) -> Vec<EnergySource> {
        self.sources_by_state(true)
    }

    pub fn sources_by_state(&self, active: bool) -> Vec<EnergySource> {
        self.sources.list_by(|s| s.is_active == active)
    }

    pub fn batteries_by_state(&self, charging: bool) -> Vec<Battery> {
        self.batteries.list_by(|b| b.is_charging == charging)
    }

    pub fn devices_by_state(&self, active: bool) -> Vec<Device> {
        self.devices.list_by(|d| d.is_active == active)
    }

    /// Aggregate draw of every device that is currently on.
    pub fn total_device_draw(&self) -> f64 {
        self.devices.fold(0.0, |total, d| total + d.current_draw())
    }

    pub fn total_battery_charge(&self) -> f64 {
        self.batteries.fold(0.0, |total, b| total + b.current_charge)
    }

    /// Flips a source on or off. Returns the new state.
    pub fn toggle_source(&self, id: Uuid) -> Result<bool, GridError> {
        let (name, active) = self.sources.update(id, |s| {
            s.is_active = !s.is_active;
            (s.name.clone(), s.is_active)
        })?;
        journal::toggle_event(self.events.as_ref(), EnergySource::KIND, &name, active);
        Ok(active)
    }

    pub fn set_source_active(&self, id: Uuid, active: bool) -> Result<(), GridError> {
        let (name, changed) = self.sources.update(id, |s| {
            let changed = s.is_active != active;
            s.is_active = active;
            (s.name.clone(), changed)
        })?;
        if changed {
            journal::toggle_event(self.events.as_ref(), EnergySource::KIND, &name, active);
        }
        Ok(())
    }

    /// Flips a device on or off outside of any powering session.
    ///
    /// Switching off a device that a battery is powering ends that session on
    /// the worker's next tick.
    pub fn toggle_device(&self, id: Uuid) -> Result<bool, GridError> {
        let (name, active) = self.devices.update(id, |d| {
            d.is_active = !d.is_active;
            (d.name.clone(), d.is_active)
        })?;
        journal::toggle_event(self.events.as_ref(), Device::KIND, &name, active);
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceKind, SourceKind};
    use crate::events::{EventCategory, MemoryEventLog};

    fn registries() -> (Arc<Registries>, Arc<MemoryEventLog>) {
        let log = Arc::new(MemoryEventLog::default());
        (Registries::new(log.clone()), log)
    }

    #[test]
    fn totals_only_count_active_devices() {
        let (reg, _) = registries();
        reg.devices.add(Device::new("Lamp", DeviceKind::Lighting, 20.0).active()).unwrap();
        reg.devices.add(Device::new("Oven", DeviceKind::Appliance, 500.0)).unwrap();
        reg.batteries.add(Battery::new("A", 100.0, 10.0).with_charge(40.0)).unwrap();
        reg.batteries.add(Battery::new("B", 100.0, 10.0).with_charge(2.5)).unwrap();

        assert_eq!(reg.total_device_draw(), 20.0);
        assert_eq!(reg.total_battery_charge(), 42.5);
        assert_eq!(reg.devices_by_state(false).len(), 1);
        assert_eq!(reg.batteries_by_state(false).len(), 2);
    }

    #[test]
    fn toggling_a_source_changes_the_active_view() {
        let (reg, log) = registries();
        let id = reg.sources.add(EnergySource::new("Roof", SourceKind::Solar, 300.0)).unwrap();
        assert!(reg.active_sources().is_empty());

        assert!(reg.toggle_source(id).unwrap());
        assert_eq!(reg.active_sources().len(), 1);
        assert!(!reg.toggle_source(id).unwrap());
        assert_eq!(reg.sources_by_state(false).len(), 1);

        let energy = log.by_category(EventCategory::Energy);
        assert_eq!(energy.last().unwrap().message, "Deactivated energy: Roof");
    }

    #[test]
    fn set_source_active_only_logs_changes() {
        let (reg, log) = registries();
        let id = reg.sources.add(EnergySource::new("Mains", SourceKind::Grid, 1000.0)).unwrap();
        log.clear();

        reg.set_source_active(id, false).unwrap();
        assert!(log.is_empty());
        reg.set_source_active(id, true).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn toggling_unknown_device_is_not_found() {
        let (reg, _) = registries();
        let err = reg.toggle_device(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());
    }
}
