//! # System monitor
//!
//! Periodic whole-house check. Every interval it totals the draw of active
//! devices and the charge stored across batteries, records both as a system
//! event and warns when the draw exceeds what the batteries hold.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{EventCategory, EventSink};
use crate::registry::Registries;

const SUBJECT: &str = "System Monitor";

/// Household totals from the most recent check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridStatus {
    pub total_consumption: f64,
    pub total_battery_charge: f64,
    pub active_devices: usize,
    pub active_sources: usize,
    pub charging_batteries: usize,
    /// Draw exceeds stored charge.
    pub power_warning: bool,
    pub checked_at: Option<DateTime<Local>>,
}

pub struct SystemMonitor {
    registries: Arc<Registries>,
    events: Arc<dyn EventSink>,
    interval: Duration,
    latest: RwLock<GridStatus>,
}

impl SystemMonitor {
    pub fn new(registries: Arc<Registries>, events: Arc<dyn EventSink>, interval: Duration) -> Self {
        Self {
            registries,
            events,
            interval,
            latest: RwLock::new(GridStatus::default()),
        }
    }

    /// Runs one check and records its events.
    pub fn check(&self) -> GridStatus {
        let registries = &self.registries;
        let total_consumption = registries.total_device_draw();
        let total_battery_charge = registries.total_battery_charge();
        let status = GridStatus {
            total_consumption,
            total_battery_charge,
            active_devices: registries.devices_by_state(true).len(),
            active_sources: registries.active_sources().len(),
            charging_batteries: registries.batteries_by_state(true).len(),
            power_warning: total_consumption > total_battery_charge,
            checked_at: Some(Local::now()),
        };

        self.events.record(
            EventCategory::System,
            SUBJECT,
            &format!("Total Consumption: {total_consumption:.2}, Total Battery Charge: {total_battery_charge:.2}"),
        );
        if status.power_warning {
            warn!(
                consumption = total_consumption,
                battery_charge = total_battery_charge,
                "power consumption exceeds total battery charge"
            );
            self.events.record(
                EventCategory::System,
                SUBJECT,
                &format!(
                    "POWER WARNING: Consumption {total_consumption:.2} units exceeds total battery charge {total_battery_charge:.2}"
                ),
            );
        }

        *self.latest.write() = status.clone();
        status
    }

    /// Totals from the last check; all zero before the first one.
    pub fn snapshot(&self) -> GridStatus {
        self.latest.read().clone()
    }

    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.check();
                }
            }
        }
        debug!("system monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Battery, Device, DeviceKind};
    use crate::events::MemoryEventLog;

    fn monitor() -> (SystemMonitor, Arc<Registries>, Arc<MemoryEventLog>) {
        let log = Arc::new(MemoryEventLog::default());
        let registries = Registries::new(log.clone());
        let monitor = SystemMonitor::new(registries.clone(), log.clone(), Duration::from_secs(5));
        (monitor, registries, log)
    }

    #[test]
    fn records_totals() {
        let (monitor, registries, log) = monitor();
        registries.batteries.add(Battery::new("A", 1000.0, 50.0).with_charge(300.0)).unwrap();
        registries.devices.add(Device::new("Lamp", DeviceKind::Lighting, 60.0).active()).unwrap();
        log.clear();

        let status = monitor.check();

        assert_eq!(status.total_consumption, 60.0);
        assert_eq!(status.total_battery_charge, 300.0);
        assert!(!status.power_warning);
        assert_eq!(monitor.snapshot(), status);
        let records = log.by_category(EventCategory::System);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "Total Consumption: 60.00, Total Battery Charge: 300.00");
    }

    #[test]
    fn warns_when_draw_exceeds_stored_charge() {
        let (monitor, registries, log) = monitor();
        registries.batteries.add(Battery::new("A", 1000.0, 50.0).with_charge(100.0)).unwrap();
        registries.devices.add(Device::new("Heater", DeviceKind::Heating, 900.0).active()).unwrap();
        log.clear();

        assert!(monitor.check().power_warning);
        assert_eq!(
            log.records().last().unwrap().message,
            "POWER WARNING: Consumption 900.00 units exceeds total battery charge 100.00"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_checks_every_interval_until_cancelled() {
        let (monitor, _, log) = monitor();
        let monitor = Arc::new(monitor);
        let token = CancellationToken::new();
        let handle = tokio::spawn(monitor.clone().run(token.clone()));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        token.cancel();
        handle.await.unwrap();

        // Checks at 0s, 5s and 10s.
        assert_eq!(log.len(), 3);
        assert!(monitor.snapshot().checked_at.is_some());
    }
}
