pub mod battery_lock;
mod charge_worker;
mod charging;
pub mod coordinator;
pub mod monitor;
mod powering;
pub mod session;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::EventSink;
use crate::house::{HouseConfig, HouseSummary};
use crate::registry::Registries;

pub use battery_lock::BatteryLocks;
pub use charge_worker::ChargeStop;
pub use coordinator::{Coordinator, StartOutcome};
pub use monitor::{GridStatus, SystemMonitor};
pub use powering::PowerStop;

/// What every supervisor and worker needs to do its job.
#[derive(Clone)]
pub(crate) struct FlowContext {
    pub registries: Arc<Registries>,
    pub events: Arc<dyn EventSink>,
    pub locks: Arc<BatteryLocks>,
    pub tick: Duration,
}

/// Process-wide state, built once at startup.
#[derive(Clone)]
pub struct GridContext {
    pub cfg: Config,
    pub registries: Arc<Registries>,
    pub events: Arc<dyn EventSink>,
    pub coordinator: Arc<Coordinator>,
    pub monitor: Arc<SystemMonitor>,
}

impl GridContext {
    pub fn new(cfg: Config, events: Arc<dyn EventSink>) -> Self {
        let registries = Registries::new(events.clone());
        let coordinator = Arc::new(Coordinator::new(
            registries.clone(),
            events.clone(),
            &cfg.coordinator,
        ));
        let monitor = Arc::new(SystemMonitor::new(
            registries.clone(),
            events.clone(),
            cfg.monitor.interval(),
        ));
        Self {
            cfg,
            registries,
            events,
            coordinator,
            monitor,
        }
    }

    /// Seeds the registries from a YAML house description.
    pub fn load_house(&self, path: &Path) -> Result<HouseSummary> {
        let house = HouseConfig::from_file(path)?;
        let summary = house.apply(&self.registries)?;
        info!(
            path = %path.display(),
            devices = summary.devices,
            sources = summary.sources,
            batteries = summary.batteries,
            "house configuration applied"
        );
        Ok(summary)
    }

    pub fn spawn_background_tasks(&self) {
        if !self.cfg.monitor.enabled {
            return;
        }
        let monitor = self.monitor.clone();
        if !self
            .coordinator
            .spawn_background("system_monitor", move |token| monitor.run(token))
        {
            warn!("coordinator is shut down, system monitor not started");
        }
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}
