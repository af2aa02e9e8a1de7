//! YAML house description: the devices, energy sources and batteries a
//! household starts with.
//!
//! ```yaml
//! devices:
//!   - { name: Fridge, type: APPLIANCE, power: 150 }
//! energies:
//!   - { name: Rooftop Solar, type: SOLAR, output: 1200 }
//! batteries:
//!   - { name: Garage Battery, capacity: 10000, maxChargeRate: 500 }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{Battery, Device, DeviceKind, EnergySource, SourceKind};
use crate::error::GridError;
use crate::registry::Registries;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct HouseConfig {
    #[serde(default)]
    #[validate(nested)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    #[validate(nested)]
    pub energies: Vec<EnergyConfig>,
    #[serde(default)]
    #[validate(nested)]
    pub batteries: Vec<BatteryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    #[validate(range(min = 0.0))]
    pub power: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnergyConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[validate(range(min = 0.0))]
    pub output: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatteryConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(exclusive_min = 0.0))]
    pub capacity: f64,
    #[serde(alias = "maxChargeRate")]
    #[validate(range(min = 0.0))]
    pub max_charge_rate: f64,
    /// Falls back to `max_charge_rate` when absent.
    #[serde(default, alias = "maxDischargeRate", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub max_discharge_rate: Option<f64>,
}

/// How many records `apply` created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HouseSummary {
    pub devices: usize,
    pub sources: usize,
    pub batteries: usize,
}

impl HouseConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let house: HouseConfig = serde_yaml::from_str(yaml).context("parsing house configuration")?;
        house.validate().context("validating house configuration")?;
        Ok(house)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading house configuration {}", path.display()))?;
        Self::from_yaml(&yaml)
    }

    /// Replaces the registries' contents with this house.
    ///
    /// Everything starts idle: devices and sources off, batteries empty.
    /// Callers stop any running sessions first.
    pub fn apply(&self, registries: &Registries) -> Result<HouseSummary, GridError> {
        registries.devices.clear();
        registries.sources.clear();
        registries.batteries.clear();

        for device in &self.devices {
            registries
                .devices
                .add(Device::new(device.name.clone(), device.kind, device.power))?;
        }
        for energy in &self.energies {
            registries
                .sources
                .add(EnergySource::new(energy.name.clone(), energy.kind, energy.output))?;
        }
        for battery in &self.batteries {
            let record = Battery::new(battery.name.clone(), battery.capacity, battery.max_charge_rate);
            let record = match battery.max_discharge_rate {
                Some(rate) => record.with_max_discharge_rate(rate),
                None => record,
            };
            registries.batteries.add(record)?;
        }

        Ok(HouseSummary {
            devices: self.devices.len(),
            sources: self.energies.len(),
            batteries: self.batteries.len(),
        })
    }
}
