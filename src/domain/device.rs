use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{ensure_non_negative, Entity, EntityKind};
use crate::error::GridError;

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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceKind {
    Lighting,
    Appliance,
    Heating,
}

/// A household consumer. `is_active` means it is currently drawing power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub kind: DeviceKind,
    /// Fixed draw per tick.
    pub power: f64,
    pub is_active: bool,
}

impl Device {
    pub fn new(name: impl Into<String>, kind: DeviceKind, power: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            power,
            is_active: false,
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Draw this device contributes to the household total right now.
    pub fn current_draw(&self) -> f64 {
        if self.is_active {
            self.power
        } else {
            0.0
        }
    }
}

impl Entity for Device {
    const KIND: EntityKind = EntityKind::Device;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), GridError> {
        ensure_non_negative(Self::KIND, &self.name, "power", self.power)
    }
}
