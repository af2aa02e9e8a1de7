use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{ensure_non_negative, Entity, EntityKind};
use crate::error::GridError;

/// A storage battery.
///
/// `current_charge` stays within `0..=capacity`; `is_charging` is owned by the
/// coordinator and is true exactly while a charging supervisor runs for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub id: Uuid,
    pub name: String,
    pub capacity: f64,
    pub current_charge: f64,
    /// Upper bound on charge inflow per tick.
    pub max_charge_rate: f64,
    /// Upper bound on discharge per tick; defaults to the charge rate.
    pub max_discharge_rate: f64,
    pub is_charging: bool,
}

impl Battery {
    /// Creates an empty, idle battery with a fresh id.
    pub fn new(name: impl Into<String>, capacity: f64, max_charge_rate: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            capacity,
            current_charge: 0.0,
            max_charge_rate,
            max_discharge_rate: max_charge_rate,
            is_charging: false,
        }
    }

    pub fn with_charge(mut self, current_charge: f64) -> Self {
        self.current_charge = current_charge;
        self
    }

    pub fn with_max_discharge_rate(mut self, rate: f64) -> Self {
        self.max_discharge_rate = rate;
        self
    }

    /// Remaining chargeable headroom.
    pub fn deficit(&self) -> f64 {
        self.capacity - self.current_charge
    }

    pub fn is_full(&self) -> bool {
        self.deficit() <= 0.0
    }
}

impl Entity for Battery {
    const KIND: EntityKind = EntityKind::Battery;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), GridError> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(GridError::invalid(
                Self::KIND,
                &self.name,
                format!("capacity must be > 0, got {}", self.capacity),
            ));
        }
        ensure_non_negative(Self::KIND, &self.name, "max_charge_rate", self.max_charge_rate)?;
        ensure_non_negative(Self::KIND, &self.name, "max_discharge_rate", self.max_discharge_rate)?;
        ensure_non_negative(Self::KIND, &self.name, "current_charge", self.current_charge)?;
        if self.current_charge > self.capacity {
            return Err(GridError::invalid(
                Self::KIND,
                &self.name,
                format!(
                    "current_charge {} exceeds capacity {}",
                    self.current_charge, self.capacity
                ),
            ));
        }
        Ok(())
    }
}
