use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GridError;
use crate::events::EventCategory;

/// The three kinds of records the registries hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum EntityKind {
    #[strum(serialize = "battery")]
    Battery,
    #[strum(serialize = "energy")]
    EnergySource,
    #[strum(serialize = "device")]
    Device,
}

impl EntityKind {
    /// Event-log category that registry changes for this kind are filed under.
    pub fn category(self) -> EventCategory {
        match self {
            EntityKind::Battery => EventCategory::Battery,
            EntityKind::EnergySource => EventCategory::Energy,
            EntityKind::Device => EventCategory::Device,
        }
    }
}

/// A record that can live in a [`Registry`](crate::registry::Registry).
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn name(&self) -> &str;

    /// Checks the record against the data-model bounds before it is stored.
    fn validate(&self) -> Result<(), GridError> {
        Ok(())
    }
}

pub(crate) fn ensure_non_negative(
    kind: EntityKind,
    name: &str,
    field: &str,
    value: f64,
) -> Result<(), GridError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GridError::invalid(
            kind,
            name,
            format!("{field} must be a finite value >= 0, got {value}"),
        ))
    }
}
