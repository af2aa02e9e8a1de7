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
pub enum SourceKind {
    Solar,
    Grid,
}

/// A supply that charging batteries draw from while it is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySource {
    pub id: Uuid,
    pub name: String,
    pub kind: SourceKind,
    /// Power available per tick.
    pub output: f64,
    pub is_active: bool,
}

impl EnergySource {
    /// Creates an inactive source with a fresh id.
    pub fn new(name: impl Into<String>, kind: SourceKind, output: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            output,
            is_active: false,
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}

impl Entity for EnergySource {
    const KIND: EntityKind = EntityKind::EnergySource;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), GridError> {
        ensure_non_negative(Self::KIND, &self.name, "output", self.output)
    }
}
