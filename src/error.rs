use thiserror::Error;
use uuid::Uuid;

use crate::domain::EntityKind;

/// Errors surfaced by the registries, the coordinator and the event log.
///
/// Running supervisors never produce these; they only arise when a session
/// is started or stopped, or when an entity is added or looked up.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("invalid {kind} '{name}': {reason}")]
    InvalidEntity {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error("event log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event log archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl GridError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn invalid(kind: EntityKind, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
