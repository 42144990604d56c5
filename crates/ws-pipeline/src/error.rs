// error.rs — Error types for the pipeline subsystem.

use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::EntityKind;
use crate::pursuit::PursuitStage;

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize a record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    /// The requested status/stage is not in the legal set for the current one.
    #[error("invalid transition from {from} to {to} for {entity} {id}")]
    InvalidTransition {
        entity: EntityKind,
        id: Uuid,
        from: String,
        to: String,
    },

    /// Stage advancement blocked by incomplete required checklist items.
    #[error(
        "checklist incomplete for pursuit {pursuit_id} entering {stage}: {}",
        .missing.join(", ")
    )]
    ChecklistIncomplete {
        pursuit_id: Uuid,
        stage: PursuitStage,
        missing: Vec<String>,
    },

    /// A field failed validation before anything was written.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// A notification dispatch failed (non-fatal).
    #[error("notification error: {0}")]
    NotificationError(String),
}

impl PipelineError {
    /// Validation-class errors are answered to the caller and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::NotFound { .. }
                | PipelineError::InvalidTransition { .. }
                | PipelineError::ChecklistIncomplete { .. }
                | PipelineError::Validation { .. }
        )
    }
}
