// error.rs — Errors surfaced by the collaborator and command layer.
//
// Validation-class failures (table rejections, gate failures, missing
// records) come through as `Pipeline` and are answered to the caller as-is.
// `Transient` failures are the ones worth retrying.

use thiserror::Error;
use uuid::Uuid;

use ws_outbox::OutboxError;
use ws_pipeline::{EntityKind, PipelineError};
use ws_sla::SlaError;
use ws_today::TodayError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Sla(#[from] SlaError),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Today(#[from] TodayError),

    /// Network, timeout or lock failure. Safe to retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The cached copy allowed a transition the collaborator rejected. The
    /// cache has been refreshed; `current` is the status it now holds.
    #[error("stale read for {entity} {id}: cached {cached}, now {current}")]
    StaleRead {
        entity: EntityKind,
        id: Uuid,
        cached: String,
        current: String,
    },

    /// A newer request for the same panel filter was issued; this response
    /// was discarded.
    #[error("panel refresh superseded for '{key}' (generation {generation})")]
    Superseded { key: String, generation: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }

    /// The collaborator rejected a status change as not in the table.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            ClientError::Pipeline(PipelineError::InvalidTransition { .. })
        )
    }
}
