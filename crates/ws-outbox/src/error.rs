// error.rs — Error types for the outbox.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OutboxError {
    /// Failed to open or create the outbox log file.
    #[error("failed to open outbox at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append outbox entry: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The log was edited after the fact; the hash chain no longer links.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// No pending event with this id.
    #[error("no pending outbox event {0}")]
    UnknownEvent(Uuid),

    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),
}
