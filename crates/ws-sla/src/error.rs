// error.rs — Error types for SLA evaluation and the breach ledger.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlaError {
    /// Reading or writing the breach ledger failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A configured rule is unusable.
    #[error("invalid SLA rule '{rule_name}': {reason}")]
    InvalidRule { rule_name: String, reason: String },
}
