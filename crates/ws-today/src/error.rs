// error.rs — Error types for panel filters and priority configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TodayError {
    /// A filter value from the command line or a request was not recognized.
    #[error("unknown {filter} filter '{value}' (expected one of: {expected})")]
    UnknownFilter {
        filter: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Priority configuration out of range.
    #[error("invalid priority config: {0}")]
    InvalidConfig(String),
}
