//! Error types for toprank.
//!
//! [`ValidationError`] covers rejected query parameters and is reported to
//! the caller synchronously. [`Error`] covers failures while computing a
//! ranking; those never reach the original caller and are recorded into the
//! task's terminal error state instead.

use thiserror::Error;
use toprank_tasks::TaskError;

/// Result alias for fallible toprank operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while computing or serving rankings.
#[derive(Error, Debug)]
pub enum Error {
    /// The reward ledger refresh failed.
    #[error("reward enrichment failed: {0}")]
    Enrichment(String),

    /// The contribution store could not execute the aggregation, or returned
    /// documents the pipeline cannot interpret.
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// A payout field is missing or does not start with a number.
    #[error("invalid payout in field '{field}': {value}")]
    Payout {
        /// The payout field that failed to parse
        field: &'static str,
        /// The raw value, or a description of why it is absent
        value: String,
    },

    /// A task store operation failed.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The service configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON document could not be decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML parse error: {}", err))
    }
}

/// Rejected query parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `limit` is not an integer in `1..=max_limit`.
    #[error("limit is invalid or too high")]
    Limit,

    /// A reward-bearing or contribution-level query spans too many days.
    #[error("date range is too wide for reward or contribution queries")]
    DateRange,

    /// A parameter could not be parsed.
    #[error("invalid {field}: '{value}'")]
    InvalidValue {
        /// The parameter name
        field: &'static str,
        /// The value as received
        value: String,
    },
}
