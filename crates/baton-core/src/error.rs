//! Error types for core parsing and validation.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing identities, tiers, or configuration values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("client identity must not be empty")]
    EmptyIdentity,

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("invalid duration {value:?} for {field}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
