//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

/// Errors surfaced by adapters, the predicate parser and the statistics.
#[derive(Debug, Error)]
pub enum HypographError {
    /// Store unreachable, authentication failed, or adapter already closed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or store-rejected request.
    #[error("query error: {0}")]
    Query(String),

    /// A statistical precondition does not hold.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested native graph algorithm is not offered by the adapter.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A filter predicate could not be parsed.
    #[error("invalid predicate at offset {position}: {message}")]
    InvalidPredicate { position: usize, message: String },

    /// A result row is missing a column or holds an unexpected value.
    #[error("decode error: {0}")]
    Decode(String),
}

impl HypographError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

pub type Result<T> = std::result::Result<T, HypographError>;
