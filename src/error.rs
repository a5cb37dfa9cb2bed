//! Error types for shortlist handling.

use crate::config::ConfigError;
use crate::persistence::DType;
use thiserror::Error;

/// Result type for shortlist operations.
pub type Result<T> = std::result::Result<T, ShortlistError>;

/// Error type for shortlist operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ShortlistError {
    /// Shortlist method name not recognised by the factory.
    #[error("unknown shortlist method: {0}")]
    UnsupportedMethod(String),

    /// Layered configuration could not be extracted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration values that cannot work together.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Write slot other than `-1` or a non-negative key.
    #[error("invalid row slot {0}: expected -1 (append) or a non-negative key")]
    InvalidSlot(i64),

    /// Lookup of a key that was never written.
    #[error("no row for key {key} in {table} table")]
    MissingKey { table: &'static str, key: u64 },

    /// Extended handler queried before `update_dynamic`.
    #[error("dynamic shortlist has not been provided")]
    MissingDynamic,

    /// Table file holds a different element type.
    #[error("table holds {found:?} values, expected {expected:?}")]
    DTypeMismatch { expected: DType, found: DType },

    /// Table file is truncated or not a table file at all.
    #[error("malformed table file: {0}")]
    Format(String),

    /// Operation not offered by this handler variant.
    #[error("{0} is not supported by this shortlist handler")]
    Unsupported(&'static str),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Header encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl ShortlistError {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ShortlistError::InvalidConfig(msg.into())
    }

    /// Create a malformed table error.
    pub fn format(msg: impl Into<String>) -> Self {
        ShortlistError::Format(msg.into())
    }

    /// True for lookups of keys that were never written.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, ShortlistError::MissingKey { .. })
    }
}
