//! Error types for the Valise engine.

use thiserror::Error;

/// All possible errors from the Valise engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The document could not be parsed at all. Individually malformed
    /// fields inside a parseable document are coerced, not rejected.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
