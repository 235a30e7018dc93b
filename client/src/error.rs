//! Unified error handling for the client runtime.
//!
//! Transport and Schema errors on sync paths are non-fatal by design: the
//! optimistic local state stays authoritative and callers log-and-continue.
//! Quota errors only ever degrade the lightweight mirror, never the primary
//! record.

use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Remote unreachable, timeout, or a non-success status
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote row or column missing where one was expected
    #[error("remote schema error: {0}")]
    Schema(String),

    /// Remote answered with a server-side failure status
    #[error("remote returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    /// Local persistent-storage limit exceeded
    #[error("storage quota exceeded")]
    Quota,

    /// Primary local store failure
    #[error("local store error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Fallback store IO failure
    #[error("fallback store error: {0}")]
    FallbackIo(#[from] std::io::Error),

    /// Malformed document or out-of-range field
    #[error("validation error: {0}")]
    Engine(#[from] valise_engine::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Remote sync is not configured for this device
    #[error("remote not configured")]
    RemoteDisabled,

    /// Referenced record does not exist locally
    #[error("no such record: {0}")]
    NotFound(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
