//! Configuration management for the client runtime.
//!
//! Read once at startup; the sync mode is not expected to change at
//! runtime. Binaries and tests load `.env` files via `dotenvy` before
//! calling [`Config::from_env`].

use crate::remote::SyncMode;
use std::env;
use std::path::PathBuf;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot (one JSON blob) or Entities (normalized rows)
    pub mode: SyncMode,
    /// Remote backend; None runs the device purely local
    pub remote: Option<RemoteConfig>,
    /// Trip scope for entity-mode rows
    pub trip_id: i64,
    /// Directory holding the local store files
    pub data_dir: PathBuf,
}

/// Connection details for the shared backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the PostgREST-style API
    pub base_url: String,
    /// API key sent as `apikey` and bearer token
    pub api_key: String,
    /// Table holding the snapshot blob row
    pub snapshot_table: String,
    /// Fixed id of the snapshot blob row
    pub snapshot_record_id: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match env::var("VALISE_DATA_MODE") {
            Ok(v) if v.eq_ignore_ascii_case("entities") => SyncMode::Entities,
            _ => SyncMode::Snapshot,
        };

        let trip_id = env::var("VALISE_TRIP_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTripId)?;

        let data_dir = env::var("VALISE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("valise-data"));

        let remote = match env::var("VALISE_REMOTE_URL") {
            Ok(base_url) if !base_url.is_empty() => {
                let api_key =
                    env::var("VALISE_REMOTE_KEY").map_err(|_| ConfigError::MissingApiKey)?;
                let snapshot_table = env::var("VALISE_SNAPSHOT_TABLE")
                    .unwrap_or_else(|_| "travel_data".to_string());
                let snapshot_record_id = env::var("VALISE_SNAPSHOT_RECORD_ID")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidRecordId)?;
                Some(RemoteConfig {
                    base_url,
                    api_key,
                    snapshot_table,
                    snapshot_record_id,
                })
            }
            _ => None,
        };

        Ok(Self {
            mode,
            remote,
            trip_id,
            data_dir,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("VALISE_REMOTE_KEY is required when VALISE_REMOTE_URL is set")]
    MissingApiKey,

    #[error("Invalid VALISE_TRIP_ID value")]
    InvalidTripId,

    #[error("Invalid VALISE_SNAPSHOT_RECORD_ID value")]
    InvalidRecordId,
}
