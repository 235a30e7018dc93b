//! Remote adapters: two interchangeable sync strategies behind one trait.
//!
//! The scheduler and the reconciliation flow depend only on
//! [`RemoteAdapter`]; which strategy backs it is decided once at startup
//! from configuration.

mod entity;
mod snapshot;

pub use entity::{ActivityPatch, EntityAdapter};
pub use snapshot::SnapshotAdapter;

use crate::config::RemoteConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use valise_engine::Snapshot;

/// Which sync strategy the device runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// One JSON blob per push/load
    #[default]
    Snapshot,
    /// Normalized per-row CRUD
    Entities,
}

/// The push/load contract both strategies implement.
///
/// `load` returns a [`Snapshot`] whose absent sections mean "the remote
/// does not model this" and must leave local state untouched. `push` and
/// `push_settlements` are best-effort: callers log failures and move on.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    fn mode(&self) -> SyncMode;

    /// Fetch the remote canonical state.
    async fn load(&self) -> Result<Snapshot>;

    /// Push the full current state. A no-op in entity mode, where rows are
    /// written synchronously per mutation.
    async fn push(&self, snapshot: &Snapshot) -> Result<()>;

    /// Write back a recovered `settled_by` for one expense. A no-op in
    /// snapshot mode, where the blob already carries the field.
    async fn push_settlements(&self, expense_id: &str, settled_by: &[String]) -> Result<()>;
}

/// Thin reqwest wrapper for a PostgREST-style backend.
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Map non-success statuses into the error taxonomy: client errors are
    /// schema problems (missing column, unknown table, bad filter), server
    /// errors and transport failures are transient.
    pub async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(ClientError::Schema(format!("{status}: {body}")))
        } else {
            Err(ClientError::RemoteStatus {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_snapshot() {
        assert_eq!(SyncMode::default(), SyncMode::Snapshot);
    }
}
