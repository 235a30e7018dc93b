//! Snapshot adapter: the whole trip as one JSON blob in a single row.

use crate::config::RemoteConfig;
use crate::error::{ClientError, Result};
use crate::remote::{RemoteAdapter, RestClient, SyncMode};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use valise_engine::Snapshot;

/// Pushes and loads the full trip document against one fixed row of the
/// snapshot table. Last write wins; there is no per-field merging on the
/// remote side.
#[derive(Debug)]
pub struct SnapshotAdapter {
    rest: RestClient,
    table: String,
    record_id: i64,
}

#[derive(Debug, Deserialize)]
struct PayloadRow {
    payload: Snapshot,
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    id: i64,
    payload: &'a Snapshot,
    updated_at: String,
}

impl SnapshotAdapter {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            rest: RestClient::new(config),
            table: config.snapshot_table.clone(),
            record_id: config.snapshot_record_id,
        }
    }
}

#[async_trait]
impl RemoteAdapter for SnapshotAdapter {
    fn mode(&self) -> SyncMode {
        SyncMode::Snapshot
    }

    async fn load(&self) -> Result<Snapshot> {
        let response = self
            .rest
            .request(Method::GET, &self.table)
            .query(&[
                ("id", format!("eq.{}", self.record_id)),
                ("select", "payload".to_string()),
            ])
            .send()
            .await?;
        let mut rows: Vec<PayloadRow> = RestClient::check(response).await?.json().await?;
        match rows.pop() {
            Some(row) => Ok(row.payload),
            None => Err(ClientError::Schema(format!(
                "snapshot row {} not found in {}",
                self.record_id, self.table
            ))),
        }
    }

    async fn push(&self, snapshot: &Snapshot) -> Result<()> {
        let row = UpsertRow {
            id: self.record_id,
            payload: snapshot,
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        let response = self
            .rest
            .request(Method::POST, &self.table)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[row])
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }

    // The blob carries settled_by inline, nothing extra to write back.
    async fn push_settlements(&self, _expense_id: &str, _settled_by: &[String]) -> Result<()> {
        Ok(())
    }
}
