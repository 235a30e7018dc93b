//! Durable per-device cache: collection x key -> JSON value.
//!
//! The primary store is an embedded SQLite table. When it cannot be opened
//! the device degrades to the flat file store. Expense writes additionally
//! keep a lightweight mirror in the fallback store with large inline photo
//! payloads stripped, so the mirror fits the fallback quota; a quota error
//! clears the mirror key instead of leaving it corrupt, and the primary
//! copy stays authoritative.

mod fallback;
mod sqlite;

pub use fallback::{FileStore, DEFAULT_CAPACITY};
pub use sqlite::SqliteStore;

use crate::error::{ClientError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use valise_engine::Expense;

/// The five local collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Checklist,
    Expenses,
    Itinerary,
    Notes,
    Settings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Checklist => "checklist",
            Collection::Expenses => "expenses",
            Collection::Itinerary => "itinerary",
            Collection::Notes => "notes",
            Collection::Settings => "settings",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known keys within the collections.
pub const KEY_ITEMS: &str = "items";
pub const KEY_TEXT: &str = "text";
pub const KEY_RATES: &str = "rates";
pub const KEY_PEOPLE: &str = "people";

/// Inline photo references longer than this never enter the mirror.
const MIRROR_PHOTO_MAX: usize = 512;

/// The device's local store: primary SQLite plus the fallback file store.
#[derive(Debug)]
pub struct LocalStore {
    primary: Option<SqliteStore>,
    fallback: FileStore,
}

impl LocalStore {
    /// Open the store under a data directory. A primary that fails to open
    /// is logged and the store runs degraded on the fallback alone.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let primary = match SqliteStore::open(&data_dir.join("valise.db")) {
            Ok(store) => Some(store),
            Err(err) => {
                tracing::warn!("primary store unavailable, using fallback: {err}");
                None
            }
        };
        let fallback = FileStore::open(&data_dir.join("fallback.json"), DEFAULT_CAPACITY)?;
        Ok(Self { primary, fallback })
    }

    fn fallback_key(collection: Collection, key: &str) -> String {
        format!("{collection}:{key}")
    }

    /// Read a value. The fallback is only consulted when the primary is
    /// unavailable or failing, not on a simple miss.
    pub fn get<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
        let raw = match &self.primary {
            Some(primary) => match primary.get(collection.as_str(), key) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!("primary read failed for {collection}:{key}: {err}");
                    self.fallback.get(&Self::fallback_key(collection, key))
                }
            },
            None => self.fallback.get(&Self::fallback_key(collection, key)),
        };
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write a value to the primary, or to the fallback when degraded.
    pub fn set<T: Serialize>(&self, collection: Collection, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        match &self.primary {
            Some(primary) => match primary.set(collection.as_str(), key, &raw) {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::warn!("primary write failed for {collection}:{key}: {err}");
                    self.fallback.set(&Self::fallback_key(collection, key), &raw)
                }
            },
            None => self.fallback.set(&Self::fallback_key(collection, key), &raw),
        }
    }

    /// Persist the expense ledger: full records to the primary, a photo-
    /// stripped mirror to the fallback. Mirror quota failures clear the
    /// mirror key; the primary copy is never affected.
    pub fn put_expenses(&self, expenses: &[Expense]) -> Result<()> {
        if let Some(primary) = &self.primary {
            let raw = serde_json::to_string(expenses)?;
            primary.set(Collection::Expenses.as_str(), KEY_ITEMS, &raw)?;
        }

        let mirror_key = Self::fallback_key(Collection::Expenses, KEY_ITEMS);
        let lite = serde_json::to_string(&lighten(expenses))?;
        match self.fallback.set(&mirror_key, &lite) {
            Ok(()) => Ok(()),
            Err(ClientError::Quota) => {
                tracing::warn!("expense mirror over quota, clearing mirror key");
                self.fallback.remove(&mirror_key)
            }
            Err(err) => Err(err),
        }
    }

    /// Read the expense ledger: full records when the primary is up,
    /// otherwise the lightweight mirror.
    pub fn expenses(&self) -> Result<Vec<Expense>> {
        Ok(self
            .get(Collection::Expenses, KEY_ITEMS)?
            .unwrap_or_default())
    }

    /// Whether the primary store is available.
    pub fn degraded(&self) -> bool {
        self.primary.is_none()
    }
}

/// True when a photo reference is a storage path rather than an inline
/// data URL or absolute URL.
fn is_storage_path(value: &str) -> bool {
    !(value.starts_with("data:") || value.starts_with("http://") || value.starts_with("https://"))
}

// Strip inline image payloads so the mirror stays small.
fn lighten(expenses: &[Expense]) -> Vec<Expense> {
    expenses
        .iter()
        .map(|e| {
            let mut lite = e.clone();
            lite.bill_photo = lite
                .bill_photo
                .filter(|p| is_storage_path(p) && p.len() < MIRROR_PHOTO_MAX);
            lite
        })
        .collect()
}
