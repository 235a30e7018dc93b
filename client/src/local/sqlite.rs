//! Primary local store: a single transactional key/value table in SQLite.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Embedded transactional kv store, one row per (collection, key).
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL keeps writes durable across process kills
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                collection TEXT NOT NULL,
                key        TEXT NOT NULL,
                value      TEXT NOT NULL,
                PRIMARY KEY (collection, key)
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                collection TEXT NOT NULL,
                key        TEXT NOT NULL,
                value      TEXT NOT NULL,
                PRIMARY KEY (collection, key)
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fetch the raw JSON value for a key, if present.
    pub fn get(&self, collection: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("sqlite store lock poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Upsert the raw JSON value for a key.
    pub fn set(&self, collection: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite store lock poisoned");
        conn.execute(
            "INSERT INTO kv (collection, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, key) DO UPDATE SET value = excluded.value",
            params![collection, key, value],
        )?;
        Ok(())
    }

    /// Remove a key. Missing keys are not an error.
    pub fn remove(&self, collection: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite store lock poisoned");
        conn.execute(
            "DELETE FROM kv WHERE collection = ?1 AND key = ?2",
            params![collection, key],
        )?;
        Ok(())
    }
}
