//! Key-value configuration storage backed by SQLite.
//!
//! Shares a database with [`AuthStorage`](crate::auth::AuthStorage), so
//! pass the same path to both. Holds per-user defaults so `prepare` and
//! `cleanup` don't need every flag on every run.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;

/// GCP project that owns the cluster network.
pub const PROJECT_ID_KEY: &str = "gcp.project-id";
/// Cluster infrastructure ID, the prefix of every resource name.
pub const INFRA_ID_KEY: &str = "gcp.infra-id";
pub const REGION_KEY: &str = "gcp.region";

/// Persistent key-value configuration store.
pub struct Config {
    conn: Mutex<Connection>,
}

impl Config {
    /// Open or create the config table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open config database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .context("failed to create config table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("config lock poisoned"))
    }

    /// Get a config value by key.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM config WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Set a config value (upsert).
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    /// Remove a config key.
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }

    /// All stored pairs, sorted by key.
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config ORDER BY key ASC")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Pick the flag value if given, otherwise the stored one.
    /// Errors name both places so the user knows how to fix it.
    pub fn resolve(&self, flag_value: Option<String>, flag: &str, key: &str) -> Result<String> {
        if let Some(value) = flag_value.filter(|v| !v.is_empty()) {
            return Ok(value);
        }
        self.get(key)?.ok_or_else(|| {
            anyhow!("missing --{flag} (or store it with `cloudprep config set {key} <value>`)")
        })
    }

    /// Like [`resolve`](Self::resolve), but a value set nowhere is `None`.
    pub fn resolve_optional(
        &self,
        flag_value: Option<String>,
        key: &str,
    ) -> Result<Option<String>> {
        match flag_value.filter(|v| !v.is_empty()) {
            Some(value) => Ok(Some(value)),
            None => self.get(key),
        }
    }
}
