//! Preference store implementation

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use libsql::Connection;

/// Key-value preference storage (async)
#[allow(async_fn_in_trait)]
pub trait PrefsStore {
    /// Read an unsigned integer preference
    async fn get_u64(&self, key: &str) -> Result<Option<u64>>;

    /// Write an unsigned integer preference
    async fn set_u64(&self, key: &str, value: u64) -> Result<()>;

    /// Remove a preference; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `PrefsStore`
pub struct LibSqlPrefs<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPrefs<'a> {
    /// Create a new preference store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read a text preference
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM prefs WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Write a text preference
    pub async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO prefs (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    /// List preferences whose key starts with `prefix`, sorted by key
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, value FROM prefs WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
                [prefix],
            )
            .await?;

        let mut prefs = Vec::new();
        while let Some(row) = rows.next().await? {
            prefs.push((row.get::<String>(0)?, row.get::<String>(1)?));
        }
        Ok(prefs)
    }
}

impl PrefsStore for LibSqlPrefs<'_> {
    async fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get_string(key)
            .await?
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidInput(format!("pref '{key}' is not an integer")))
            })
            .transpose()
    }

    async fn set_u64(&self, key: &str, value: u64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM prefs WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

/// In-memory `PrefsStore`, for embedders without persistence and for tests
#[derive(Debug, Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, u64>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, u64>>> {
        self.values
            .lock()
            .map_err(|_| Error::Database("prefs lock poisoned".to_string()))
    }
}

impl PrefsStore for MemoryPrefs {
    async fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.lock()?.get(key).copied())
    }

    async fn set_u64(&self, key: &str, value: u64) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
