// Durable key/value slots for session persistence

use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::OptionalExtension;
use std::path::Path;

/// Access token
pub const TOKEN_KEY: &str = "auth_token";
/// Serialized identity
pub const IDENTITY_KEY: &str = "auth_user";
/// Session cookies for the API origin
pub const COOKIES_KEY: &str = "auth_cookies";

/// Key/value persistence surface read once at startup
pub trait DurableSlot: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Slot backed by an `auth_kv` table in a SQLite database
pub struct SqliteSlot {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteSlot {
    /// Open (or create) the database and the `auth_kv` table
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }

        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to create auth_kv table")?;

        tracing::debug!("Session store opened: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl DurableSlot for SqliteSlot {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .query_row("SELECT value FROM auth_kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to load {} from SQLite", key))
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )
            .with_context(|| format!("Failed to store {} in SQLite", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM auth_kv WHERE key = ?", [key])
            .with_context(|| format!("Failed to remove {} from SQLite", key))?;
        Ok(())
    }
}

/// In-process slot; share one instance between contexts to simulate a restart
#[derive(Default)]
pub struct MemorySlot {
    entries: DashMap<String, String>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableSlot for MemorySlot {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_slot() {
        let slot = MemorySlot::new();
        assert_eq!(slot.load(TOKEN_KEY).unwrap(), None);

        slot.store(TOKEN_KEY, "tok1").unwrap();
        slot.store(TOKEN_KEY, "tok2").unwrap();
        assert_eq!(slot.load(TOKEN_KEY).unwrap().as_deref(), Some("tok2"));

        slot.remove(TOKEN_KEY).unwrap();
        assert_eq!(slot.load(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_sqlite_slot_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.sqlite3");

        {
            let slot = SqliteSlot::open(&path).unwrap();
            slot.store(TOKEN_KEY, "tok1").unwrap();
            slot.store(TOKEN_KEY, "tok2").unwrap();
            slot.store(IDENTITY_KEY, r#"{"login":"alice"}"#).unwrap();
        }

        let slot = SqliteSlot::open(&path).unwrap();
        assert_eq!(slot.load(TOKEN_KEY).unwrap().as_deref(), Some("tok2"));

        slot.remove(IDENTITY_KEY).unwrap();
        assert_eq!(slot.load(IDENTITY_KEY).unwrap(), None);
        // Removing a missing key is not an error
        slot.remove(COOKIES_KEY).unwrap();
    }
}
