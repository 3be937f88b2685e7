//! Device-local "already submitted" flag.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::store::StoreError;

/// Key the submission flag is stored under
pub const SUBMITTED_KEY: &str = "hasSubmitted";

/// Durable boolean storage scoped to this device. No expiry.
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<bool>, StoreError>;
    fn set(&self, key: &str, value: bool) -> Result<(), StoreError>;
    fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// Flags kept in a small SQLite file next to the client, surviving restarts.
pub struct SqliteFlagStore {
    conn: Mutex<Connection>,
}

impl SqliteFlagStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS device_flags (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl FlagStore for SqliteFlagStore {
    fn get(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM device_flags WHERE key = ?1",
                params![key],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO device_flags (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM device_flags WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Volatile flags, gone when the process exits
#[derive(Default)]
pub struct MemoryFlagStore {
    flags: Mutex<HashMap<String, bool>>,
}

impl MemoryFlagStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, bool>>, StoreError> {
        self.flags.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.lock()?.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// The submission flag on top of a [`FlagStore`]. Absent means "not submitted".
pub struct SubmissionGuard {
    store: Box<dyn FlagStore>,
    key: String,
}

impl SubmissionGuard {
    pub fn new(store: impl FlagStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            key: SUBMITTED_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn is_submitted(&self) -> Result<bool, StoreError> {
        Ok(self.store.get(&self.key)?.unwrap_or(false))
    }

    pub fn mark_submitted(&self) -> Result<(), StoreError> {
        self.store.set(&self.key, true)
    }

    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.clear(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_flag_round_trip() {
        let store = SqliteFlagStore::open_in_memory().unwrap();

        assert_eq!(store.get(SUBMITTED_KEY).unwrap(), None);

        store.set(SUBMITTED_KEY, true).unwrap();
        assert_eq!(store.get(SUBMITTED_KEY).unwrap(), Some(true));

        store.set(SUBMITTED_KEY, false).unwrap();
        assert_eq!(store.get(SUBMITTED_KEY).unwrap(), Some(false));

        store.clear(SUBMITTED_KEY).unwrap();
        assert_eq!(store.get(SUBMITTED_KEY).unwrap(), None);
    }

    #[test]
    fn test_flag_survives_reopen() {
        let path = std::env::temp_dir().join(format!("cookie-vote-flag-{}.db", uuid::Uuid::new_v4()));

        {
            let guard = SubmissionGuard::new(SqliteFlagStore::open(&path).unwrap());
            guard.mark_submitted().unwrap();
        }

        let guard = SubmissionGuard::new(SqliteFlagStore::open(&path).unwrap());
        assert!(guard.is_submitted().unwrap());

        guard.reset().unwrap();
        assert!(!guard.is_submitted().unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_guard_keys_are_isolated() {
        let guard = SubmissionGuard::new(MemoryFlagStore::default()).with_key("round-2");

        assert!(!guard.is_submitted().unwrap());
        guard.mark_submitted().unwrap();
        assert!(guard.is_submitted().unwrap());
    }
}
