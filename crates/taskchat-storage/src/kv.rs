//! Key-scoped durable store.
//!
//! The engine only ever needs `get`/`put` of whole JSON documents under a
//! small set of keys. `ScopedStore` keeps one scope per user in SQLite;
//! `MemoryStore` is the volatile variant used by tests and `--ephemeral` runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::OptionalExtension;

use taskchat_core::error::TaskChatError;

use crate::db::Database;

/// Get/put of serialized values under string keys.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, TaskChatError>;

    /// Replace the value stored under `key`.
    fn put(&self, key: &str, value: &str) -> Result<(), TaskChatError>;
}

/// SQLite-backed store restricted to one scope (a user key).
#[derive(Debug, Clone)]
pub struct ScopedStore {
    db: Arc<Database>,
    scope: String,
}

impl ScopedStore {
    pub fn new(db: Arc<Database>, scope: impl Into<String>) -> Self {
        Self {
            db,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl KeyValueStore for ScopedStore {
    fn get(&self, key: &str) -> Result<Option<String>, TaskChatError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE scope = ?1 AND key = ?2",
                rusqlite::params![self.scope, key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| TaskChatError::Storage(format!("Failed to read '{}': {}", key, e)))
        })
    }

    fn put(&self, key: &str, value: &str) -> Result<(), TaskChatError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (scope, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (scope, key)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![self.scope, key, value, now],
            )
            .map_err(|e| TaskChatError::Storage(format!("Failed to write '{}': {}", key, e)))?;
            Ok(())
        })
    }
}

/// Volatile store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TaskChatError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| TaskChatError::Storage(format!("Store lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), TaskChatError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| TaskChatError::Storage(format!("Store lock poisoned: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_store_absent_key() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = ScopedStore::new(db, "alice");
        assert_eq!(store.get("tasks").unwrap(), None);
    }

    #[test]
    fn test_scoped_store_put_overwrites() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = ScopedStore::new(db, "alice");
        store.put("tasks", "[1]").unwrap();
        store.put("tasks", "[1,2]").unwrap();
        assert_eq!(store.get("tasks").unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_scopes_are_isolated() {
        let db = Arc::new(Database::in_memory().unwrap());
        let alice = ScopedStore::new(Arc::clone(&db), "alice");
        let bob = ScopedStore::new(db, "bob");

        alice.put("tasks", "[\"a\"]").unwrap();
        assert_eq!(bob.get("tasks").unwrap(), None);
        assert_eq!(alice.scope(), "alice");
    }

    #[test]
    fn test_scoped_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let db = Arc::new(Database::new(&path).unwrap());
            ScopedStore::new(db, "alice").put("chatHistory", "[]").unwrap();
        }
        let db = Arc::new(Database::new(&path).unwrap());
        let store = ScopedStore::new(db, "alice");
        assert_eq!(store.get("chatHistory").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.put("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
