//! SQLite file holding every user's key/value state.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use taskchat_core::error::TaskChatError;

use crate::migrations;

/// One connection shared by all [`ScopedStore`](crate::ScopedStore)s.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file and bring its schema up to date.
    pub fn new(path: &Path) -> Result<Self, TaskChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage_err("open database"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(storage_err("set pragmas"))?;

        let db = Self::migrated(conn)?;
        info!(path = %path.display(), "State database opened");
        Ok(db)
    }

    /// Fresh schema with no file behind it.
    pub fn in_memory() -> Result<Self, TaskChatError> {
        Self::migrated(Connection::open_in_memory().map_err(storage_err("open in-memory db"))?)
    }

    fn migrated(conn: Connection) -> Result<Self, TaskChatError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` while holding the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TaskChatError>
    where
        F: FnOnce(&Connection) -> Result<T, TaskChatError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TaskChatError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

fn storage_err(what: &'static str) -> impl Fn(rusqlite::Error) -> TaskChatError {
    move |e| TaskChatError::Storage(format!("Failed to {}: {}", what, e))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
