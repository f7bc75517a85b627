//! Database schema migrations.
//!
//! Applies the initial schema: the schema_migrations tracking table and the
//! scoped key/value table that backs every user's state.

use rusqlite::Connection;
use tracing::info;

use taskchat_core::error::TaskChatError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), TaskChatError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TaskChatError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            TaskChatError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: kv_store");
    }

    Ok(())
}

/// Version 1: one row per (scope, key), value is a JSON document.
fn apply_v1(conn: &Connection) -> Result<(), TaskChatError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            scope       TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL,
            PRIMARY KEY (scope, key)
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'kv_store');
        ",
    )
    .map_err(|e| TaskChatError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
