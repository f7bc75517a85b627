//! taskchat storage crate - SQLite persistence behind a key-scoped store.
//!
//! Provides a WAL-mode SQLite database with migrations, the `KeyValueStore`
//! boundary (SQLite-backed per-user scopes plus an in-memory variant), and a
//! typed repository for the task list and chat transcript.

pub mod db;
pub mod kv;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use kv::{KeyValueStore, MemoryStore, ScopedStore};
pub use repository::{StateRepository, HISTORY_KEY, TASKS_KEY};
