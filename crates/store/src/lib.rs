//! Folderbell Store - SQLite persistence for users and folder subscriptions
//!
//! - types: row structs handed to the bot and the poller
//! - users: profile upserts and the admin overview
//! - subscriptions: subscribe/unsubscribe and poller timestamp updates
//!
//! Every operation runs in its own short transaction; an uncommitted
//! transaction rolls back when dropped.

mod types;
mod users;
mod subscriptions;

pub use types::{Subscription, UserOverview, UserProfile};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Shared handle to the subscription database. Cloning is cheap; all clones use one connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };
        conn.busy_timeout(Duration::from_secs(5))?;

        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.migrate()?;
        info!("🗄️ Store: opened {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;

                CREATE TABLE IF NOT EXISTS meta (
                  key TEXT PRIMARY KEY,
                  value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS users (
                  id INTEGER PRIMARY KEY AUTOINCREMENT,
                  tg_id INTEGER NOT NULL UNIQUE,
                  username TEXT,
                  first_name TEXT,
                  last_name TEXT,
                  created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS folder_subscriptions (
                  id INTEGER PRIMARY KEY AUTOINCREMENT,
                  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                  folder_path TEXT NOT NULL,
                  last_modified INTEGER,
                  created_at INTEGER NOT NULL,
                  UNIQUE (user_id, folder_path)
                );

                CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
                CREATE INDEX IF NOT EXISTS idx_subscriptions_folder ON folder_subscriptions(folder_path);
                "#,
            )?;
            conn.execute(
                "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
                params!["schema_version", "v1"],
            )?;
            Ok(())
        })
    }

    /// Runs `f` with exclusive access to the connection. Callers must not hold it across an `.await`.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }
}

pub(crate) fn now_secs() -> i64 {
    Utc::now().timestamp()
}

pub(crate) fn from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
