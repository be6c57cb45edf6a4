//! SQLite persistence for calls, loan applications and subscriptions.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::runtime::{Handle, RuntimeFlavor};

pub mod application_repo;
pub mod call_repo;
mod columns;
pub mod error;
pub mod migrations;
pub mod store;
pub mod subscription_repo;

pub use error::DatabaseError;
pub use store::{ApplicationStore, CallStore, Lease, SubscriptionStore, TerminalUpdate};
pub use subscription_repo::SubscriptionUpsert;

/// Shared handle to the service's SQLite database.
///
/// Every repository call goes through [`Database::with_conn`], which holds
/// the connection mutex for the duration of one statement group. The
/// conditional updates that fence claims and pushes rely on that: each one
/// is a single statement, so its row count is authoritative.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const FILE_PRAGMAS: &str = "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;";

impl Database {
    /// Opens (or creates) the database file, creating parent directories,
    /// and migrates it to the current schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db = Self::migrated(Connection::open(path)?, FILE_PRAGMAS)?;
        log::info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, migrated. Used by tests and demos.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::migrated(Connection::open_in_memory()?, "PRAGMA foreign_keys=ON;")
    }

    fn migrated(conn: Connection, pragmas: &str) -> Result<Self, DatabaseError> {
        conn.execute_batch(pragmas)?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    ///
    /// On a multi-threaded tokio runtime the worker is handed over to
    /// `block_in_place` first, so waiting on the lock or on SQLite's busy
    /// timeout does not stall other tasks scheduled on that worker.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let run = || {
            let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
            f(&conn)
        };
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(run)
            }
            _ => run(),
        }
    }
}

/// `~/.loancall/data/loancall.db`, when a home directory is known.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".loancall").join("data").join("loancall.db"))
}
