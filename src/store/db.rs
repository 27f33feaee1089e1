// apitoken: SQLite Database Management
//
// Opens the token database and applies the schema. The connection sits
// behind a mutex so a single `Database` can be shared across request tasks.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around a SQLite connection holding the `api_tokens` table.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at the given path.
    /// Missing parent directories are created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;

        tracing::debug!(path = %path.display(), "Token database opened");
        Ok(db)
    }

    /// Open an in-memory database. Contents vanish when it is dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Lock and return the underlying connection.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create the schema if it is missing. Safe to run repeatedly.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS api_tokens (
                id           TEXT PRIMARY KEY,
                service      TEXT NOT NULL,
                secret_hash  TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_api_tokens_service
                ON api_tokens(service);
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
