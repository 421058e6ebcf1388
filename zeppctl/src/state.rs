//! Persistent unit state: install flags and the notebook id map.
//!
//! Backed by a small sqlite database under the deployment root so repeated
//! event deliveries are idempotent across process restarts. Two tables:
//! boolean lifecycle flags, and the mapping from caller-supplied notebook
//! keys to the identifiers the daemon assigned on import. The map is a
//! sound cache of daemon-side state, never authoritative.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::errors::{ZeppError, ZeppResult};

/// Persisted lifecycle flag names.
pub mod flags {
    pub const INSTALLED: &str = "installed";
    pub const STARTED: &str = "started";
}

/// Snapshot of the persisted lifecycle flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstallState {
    pub installed: bool,
    pub started: bool,
}

pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open (or create) the state database at `path`.
    pub fn open(path: &Path) -> ZeppResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            ZeppError::Storage(format!("failed to open state db {}: {e}", path.display()))
        })?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS flags (
                 name  TEXT PRIMARY KEY,
                 value INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS notebooks (
                 key       TEXT PRIMARY KEY,
                 daemon_id TEXT NOT NULL
             );",
        )
        .map_err(|e| ZeppError::Storage(format!("failed to initialize state db: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> ZeppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ZeppError::Storage(format!("failed to open state db: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS flags (
                 name  TEXT PRIMARY KEY,
                 value INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS notebooks (
                 key       TEXT PRIMARY KEY,
                 daemon_id TEXT NOT NULL
             );",
        )
        .map_err(|e| ZeppError::Storage(format!("failed to initialize state db: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ========================================================================
    // FLAGS
    // ========================================================================

    pub fn flag(&self, name: &str) -> ZeppResult<bool> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT value FROM flags WHERE name = ?1")
            .map_err(storage)?;
        let mut rows = stmt.query([name]).map_err(storage)?;
        match rows.next().map_err(storage)? {
            Some(row) => Ok(row.get::<_, i64>(0).map_err(storage)? != 0),
            None => Ok(false),
        }
    }

    pub fn set_flag(&self, name: &str, value: bool) -> ZeppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO flags (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = ?2",
            rusqlite::params![name, value as i64],
        )
        .map_err(storage)?;
        Ok(())
    }

    pub fn is_installed(&self) -> ZeppResult<bool> {
        self.flag(flags::INSTALLED)
    }

    pub fn set_installed(&self, value: bool) -> ZeppResult<()> {
        self.set_flag(flags::INSTALLED, value)
    }

    pub fn is_started(&self) -> ZeppResult<bool> {
        self.flag(flags::STARTED)
    }

    pub fn set_started(&self, value: bool) -> ZeppResult<()> {
        self.set_flag(flags::STARTED, value)
    }

    pub fn snapshot(&self) -> ZeppResult<InstallState> {
        Ok(InstallState {
            installed: self.is_installed()?,
            started: self.is_started()?,
        })
    }

    // ========================================================================
    // NOTEBOOK ID MAP
    // ========================================================================

    /// Record the daemon-assigned id for a caller key after a successful
    /// import.
    pub fn record_notebook(&self, key: &str, daemon_id: &str) -> ZeppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notebooks (key, daemon_id) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET daemon_id = ?2",
            [key, daemon_id],
        )
        .map_err(storage)?;
        Ok(())
    }

    /// Look up the daemon id recorded for a caller key.
    pub fn notebook_id(&self, key: &str) -> ZeppResult<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT daemon_id FROM notebooks WHERE key = ?1")
            .map_err(storage)?;
        let mut rows = stmt.query([key]).map_err(storage)?;
        match rows.next().map_err(storage)? {
            Some(row) => Ok(Some(row.get(0).map_err(storage)?)),
            None => Ok(None),
        }
    }

    /// Drop the mapping for a caller key after a successful delete.
    pub fn forget_notebook(&self, key: &str) -> ZeppResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM notebooks WHERE key = ?1", [key])
            .map_err(storage)?;
        Ok(())
    }

    pub fn notebook_count(&self) -> ZeppResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM notebooks", [], |row| row.get(0))
            .map_err(storage)?;
        Ok(count as usize)
    }

    /// Reset all persisted state (explicit cleanup).
    pub fn reset(&self) -> ZeppResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch("DELETE FROM flags; DELETE FROM notebooks;")
            .map_err(storage)?;
        Ok(())
    }
}

fn storage(e: rusqlite::Error) -> ZeppError {
    ZeppError::Storage(format!("state db error: {e}"))
}
