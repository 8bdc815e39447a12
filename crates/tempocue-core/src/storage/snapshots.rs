//! Snapshot persistence for guidance sessions.
//!
//! Snapshots are stored as opaque JSON blobs keyed by session id. The
//! executor never looks inside the store; it hands over a
//! [`DetailedState`] and gets the same value back.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::guidance::DetailedState;

use super::data_dir;

/// Where executor snapshots live between process runs.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, session_id: &str, state: &DetailedState) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing was saved for `session_id`.
    fn load(&self, session_id: &str) -> Result<Option<DetailedState>, StoreError>;

    fn remove(&self, session_id: &str) -> Result<(), StoreError>;
}

fn decode(session_id: &str, blob: &str) -> Result<DetailedState, StoreError> {
    serde_json::from_str(blob).map_err(|source| StoreError::Corrupt {
        session: session_id.to_string(),
        source,
    })
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw blob as-is.
    pub fn insert_raw(&self, session_id: &str, blob: impl Into<String>) {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), blob.into());
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, session_id: &str, state: &DetailedState) -> Result<(), StoreError> {
        let blob = serde_json::to_string(state)?;
        self.insert_raw(session_id, blob);
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<DetailedState>, StoreError> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs
            .get(session_id)
            .map(|blob| decode(session_id, blob))
            .transpose()
    }

    fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        Ok(())
    }
}

/// SQLite-backed store.
///
/// One row per session in a `snapshots` table, overwritten on every save.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSnapshotStore").finish_non_exhaustive()
    }
}

impl SqliteSnapshotStore {
    /// Open (and create if needed) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open `~/.config/tempocue/<file_name>`.
    pub fn open_default(file_name: &str) -> Result<Self, StoreError> {
        let path = data_dir()
            .map_err(|e| StoreError::DataDir(e.to_string()))?
            .join(file_name);
        Self::open(&path)
    }

    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                session_id TEXT PRIMARY KEY,
                state      TEXT NOT NULL,
                saved_at   TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Session ids with a stored snapshot, most recently saved first.
    pub fn sessions(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt =
            conn.prepare("SELECT session_id FROM snapshots ORDER BY saved_at DESC, session_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Store a raw blob as-is.
    pub fn insert_raw(&self, session_id: &str, blob: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (session_id, state, saved_at) VALUES (?1, ?2, ?3)",
            params![session_id, blob, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&self, session_id: &str, state: &DetailedState) -> Result<(), StoreError> {
        let blob = serde_json::to_string(state)?;
        self.insert_raw(session_id, &blob)?;
        tracing::debug!(session_id, "snapshot saved");
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<DetailedState>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let result = conn.query_row(
            "SELECT state FROM snapshots WHERE session_id = ?1",
            params![session_id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(blob) => decode(session_id, &blob).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "DELETE FROM snapshots WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
}
