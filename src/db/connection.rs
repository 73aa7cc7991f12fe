use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use crate::errors::FuzzError;

/// Shared SQLite connection. Every write to a store goes through the one
/// connection lock of its `Database`.
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, FuzzError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| FuzzError::Database(format!("Failed to open {}: {}", path.display(), e)))?;

        conn.busy_timeout(std::time::Duration::from_secs(15))
            .map_err(|e| FuzzError::Database(format!("Failed to set busy timeout: {}", e)))?;

        // WAL keeps readers unblocked while a store is being written
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA temp_store=MEMORY;",
        )
        .map_err(|e| FuzzError::Database(format!("Failed to set pragmas: {}", e)))?;

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn in_memory() -> Result<Self, FuzzError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FuzzError::Database(format!("Failed to open in-memory db: {}", e)))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, FuzzError> {
        self.conn
            .lock()
            .map_err(|_| FuzzError::Database("Connection lock poisoned".into()))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), FuzzError> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| FuzzError::Database(format!("Failed to create tables: {}", e)))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { conn: self.conn.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let db = Database::open(&path).unwrap();
        db.execute_batch("CREATE TABLE t (x INTEGER);").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("wal.db")).unwrap();
        let conn = db.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
