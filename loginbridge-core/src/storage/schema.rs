//! Database schema and connection management.

use crate::storage::{Result, StorageError};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Current schema version. Incremented when the schema changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// SQLite connection holding the credential tables
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Create a new in-memory database for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the tables if they are missing and check the schema version
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS store_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL,
                wrapped_dek BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS logins (
                id TEXT PRIMARY KEY,
                hostname TEXT NOT NULL,
                username BLOB NOT NULL,
                password BLOB NOT NULL,
                form_submit_url TEXT,
                http_realm TEXT,
                times_used INTEGER NOT NULL DEFAULT 0,
                time_created INTEGER NOT NULL,
                time_last_used INTEGER NOT NULL,
                time_password_changed INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_logins_hostname ON logins(hostname);",
        )?;

        if let Some(version) = self.schema_version()? {
            if version != CURRENT_SCHEMA_VERSION {
                return Err(StorageError::UnsupportedSchema(version));
            }
        }
        Ok(())
    }

    /// Stored schema version, `None` before the first unlock
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let version = self
            .conn
            .query_row("SELECT version FROM store_metadata WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(version)
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();

        let table_names: Vec<String> = db
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(table_names.contains(&"store_metadata".to_string()));
        assert!(table_names.contains(&"logins".to_string()));
        assert_eq!(db.schema_version().unwrap(), None);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.initialize_schema().unwrap();
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.conn()
            .execute(
                "INSERT INTO store_metadata (id, version, wrapped_dek, created_at)
                 VALUES (1, 99, x'00', 0)",
                [],
            )
            .unwrap();

        assert!(matches!(db.initialize_schema(), Err(StorageError::UnsupportedSchema(99))));
    }
}
