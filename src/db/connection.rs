//! Database connection management
//!
//! Provides SQLite connection pooling behind a cloneable handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::error::ConnectError;

/// Store configuration, supplied by the embedding application at startup.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    max_connections: u32,
    enforce_foreign_keys: bool,
    wal: bool,
}

impl Config {
    /// Configuration for the database file at `path`, with defaults:
    /// a pool of 10 connections, foreign keys enforced, WAL journaling.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_connections: 10,
            enforce_foreign_keys: true,
            wal: true,
        }
    }

    /// Set the maximum number of pooled connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Enable or disable store-level foreign key enforcement.
    pub fn enforce_foreign_keys(mut self, on: bool) -> Self {
        self.enforce_foreign_keys = on;
        self
    }

    /// Enable or disable WAL journaling.
    pub fn wal(mut self, on: bool) -> Self {
        self.wal = on;
        self
    }
}

/// Database connection pool wrapper
///
/// Cheap to clone; the pool is released when the last clone drops.
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Database {
    /// Open the store described by `config` and build the connection pool.
    pub fn open(config: &Config) -> Result<Self, ConnectError> {
        let pragmas = format!(
            "PRAGMA foreign_keys = {};
             PRAGMA journal_mode = {};
             PRAGMA synchronous = NORMAL;",
            if config.enforce_foreign_keys { "ON" } else { "OFF" },
            if config.wal { "WAL" } else { "DELETE" },
        );

        let manager = SqliteConnectionManager::file(&config.path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(move |conn| {
                conn.execute_batch(&pragmas)?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ConnectError> {
        Ok(self.pool.get()?)
    }

    /// Execute a closure with a database connection
    ///
    /// The error type only needs a conversion from [`ConnectError`], so the
    /// closure can return any of the crate's operation errors directly.
    pub fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, E>,
        E: From<ConnectError>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{self, Record};
    use crate::schema::{self, Descriptor, Field, FieldKind};

    fn notes_descriptor() -> Descriptor {
        Descriptor::builder("notes")
            .field(Field::new("id", FieldKind::Integer).primary_key())
            .field(Field::new("body", FieldKind::Text))
            .build()
            .unwrap()
    }

    #[test]
    fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");

        let db = Database::open(&Config::new(&path)).unwrap();
        db.with_conn(|conn| schema::ensure_table(conn, &notes_descriptor()))
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let desc = notes_descriptor();

        let db = Database::open(&Config::new(&path)).unwrap();
        let stored = db
            .with_conn(|conn| {
                schema::ensure_table(conn, &desc).unwrap();
                records::insert(conn, &desc, Record::new().with("body", "first"))
            })
            .unwrap();
        drop(db);

        let db = Database::open(&Config::new(&path)).unwrap();
        let found = db
            .with_conn(|conn| records::find_by_key(conn, &desc, stored.key(&desc).unwrap()))
            .unwrap()
            .expect("row should survive reopen");
        assert_eq!(found.get("body"), stored.get("body"));
    }

    #[test]
    fn test_open_fails_on_unwritable_path() {
        let result = Database::open(&Config::new("/nonexistent-dir/app.db").max_connections(1));
        assert!(result.is_err());
    }
}
