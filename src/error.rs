//! Error types
//!
//! One enum per failure domain. Every error is returned to the immediate
//! caller; nothing is retried or swallowed inside the crate.

use thiserror::Error;

use crate::schema::FieldKind;

/// Errors establishing a store connection or checking one out of the pool.
///
/// Fatal at the embedding application's discretion; the crate itself never
/// aborts the process.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors detected while building a [`crate::Descriptor`].
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor `{0}` has no primary key field")]
    MissingPrimaryKey(String),

    #[error("descriptor `{0}` marks more than one field as primary key")]
    MultiplePrimaryKeys(String),

    #[error("descriptor `{table}` declares field `{field}` more than once")]
    DuplicateField { table: String, field: String },

    #[error(
        "field `{field}` on `{table}` is {declared:?} but references a {referenced:?} primary key"
    )]
    ForeignKeyKindMismatch {
        table: String,
        field: String,
        declared: FieldKind,
        referenced: FieldKind,
    },
}

/// Errors reconciling a table with a descriptor.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database connection error: {0}")]
    Connection(#[from] ConnectError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(
        "table `{table}` column `{column}` is `{existing}` but the descriptor declares `{declared}`"
    )]
    ColumnTypeConflict {
        table: String,
        column: String,
        existing: String,
        declared: String,
    },

    #[error("table `{table}` has no primary key column `{column}`, which cannot be added in place")]
    MissingKeyColumn { table: String, column: String },
}

/// Errors reading rows. Zero rows found is never an error.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("database connection error: {0}")]
    Connection(#[from] ConnectError),

    #[error("query error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("column `{field}` does not decode as {kind:?}: {message}")]
    Decode {
        field: String,
        kind: FieldKind,
        message: String,
    },
}

/// Errors writing rows.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("database connection error: {0}")]
    Connection(#[from] ConnectError),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("record has no persisted primary key for table `{0}`")]
    MissingKey(String),

    #[error("no row in `{table}` with key {key}")]
    RowNotFound { table: String, key: String },

    #[error("table `{table}` has no field named `{field}`")]
    UnknownField { table: String, field: String },

    #[error("failed to read back written row: {0}")]
    ReadBack(#[source] ReadError),
}

impl From<rusqlite::Error> for WriteError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                WriteError::Constraint(message.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => WriteError::Sqlite(e),
        }
    }
}
