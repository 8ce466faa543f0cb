//! rowkit
//!
//! A record mapping and schema migration layer over SQLite.
//!
//! A [`Descriptor`] defines a record type's shape and keys, [`schema::ensure_table`]
//! reconciles the store with it, and the functions in [`records`] move
//! [`Record`] values in and out of the resulting table.

pub mod db;
pub mod error;
pub mod records;
pub mod schema;

pub use db::{Config, Database};
pub use error::{ConnectError, DescriptorError, ReadError, SchemaError, WriteError};
pub use records::{Record, Value};
pub use schema::{Descriptor, DescriptorBuilder, Field, FieldKind};
