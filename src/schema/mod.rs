//! Schema mapping
//!
//! Descriptors define a record type's shape; migration reconciles the
//! store's tables with them.

mod descriptor;
mod migrate;

pub use descriptor::{Descriptor, DescriptorBuilder, Field, FieldKind, ForeignKey};
pub use migrate::ensure_table;

/// Quote an identifier for embedding in SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
