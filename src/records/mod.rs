//! Record instances and the row gateway
//!
//! Transient in-memory records and the operations that move them in and
//! out of a mapped table.

mod gateway;
mod record;
mod value;

pub use gateway::{delete, find_all, find_by_key, find_first, insert, purge, update_field};
pub use record::Record;
pub use value::Value;
