//! Database module
//!
//! Handles SQLite connection pooling.

pub mod connection;

pub use connection::{Config, Database};
