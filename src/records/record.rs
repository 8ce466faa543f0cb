//! Record instances
//!
//! A record is a transient, named set of field values for a descriptor.
//! Once persisted, the store is the source of truth; an absent field and a
//! NULL column are the same thing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::schema::Descriptor;

/// A concrete value for each (set) field of a descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field value; a [`Value::Null`] clears it
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        match value.into() {
            Value::Null => {
                self.values.remove(field);
            }
            value => {
                self.values.insert(field.to_string(), value);
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// The record's persisted primary key, if it has one
    ///
    /// Absent, NULL, zero integer, and empty text keys all count as "not
    /// yet persisted".
    pub fn key(&self, desc: &Descriptor) -> Option<&Value> {
        self.values
            .get(desc.primary_key().name())
            .filter(|v| !v.is_empty_key())
    }

    /// Whether this record has never been persisted for `desc`
    pub fn is_new(&self, desc: &Descriptor) -> bool {
        self.key(desc).is_none()
    }

    /// Set fields and their values, in field-name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
