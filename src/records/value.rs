//! Field values
//!
//! A [`Value`] is one concrete field of a record, converted to and from
//! SQLite storage per the field's declared kind.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::schema::FieldKind;

/// Format written by SQLite's own datetime() default, read for
/// compatibility with rows created outside the gateway.
const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A concrete value for one field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// An empty key value never counts as a persisted primary key
    pub(crate) fn is_empty_key(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Integer(i) => *i == 0,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Decode a raw column value according to the field's declared kind.
    pub(crate) fn from_sql(
        field: &str,
        kind: FieldKind,
        raw: ValueRef<'_>,
    ) -> Result<Self, ReadError> {
        let decode_err = |message: String| ReadError::Decode {
            field: field.to_string(),
            kind,
            message,
        };

        match (kind, raw) {
            (_, ValueRef::Null) => Ok(Value::Null),
            (FieldKind::Integer, ValueRef::Integer(i)) => Ok(Value::Integer(i)),
            (FieldKind::Boolean, ValueRef::Integer(i)) => Ok(Value::Boolean(i != 0)),
            (FieldKind::Real, ValueRef::Real(r)) => Ok(Value::Real(r)),
            (FieldKind::Real, ValueRef::Integer(i)) => Ok(Value::Real(i as f64)),
            (FieldKind::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|e| decode_err(e.to_string())),
            (FieldKind::Timestamp, ValueRef::Text(bytes)) => {
                let s = std::str::from_utf8(bytes).map_err(|e| decode_err(e.to_string()))?;
                parse_timestamp(s)
                    .map(Value::Timestamp)
                    .ok_or_else(|| decode_err(format!("unrecognized timestamp `{s}`")))
            }
            (FieldKind::Blob, ValueRef::Blob(bytes)) => Ok(Value::Blob(bytes.to_vec())),
            (_, other) => Err(decode_err(format!(
                "unexpected storage class {:?}",
                other.data_type()
            ))),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, SQLITE_DATETIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(ts.to_rfc3339())),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
