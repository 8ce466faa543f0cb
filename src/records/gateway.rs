//! Row gateway
//!
//! Create, fetch, update, and delete rows for a mapped descriptor. Every
//! operation assumes [`crate::schema::ensure_table`] has succeeded for the
//! descriptor. Zero rows found is always a success, never an error.

use chrono::Utc;
use rusqlite::{Connection, ToSql};

use super::record::Record;
use super::value::Value;
use crate::error::{ReadError, WriteError};
use crate::schema::{quote_ident, Descriptor, FieldKind};

/// Write one new row for `record`.
///
/// A record with an empty integer key gets one assigned by the store;
/// non-integer keys must be supplied by the caller. `created_at` and
/// `updated_at` are stamped when the descriptor declares them and the
/// caller did not set them. Returns the stored record as read back from
/// the store.
pub fn insert(
    conn: &Connection,
    desc: &Descriptor,
    mut record: Record,
) -> Result<Record, WriteError> {
    for (name, _) in record.fields() {
        if desc.field(name).is_none() {
            return Err(WriteError::UnknownField {
                table: desc.table().to_string(),
                field: name.to_string(),
            });
        }
    }

    let pk = desc.primary_key();
    let auto_key = record.is_new(desc);
    if auto_key && pk.kind() != FieldKind::Integer {
        return Err(WriteError::MissingKey(desc.table().to_string()));
    }

    let now = Utc::now();
    if let Some(name) = desc.created_at() {
        if record.get(name).is_none() {
            record.set(name, now);
        }
    }
    if let Some(name) = desc.updated_at() {
        if record.get(name).is_none() {
            record.set(name, now);
        }
    }

    {
        let mut columns: Vec<String> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        for field in desc.fields() {
            if field.is_primary_key() && auto_key {
                continue;
            }
            if let Some(value) = record.get(field.name()) {
                columns.push(quote_ident(field.name()));
                params.push(value);
            }
        }

        if columns.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES", quote_ident(desc.table()));
            conn.execute(&sql, [])?;
        } else {
            let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(desc.table()),
                columns.join(", "),
                placeholders.join(", ")
            );
            conn.execute(&sql, params.as_slice())?;
        }
    }

    if auto_key {
        record.set(pk.name(), conn.last_insert_rowid());
    }
    let key = record
        .key(desc)
        .cloned()
        .ok_or_else(|| WriteError::MissingKey(desc.table().to_string()))?;

    fetch_by_key(conn, desc, &key, true)
        .map_err(WriteError::ReadBack)?
        .ok_or_else(|| WriteError::RowNotFound {
            table: desc.table().to_string(),
            key: key.to_string(),
        })
}

/// The single live row whose primary key equals `key`.
pub fn find_by_key(
    conn: &Connection,
    desc: &Descriptor,
    key: &Value,
) -> Result<Option<Record>, ReadError> {
    fetch_by_key(conn, desc, key, false)
}

/// The first live row satisfying `predicate`, primary key ascending.
///
/// `predicate` is a SQL expression over the descriptor's fields with
/// positional parameters (`?1`, `?2`, ...) bound from `params`.
pub fn find_first(
    conn: &Connection,
    desc: &Descriptor,
    predicate: &str,
    params: &[Value],
) -> Result<Option<Record>, ReadError> {
    let sql = format!(
        "{} ORDER BY {} ASC LIMIT 1",
        filtered_select(desc, predicate),
        quote_ident(desc.primary_key().name())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_record(desc, row)?)),
        None => Ok(None),
    }
}

/// Every live row satisfying `predicate`, primary key ascending.
pub fn find_all(
    conn: &Connection,
    desc: &Descriptor,
    predicate: &str,
    params: &[Value],
) -> Result<Vec<Record>, ReadError> {
    let sql = format!(
        "{} ORDER BY {} ASC",
        filtered_select(desc, predicate),
        quote_ident(desc.primary_key().name())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(row_to_record(desc, row)?);
    }
    Ok(records)
}

/// Update one column of the row matching `record`'s key.
///
/// Refreshes `updated_at` when the descriptor declares it, and mirrors both
/// changes into `record` on success. No row is ever created: a record with
/// no persisted key fails with [`WriteError::MissingKey`], a vanished (or
/// soft-deleted) row with [`WriteError::RowNotFound`].
pub fn update_field(
    conn: &Connection,
    desc: &Descriptor,
    record: &mut Record,
    field: &str,
    value: impl Into<Value>,
) -> Result<(), WriteError> {
    if desc.field(field).is_none() {
        return Err(WriteError::UnknownField {
            table: desc.table().to_string(),
            field: field.to_string(),
        });
    }
    let key = record
        .key(desc)
        .cloned()
        .ok_or_else(|| WriteError::MissingKey(desc.table().to_string()))?;

    let value: Value = value.into();
    let stamp = Utc::now();
    let stamp_value = Value::Timestamp(stamp);

    {
        let mut sets: Vec<String> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        params.push(&value);
        sets.push(format!("{} = ?{}", quote_ident(field), params.len()));
        if let Some(updated) = desc.updated_at() {
            if updated != field {
                params.push(&stamp_value);
                sets.push(format!("{} = ?{}", quote_ident(updated), params.len()));
            }
        }
        params.push(&key);
        let mut sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(desc.table()),
            sets.join(", "),
            quote_ident(desc.primary_key().name()),
            params.len()
        );
        if let Some(deleted) = desc.soft_delete() {
            sql.push_str(&format!(" AND {} IS NULL", quote_ident(deleted)));
        }

        let changed = conn.execute(&sql, params.as_slice())?;
        if changed == 0 {
            return Err(WriteError::RowNotFound {
                table: desc.table().to_string(),
                key: key.to_string(),
            });
        }
    }

    record.set(field, value);
    if let Some(updated) = desc.updated_at() {
        if updated != field {
            record.set(updated, stamp);
        }
    }
    Ok(())
}

/// Delete the row matching `record`'s key.
///
/// Soft delete (stamp the soft-delete field) when the descriptor declares
/// one, hard delete otherwise. Idempotent on an already deleted record.
pub fn delete(conn: &Connection, desc: &Descriptor, record: &Record) -> Result<(), WriteError> {
    let key = record
        .key(desc)
        .cloned()
        .ok_or_else(|| WriteError::MissingKey(desc.table().to_string()))?;

    match desc.soft_delete() {
        Some(deleted) => {
            let sql = format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2 AND {} IS NULL",
                quote_ident(desc.table()),
                quote_ident(deleted),
                quote_ident(desc.primary_key().name()),
                quote_ident(deleted)
            );
            conn.execute(&sql, rusqlite::params![Value::Timestamp(Utc::now()), key])?;
        }
        None => {
            hard_delete(conn, desc, &key)?;
        }
    }
    Ok(())
}

/// Remove the row matching `record`'s key even when the descriptor soft
/// deletes; the separate hard-delete policy for purging marked rows.
pub fn purge(conn: &Connection, desc: &Descriptor, record: &Record) -> Result<(), WriteError> {
    let key = record
        .key(desc)
        .cloned()
        .ok_or_else(|| WriteError::MissingKey(desc.table().to_string()))?;
    hard_delete(conn, desc, &key)
}

fn hard_delete(conn: &Connection, desc: &Descriptor, key: &Value) -> Result<(), WriteError> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote_ident(desc.table()),
        quote_ident(desc.primary_key().name())
    );
    conn.execute(&sql, [key])?;
    Ok(())
}

fn select_clause(desc: &Descriptor) -> String {
    let columns: Vec<String> = desc
        .fields()
        .iter()
        .map(|f| quote_ident(f.name()))
        .collect();
    format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_ident(desc.table())
    )
}

fn filtered_select(desc: &Descriptor, predicate: &str) -> String {
    let mut sql = format!("{} WHERE ({predicate})", select_clause(desc));
    if let Some(deleted) = desc.soft_delete() {
        sql.push_str(&format!(" AND {} IS NULL", quote_ident(deleted)));
    }
    sql
}

fn fetch_by_key(
    conn: &Connection,
    desc: &Descriptor,
    key: &Value,
    include_deleted: bool,
) -> Result<Option<Record>, ReadError> {
    let mut sql = format!(
        "{} WHERE {} = ?1",
        select_clause(desc),
        quote_ident(desc.primary_key().name())
    );
    if !include_deleted {
        if let Some(deleted) = desc.soft_delete() {
            sql.push_str(&format!(" AND {} IS NULL", quote_ident(deleted)));
        }
    }
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_record(desc, row)?)),
        None => Ok(None),
    }
}

/// Columns are selected in descriptor field order; NULLs stay absent.
fn row_to_record(desc: &Descriptor, row: &rusqlite::Row<'_>) -> Result<Record, ReadError> {
    let mut record = Record::new();
    for (i, field) in desc.fields().iter().enumerate() {
        let value = Value::from_sql(field.name(), field.kind(), row.get_ref(i)?)?;
        record.set(field.name(), value);
    }
    Ok(record)
}
