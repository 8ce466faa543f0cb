//! Schema migration
//!
//! Reconciles a store's table structure with a descriptor: creates the
//! table on first sight, adds columns that appeared since, and never drops,
//! renames, or retypes anything.

use rusqlite::Connection;

use super::descriptor::{Descriptor, Field, FieldKind};
use super::quote_ident;
use crate::error::SchemaError;

/// One column as reported by `PRAGMA table_info`
struct ColumnInfo {
    name: String,
    decl_type: String,
}

/// Bring the table backing `desc` in line with the descriptor.
///
/// Creates the table if it does not exist. Otherwise adds a nullable column
/// for every field that has none; a same-named column of a different type
/// is a [`SchemaError::ColumnTypeConflict`]. Idempotent for an unchanged
/// descriptor.
///
/// Tables referenced by foreign key fields must be ensured first.
pub fn ensure_table(conn: &Connection, desc: &Descriptor) -> Result<(), SchemaError> {
    if !table_exists(conn, desc.table())? {
        return create_table(conn, desc);
    }

    let existing = table_columns(conn, desc.table())?;
    for field in desc.fields() {
        match existing.iter().find(|c| c.name == field.name()) {
            Some(col) => {
                if !col.decl_type.eq_ignore_ascii_case(field.kind().sql_type()) {
                    return Err(SchemaError::ColumnTypeConflict {
                        table: desc.table().to_string(),
                        column: field.name().to_string(),
                        existing: col.decl_type.clone(),
                        declared: field.kind().sql_type().to_string(),
                    });
                }
            }
            None if field.is_primary_key() => {
                return Err(SchemaError::MissingKeyColumn {
                    table: desc.table().to_string(),
                    column: field.name().to_string(),
                });
            }
            None => add_column(conn, desc, field)?,
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, SchemaError> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    Ok(stmt.exists([table])?)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                decl_type: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn create_table(conn: &Connection, desc: &Descriptor) -> Result<(), SchemaError> {
    let columns: Vec<String> = desc.fields().iter().map(column_def).collect();
    let sql = format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(desc.table()),
        columns.join(",\n    ")
    );
    tracing::debug!(table = desc.table(), "creating table");
    conn.execute(&sql, [])?;
    Ok(())
}

fn column_def(field: &Field) -> String {
    let mut def = format!("{} {}", quote_ident(field.name()), field.kind().sql_type());
    if field.is_primary_key() {
        if field.kind() == FieldKind::Integer {
            def.push_str(" PRIMARY KEY AUTOINCREMENT");
        } else {
            // non-integer keys do not imply NOT NULL in SQLite
            def.push_str(" PRIMARY KEY NOT NULL");
        }
    } else if !field.is_nullable() {
        def.push_str(" NOT NULL");
    }
    if let Some(fk) = field.foreign_key() {
        def.push_str(&format!(
            " REFERENCES {}({})",
            quote_ident(&fk.table),
            quote_ident(&fk.column)
        ));
    }
    def
}

/// Added columns are always nullable so existing rows survive.
fn add_column(conn: &Connection, desc: &Descriptor, field: &Field) -> Result<(), SchemaError> {
    let mut def = format!("{} {}", quote_ident(field.name()), field.kind().sql_type());
    if let Some(fk) = field.foreign_key() {
        def.push_str(&format!(
            " REFERENCES {}({})",
            quote_ident(&fk.table),
            quote_ident(&fk.column)
        ));
    }
    tracing::debug!(table = desc.table(), column = field.name(), "adding column");
    conn.execute(
        &format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(desc.table()),
            def
        ),
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn columns(conn: &Connection, table: &str) -> Vec<(String, String)> {
        table_columns(conn, table)
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.decl_type))
            .collect()
    }

    #[test]
    fn test_creates_table_with_one_column_per_field() {
        let conn = conn();
        let desc = Descriptor::builder("products")
            .standard_fields()
            .field(Field::new("code", FieldKind::Text))
            .field(Field::new("price", FieldKind::Integer))
            .build()
            .unwrap();

        ensure_table(&conn, &desc).unwrap();

        assert_eq!(
            columns(&conn, "products"),
            vec![
                ("id".into(), "INTEGER".into()),
                ("created_at".into(), "TEXT".into()),
                ("updated_at".into(), "TEXT".into()),
                ("deleted_at".into(), "TEXT".into()),
                ("code".into(), "TEXT".into()),
                ("price".into(), "INTEGER".into()),
            ]
        );
    }

    #[test]
    fn test_ensure_table_is_idempotent() {
        let conn = conn();
        let desc = Descriptor::builder("products")
            .standard_fields()
            .field(Field::new("code", FieldKind::Text))
            .build()
            .unwrap();

        ensure_table(&conn, &desc).unwrap();
        let before = columns(&conn, "products");
        ensure_table(&conn, &desc).unwrap();
        assert_eq!(columns(&conn, "products"), before);
    }

    #[test]
    fn test_new_fields_become_nullable_columns() {
        let conn = conn();
        let v1 = Descriptor::builder("products")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("code", FieldKind::Text))
            .build()
            .unwrap();
        ensure_table(&conn, &v1).unwrap();
        conn.execute("INSERT INTO products (code) VALUES ('123456')", [])
            .unwrap();

        let v2 = Descriptor::builder("products")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("code", FieldKind::Text))
            .field(Field::new("price", FieldKind::Integer))
            .build()
            .unwrap();
        ensure_table(&conn, &v2).unwrap();

        // existing row survives with the new column unset
        let price: Option<i64> = conn
            .query_row("SELECT price FROM products WHERE code = '123456'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(price, None);
    }

    #[test]
    fn test_column_type_conflict_is_reported_not_resolved() {
        let conn = conn();
        let v1 = Descriptor::builder("products")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("code", FieldKind::Text))
            .build()
            .unwrap();
        ensure_table(&conn, &v1).unwrap();

        let v2 = Descriptor::builder("products")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("code", FieldKind::Real))
            .build()
            .unwrap();
        let err = ensure_table(&conn, &v2).unwrap_err();
        assert!(matches!(err, SchemaError::ColumnTypeConflict { .. }));

        // the existing column is untouched
        assert!(columns(&conn, "products").contains(&("code".into(), "TEXT".into())));
    }

    #[test]
    fn test_missing_key_column_is_a_conflict() {
        let conn = conn();
        let v1 = Descriptor::builder("animals")
            .field(Field::new("id", FieldKind::Integer))
            .build()
            .unwrap();
        ensure_table(&conn, &v1).unwrap();

        let v2 = Descriptor::builder("animals")
            .field(Field::new("animal_id", FieldKind::Integer).primary_key())
            .build()
            .unwrap();
        let err = ensure_table(&conn, &v2).unwrap_err();
        assert!(matches!(err, SchemaError::MissingKeyColumn { .. }));
    }

    #[test]
    fn test_foreign_key_column_references_parent() {
        let conn = conn();
        let users = Descriptor::builder("users").standard_fields().build().unwrap();
        let cards = Descriptor::builder("credit_cards")
            .standard_fields()
            .field(Field::new("number", FieldKind::Text))
            .field(Field::new("user_id", FieldKind::Integer).references(&users))
            .build()
            .unwrap();

        ensure_table(&conn, &users).unwrap();
        ensure_table(&conn, &cards).unwrap();

        let fk_table: String = conn
            .query_row("SELECT \"table\" FROM pragma_foreign_key_list('credit_cards')", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(fk_table, "users");
    }

    #[test]
    fn test_text_primary_key_is_unique_and_non_null() {
        let conn = conn();
        let desc = Descriptor::builder("users")
            .field(Field::new("id", FieldKind::Text).primary_key())
            .field(Field::new("name", FieldKind::Text).nullable())
            .build()
            .unwrap();
        ensure_table(&conn, &desc).unwrap();

        conn.execute("INSERT INTO users (id) VALUES ('a')", []).unwrap();
        assert!(conn.execute("INSERT INTO users (id) VALUES ('a')", []).is_err());
        assert!(conn
            .execute("INSERT INTO users (id) VALUES (NULL)", [])
            .is_err());
    }
}
