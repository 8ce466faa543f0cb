//! Record type descriptors
//!
//! In-memory definitions of a record type's shape and keys. A descriptor is
//! built once, validated, and then shared by the schema mapper and the
//! record gateway.

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
    Blob,
}

impl FieldKind {
    /// The SQLite column type this kind maps to
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Integer | FieldKind::Boolean => "INTEGER",
            FieldKind::Real => "REAL",
            FieldKind::Text | FieldKind::Timestamp => "TEXT",
            FieldKind::Blob => "BLOB",
        }
    }
}

/// Reference from a foreign key field to another descriptor's primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub kind: FieldKind,
}

/// One field of a record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    kind: FieldKind,
    nullable: bool,
    primary_key: bool,
    references: Option<ForeignKey>,
}

impl Field {
    /// A non-nullable field named `name`
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: false,
            primary_key: false,
            references: None,
        }
    }

    /// Allow NULL values in this field
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark this field as the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Make this field a foreign key to `target`'s primary key
    pub fn references(mut self, target: &Descriptor) -> Self {
        let pk = target.primary_key();
        self.references = Some(ForeignKey {
            table: target.table().to_string(),
            column: pk.name().to_string(),
            kind: pk.kind(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.references.as_ref()
    }
}

/// In-memory definition of a record type's shape and keys
///
/// Invariants upheld by [`DescriptorBuilder::build`]: field names are
/// unique, exactly one field is the primary key, and every foreign key
/// field has the same kind as the primary key it references. Descriptors
/// only enter the system through the builder, so `Deserialize` is not
/// derived here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    table: String,
    fields: Vec<Field>,
    primary_key: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    soft_delete: Option<String>,
}

impl Descriptor {
    /// Start building a descriptor for the table named `table`
    pub fn builder(table: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            table: table.to_string(),
            fields: Vec::new(),
            created_at: None,
            updated_at: None,
            soft_delete: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The designated primary key field
    pub fn primary_key(&self) -> &Field {
        self.field(&self.primary_key)
            .expect("validated at build time")
    }

    /// Name of the created-timestamp field, if declared
    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    /// Name of the updated-timestamp field, if declared
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    /// Name of the soft-delete timestamp field, if declared
    pub fn soft_delete(&self) -> Option<&str> {
        self.soft_delete.as_deref()
    }
}

/// Validating builder for [`Descriptor`]
pub struct DescriptorBuilder {
    table: String,
    fields: Vec<Field>,
    created_at: Option<String>,
    updated_at: Option<String>,
    soft_delete: Option<String>,
}

impl DescriptorBuilder {
    /// Add a field
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add `created_at` and `updated_at` timestamp fields, stamped by the
    /// gateway on insert and update.
    pub fn timestamps(mut self) -> Self {
        self.fields.push(Field::new("created_at", FieldKind::Timestamp));
        self.fields.push(Field::new("updated_at", FieldKind::Timestamp));
        self.created_at = Some("created_at".to_string());
        self.updated_at = Some("updated_at".to_string());
        self
    }

    /// Add a nullable `deleted_at` timestamp field; deletes become marks
    /// instead of row removal.
    pub fn soft_delete(mut self) -> Self {
        self.fields
            .push(Field::new("deleted_at", FieldKind::Timestamp).nullable());
        self.soft_delete = Some("deleted_at".to_string());
        self
    }

    /// Add the conventional standard fields by composition: an integer `id`
    /// primary key, both timestamps, and the soft-delete mark.
    pub fn standard_fields(self) -> Self {
        self.field(Field::new("id", FieldKind::Integer).primary_key())
            .timestamps()
            .soft_delete()
    }

    /// Validate and build the descriptor.
    ///
    /// If no field is marked as primary key, a field named `id` is promoted
    /// by convention.
    pub fn build(mut self) -> Result<Descriptor, DescriptorError> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DescriptorError::DuplicateField {
                    table: self.table,
                    field: field.name.clone(),
                });
            }
        }

        let marked: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.clone())
            .collect();
        let primary_key = match marked.as_slice() {
            [] => {
                let id = self
                    .fields
                    .iter_mut()
                    .find(|f| f.name == "id")
                    .ok_or_else(|| DescriptorError::MissingPrimaryKey(self.table.clone()))?;
                id.primary_key = true;
                id.name.clone()
            }
            [one] => one.clone(),
            _ => return Err(DescriptorError::MultiplePrimaryKeys(self.table)),
        };

        for field in &mut self.fields {
            if field.name == primary_key {
                // key columns are always non-null
                field.nullable = false;
            }
            if let Some(fk) = &field.references {
                if fk.kind != field.kind {
                    return Err(DescriptorError::ForeignKeyKindMismatch {
                        table: self.table,
                        field: field.name.clone(),
                        declared: field.kind,
                        referenced: fk.kind,
                    });
                }
            }
        }

        Ok(Descriptor {
            table: self.table,
            fields: self.fields,
            primary_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
            soft_delete: self.soft_delete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_primary_key() {
        let desc = Descriptor::builder("animals")
            .field(Field::new("animal_id", FieldKind::Integer).primary_key())
            .field(Field::new("name", FieldKind::Text))
            .build()
            .unwrap();
        assert_eq!(desc.primary_key().name(), "animal_id");
    }

    #[test]
    fn test_id_field_promoted_by_convention() {
        let desc = Descriptor::builder("users")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("name", FieldKind::Text))
            .build()
            .unwrap();
        assert!(desc.primary_key().is_primary_key());
        assert_eq!(desc.primary_key().name(), "id");
    }

    #[test]
    fn test_missing_primary_key_rejected() {
        let err = Descriptor::builder("users")
            .field(Field::new("name", FieldKind::Text))
            .build()
            .unwrap_err();
        assert!(matches!(err, DescriptorError::MissingPrimaryKey(_)));
    }

    #[test]
    fn test_multiple_primary_keys_rejected() {
        let err = Descriptor::builder("users")
            .field(Field::new("id", FieldKind::Integer).primary_key())
            .field(Field::new("uuid", FieldKind::Text).primary_key())
            .build()
            .unwrap_err();
        assert!(matches!(err, DescriptorError::MultiplePrimaryKeys(_)));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Descriptor::builder("users")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("name", FieldKind::Text))
            .field(Field::new("name", FieldKind::Text))
            .build()
            .unwrap_err();
        assert!(matches!(err, DescriptorError::DuplicateField { .. }));
    }

    #[test]
    fn test_foreign_key_kind_must_match_referenced_key() {
        let users = Descriptor::builder("users").standard_fields().build().unwrap();

        let err = Descriptor::builder("credit_cards")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("user_id", FieldKind::Text).references(&users))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::ForeignKeyKindMismatch { .. }
        ));

        let ok = Descriptor::builder("credit_cards")
            .field(Field::new("id", FieldKind::Integer))
            .field(Field::new("user_id", FieldKind::Integer).references(&users))
            .build()
            .unwrap();
        let fk = ok.field("user_id").unwrap().foreign_key().unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.column, "id");
    }

    #[test]
    fn test_standard_fields_composition() {
        let desc = Descriptor::builder("products").standard_fields().build().unwrap();
        assert_eq!(desc.primary_key().name(), "id");
        assert_eq!(desc.created_at(), Some("created_at"));
        assert_eq!(desc.updated_at(), Some("updated_at"));
        assert_eq!(desc.soft_delete(), Some("deleted_at"));
        assert!(desc.field("deleted_at").unwrap().is_nullable());
    }

    #[test]
    fn test_primary_key_forced_non_nullable() {
        let desc = Descriptor::builder("users")
            .field(Field::new("id", FieldKind::Integer).nullable())
            .build()
            .unwrap();
        assert!(!desc.primary_key().is_nullable());
    }
}
