//! Field and feature records shared by tables and feature classes.
//!
//! # Responsibility
//! - Define the field descriptor (storage type, physical name, user alias,
//!   original/source name) and the row model.
//!
//! # Invariants
//! - `Feature::id` below zero means "not yet persisted".
//! - `values` is positionally aligned with the owning table's user fields.

use crate::model::geometry::Geometry;

/// Storage type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Blob,
    Date,
}

impl FieldType {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            // Epoch milliseconds, matching the store's timestamp columns.
            Self::Date => "INTEGER",
        }
    }
}

/// Descriptor of one user-visible table column.
///
/// `alias` keeps the user-facing label while `name` is the sanitized
/// physical column name; `original_name` preserves the source column name
/// of imported data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub field_type: FieldType,
    pub name: String,
    pub alias: String,
    pub original_name: String,
}

impl Field {
    /// Creates a field whose alias and original name match the physical
    /// name, the common case for natively created tables.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            field_type,
            alias: name.clone(),
            original_name: name.clone(),
            name,
        }
    }
}

/// One column value of a feature row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One row of a table, optionally carrying a geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    /// Row id; negative until the feature is persisted.
    pub id: i64,
    pub geometry: Option<Geometry>,
    pub values: Vec<FieldValue>,
}

impl Feature {
    /// Creates an unpersisted feature with `field_count` null values.
    pub fn with_fields(field_count: usize) -> Self {
        Self {
            id: -1,
            geometry: None,
            values: vec![FieldValue::Null; field_count],
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id >= 0
    }

    pub fn value(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    pub fn set_value(&mut self, index: usize, value: FieldValue) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
