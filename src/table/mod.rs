//! # Embedded tables
//!
//! PDS products carry fixed-width tables next to the pixels: pointing and position tables,
//! dark-pixel strips, housekeeping records. This module describes them, reads them, and holds
//! the in-memory [`Table`] model that cube sinks store.
//!
//! ## Overview
//!
//! - [`descriptor`]: [`TableDescriptor`] / [`ColumnDescriptor`] parsed from a `TABLE`-like object
//!   and validated before any byte is read.
//! - [`reader`]: locating, buffering and decoding rows into [`TableRecord`]s.
//! - [`Table`], [`Field`], [`FieldValue`]: the record model written to cubes.
//!
//! ## Lifecycle
//!
//! ```text
//! Described ──► Located ──► Buffered ──► Emitted
//!     │            │            │
//!     └────────────┴────────────┴──► BadTable: table skipped, diagnostic recorded
//! ```

pub mod descriptor;
pub mod reader;

use std::fmt;

use itertools::Itertools;

use crate::label::{Keyword, PvlContainer};

pub use descriptor::{ColumnDescriptor, TableDescriptor, TableFormat};
pub use reader::{import_tables, read_table, TableDiagnostic, TableImport};

/// Value type of a table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Double,
    /// Fixed-width text.
    Text(usize),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Integer => f.write_str("Integer"),
            FieldType::Double => f.write_str("Double"),
            FieldType::Text(_) => f.write_str("Text"),
        }
    }
}

/// One column of the table schema; `size` is the number of items (1 for scalars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldType,
    pub size: usize,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Field {
            name: name.into(),
            kind,
            size: 1,
        }
    }

    pub fn array(name: impl Into<String>, kind: FieldType, size: usize) -> Self {
        Field {
            name: name.into(),
            kind,
            size,
        }
    }

    /// Bytes one value of this field occupies in a cube table record.
    pub fn record_bytes(&self) -> usize {
        match self.kind {
            FieldType::Integer => 4 * self.size,
            FieldType::Double => 8 * self.size,
            FieldType::Text(width) => width * self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Double(f64),
    Text(String),
    Integers(Vec<i64>),
    Doubles(Vec<f64>),
    Texts(Vec<String>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Double(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v}"),
            FieldValue::Integers(v) => write!(f, "({})", v.iter().join(", ")),
            FieldValue::Doubles(v) => write!(f, "({})", v.iter().join(", ")),
            FieldValue::Texts(v) => write!(f, "({})", v.iter().join(", ")),
        }
    }
}

/// Field values of one row, in schema order.
pub type TableRecord = Vec<FieldValue>;

/// A named table with its schema and rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub fields: Vec<Field>,
    pub records: Vec<TableRecord>,
    /// Extra keywords stored with the table (e.g. `Association = Lines`).
    pub keywords: Vec<Keyword>,
}

impl Table {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Table {
            name: name.into(),
            fields,
            records: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn push(&mut self, record: TableRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Bytes of one record in a cube table.
    pub fn record_bytes(&self) -> usize {
        self.fields.iter().map(Field::record_bytes).sum()
    }

    /// Label object describing this table in a cube label.
    pub fn label_object(&self) -> PvlContainer {
        let mut object = PvlContainer::new_object("Table");
        object.add_keyword(Keyword::new("Name", self.name.as_str()));
        object.add_keyword(Keyword::new("Records", self.records.len().to_string()));
        object.add_keyword(Keyword::new("ByteOrder", "Lsb"));
        for keyword in &self.keywords {
            object.add_keyword(keyword.clone());
        }
        for field in &self.fields {
            let mut group = PvlContainer::new_group("Field");
            group.add_keyword(Keyword::new("Name", field.name.as_str()));
            group.add_keyword(Keyword::new("Type", field.kind.to_string()));
            let size = match field.kind {
                FieldType::Text(width) => width * field.size,
                _ => field.size,
            };
            group.add_keyword(Keyword::new("Size", size.to_string()));
            object.add_container(group);
        }
        object
    }
}

/// `START_TIME` → `StartTime`; `SCET_1` → `Scet1`; parentheses are dropped.
pub fn camel_case(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| *c != '(' && *c != ')').collect();
    cleaned
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod test_table {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("START_TIME"), "StartTime");
        assert_eq!(camel_case("SCET_1"), "Scet1");
        assert_eq!(camel_case("ephemeris time"), "EphemerisTime");
        assert_eq!(camel_case("Value"), "Value");
        assert_eq!(camel_case("QUATERNION (J2000)"), "QuaternionJ2000");
    }

    #[test]
    fn test_label_object() {
        let mut table = Table::new(
            "CtxPrefixDark",
            vec![
                Field::new("Line", FieldType::Integer),
                Field::array("Dark", FieldType::Integer, 7),
                Field::new("Label", FieldType::Text(12)),
            ],
        );
        table.push(vec![
            FieldValue::Integer(1),
            FieldValue::Integers(vec![0; 7]),
            FieldValue::Text("a".into()),
        ]);
        assert_eq!(table.record_bytes(), 4 + 28 + 12);
        let object = table.label_object();
        assert_eq!(object.keyword("Records").unwrap().as_i64().unwrap(), 1);
        assert_eq!(object.groups().count(), 3);
        assert_eq!(table.field_index("dark"), Some(1));
    }
}
