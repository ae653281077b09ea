//! Table and column descriptions read from a label.
//!
//! A table is any object that holds `COLUMN` sub-objects and is named by a pointer keyword
//! (`^INSTRUMENT_POSITION_TABLE = ("X.DAT", 3)`). Every column is checked against the row size
//! before a byte of the table is read.

use camino::{Utf8Path, Utf8PathBuf};

use super::{camel_case, Field, FieldType};
use crate::geometry::pds_geometry::locate_pointer;
use crate::geometry::ByteOrder;
use crate::ingest_errors::IngestError;
use crate::label::{ContainerKind, Label, PvlContainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Ascii,
    Binary,
}

/// Storage of one column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    SignedInteger,
    UnsignedInteger,
    Real,
    Character,
}

/// One `COLUMN` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// `DATA_TYPE` as written in the label.
    pub data_type: String,
    pub kind: ColumnKind,
    pub byte_order: ByteOrder,
    /// 0-based start within the row.
    pub start: usize,
    pub bytes: usize,
    pub items: usize,
    pub item_bytes: usize,
    pub item_offset: usize,
}

impl ColumnDescriptor {
    fn from_object(
        object: &PvlContainer,
        format: TableFormat,
        table: &str,
    ) -> Result<Self, IngestError> {
        let bad = |reason: String| IngestError::BadTable {
            name: table.to_string(),
            reason,
        };
        let name = object
            .keyword("NAME")
            .and_then(|k| k.as_str().ok())
            .ok_or_else(|| bad("COLUMN without NAME".into()))?
            .to_string();
        let data_type = object
            .keyword("DATA_TYPE")
            .and_then(|k| k.as_str().ok())
            .ok_or_else(|| bad(format!("column {name} has no DATA_TYPE")))?
            .to_ascii_uppercase();
        let integer = |key: &str| -> Result<Option<usize>, IngestError> {
            object
                .keyword(key)
                .map(|k| k.as_usize())
                .transpose()
                .map_err(|e| bad(format!("column {name}: {e}")))
        };
        let start_byte = integer("START_BYTE")?
            .ok_or_else(|| bad(format!("column {name} has no START_BYTE")))?;
        if start_byte == 0 {
            return Err(bad(format!("column {name}: START_BYTE is 1-based")));
        }
        let bytes =
            integer("BYTES")?.ok_or_else(|| bad(format!("column {name} has no BYTES")))?;
        if bytes == 0 {
            return Err(bad(format!("column {name}: BYTES is 0")));
        }
        let items = integer("ITEMS")?.unwrap_or(1).max(1);
        let item_bytes = integer("ITEM_BYTES")?.unwrap_or(bytes / items);
        if item_bytes == 0 {
            return Err(bad(format!("column {name}: {items} items in {bytes} bytes")));
        }
        let item_offset = integer("ITEM_OFFSET")?.unwrap_or(item_bytes);
        let (kind, byte_order) = classify_data_type(&data_type, format);

        Ok(ColumnDescriptor {
            name,
            data_type,
            kind,
            byte_order,
            start: start_byte - 1,
            bytes,
            items,
            item_bytes,
            item_offset,
        })
    }

    /// Schema field of the cube table.
    pub fn field(&self) -> Field {
        let kind = match self.kind {
            ColumnKind::SignedInteger | ColumnKind::UnsignedInteger => FieldType::Integer,
            ColumnKind::Real => FieldType::Double,
            ColumnKind::Character => FieldType::Text(self.item_bytes),
        };
        Field::array(camel_case(&self.name), kind, self.items)
    }

    /// Bytes spanned by the items, from the column start.
    fn span(&self) -> usize {
        (self.items - 1) * self.item_offset + self.item_bytes
    }
}

/// Storage kind and byte order of a PDS `DATA_TYPE`.
pub fn classify_data_type(data_type: &str, format: TableFormat) -> (ColumnKind, ByteOrder) {
    let t = data_type.to_ascii_uppercase();
    let order = if ["LSB_", "PC_", "VAX_"].iter().any(|p| t.starts_with(p)) {
        ByteOrder::Lsb
    } else {
        ByteOrder::Msb
    };
    let kind = if t.contains("INTEGER") {
        if t.contains("UNSIGNED") {
            ColumnKind::UnsignedInteger
        } else {
            ColumnKind::SignedInteger
        }
    } else if t.contains("REAL") || t.contains("FLOAT") || t.contains("DOUBLE") {
        ColumnKind::Real
    } else {
        ColumnKind::Character
    };
    // ASCII tables hold text renditions regardless of the nominal binary flavour.
    let order = match format {
        TableFormat::Ascii => ByteOrder::Msb,
        TableFormat::Binary => order,
    };
    (kind, order)
}

/// A table object located in its file and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Object name in the label, e.g. `INSTRUMENT_POSITION_TABLE`.
    pub name: String,
    pub format: TableFormat,
    pub rows: usize,
    pub row_bytes: usize,
    pub row_prefix_bytes: usize,
    pub row_suffix_bytes: usize,
    pub file: Utf8PathBuf,
    pub offset: u64,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Describe and locate the table named by `pointer` (e.g. `^SUN_POSITION_TABLE`).
    ///
    /// Return
    /// ----------
    /// * The validated descriptor, or [`IngestError::BadTable`] when the object is missing, a
    ///   column does not fit its row, or the table does not fit in its file.
    pub fn from_label(
        label: &Label,
        label_path: &Utf8Path,
        pointer: &str,
    ) -> Result<Self, IngestError> {
        let name = pointer.trim_start_matches('^').to_string();
        let bad = |reason: String| IngestError::BadTable {
            name: name.clone(),
            reason,
        };
        let object = label
            .traverse_container(&name, Some(ContainerKind::Object))
            .ok_or_else(|| bad("no table object for pointer".into()))?;
        let mut descriptor = Self::describe(object)?;
        let location = locate_pointer(label, label_path, pointer)
            .map_err(|e| bad(format!("cannot locate table: {e}")))?;
        descriptor.file = location.file;
        descriptor.offset = location.offset;
        descriptor.check_extent()?;
        Ok(descriptor)
    }

    /// Describe a table object and validate its columns; the location is left empty.
    pub fn describe(object: &PvlContainer) -> Result<Self, IngestError> {
        let name = object.name.clone();
        let bad = |reason: String| IngestError::BadTable {
            name: name.clone(),
            reason,
        };
        let count = |key: &str| -> Result<Option<usize>, IngestError> {
            object
                .keyword(key)
                .map(|k| k.as_usize())
                .transpose()
                .map_err(|e| bad(e.to_string()))
        };
        let rows = count("ROWS")?.ok_or_else(|| bad("missing ROWS".into()))?;
        let row_bytes = count("ROW_BYTES")?.ok_or_else(|| bad("missing ROW_BYTES".into()))?;
        if row_bytes == 0 {
            return Err(bad("ROW_BYTES is 0".into()));
        }

        let column_objects: Vec<&PvlContainer> =
            object.objects().filter(|c| c.is_named("COLUMN")).collect();
        if column_objects.is_empty() {
            return Err(bad("no COLUMN objects".into()));
        }
        let format = match object.keyword("INTERCHANGE_FORMAT").and_then(|k| k.as_str().ok()) {
            Some(f) if f.eq_ignore_ascii_case("ASCII") => TableFormat::Ascii,
            Some(_) => TableFormat::Binary,
            None => {
                let binary = column_objects.iter().any(|c| {
                    c.keyword("DATA_TYPE")
                        .and_then(|k| k.as_str().ok())
                        .map(str::to_ascii_uppercase)
                        .is_some_and(|t| !t.starts_with("ASCII") && t != "CHARACTER")
                });
                if binary {
                    TableFormat::Binary
                } else {
                    TableFormat::Ascii
                }
            }
        };
        let columns = column_objects
            .into_iter()
            .map(|c| ColumnDescriptor::from_object(c, format, &name))
            .collect::<Result<Vec<_>, _>>()?;

        let descriptor = TableDescriptor {
            name: name.clone(),
            format,
            rows,
            row_bytes,
            row_prefix_bytes: count("ROW_PREFIX_BYTES")?.unwrap_or(0),
            row_suffix_bytes: count("ROW_SUFFIX_BYTES")?.unwrap_or(0),
            file: Utf8PathBuf::new(),
            offset: 0,
            columns,
        };
        descriptor.check_columns()?;
        Ok(descriptor)
    }

    /// Bytes from the start of one row to the start of the next.
    pub fn stride(&self) -> usize {
        self.row_prefix_bytes + self.row_bytes + self.row_suffix_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.rows as u64 * self.stride() as u64
    }

    pub fn fields(&self) -> Vec<Field> {
        self.columns.iter().map(ColumnDescriptor::field).collect()
    }

    /// Name of the cube table, `INSTRUMENT_POSITION_TABLE` → `InstrumentPositionTable`.
    pub fn table_name(&self) -> String {
        camel_case(&self.name)
    }

    fn check_columns(&self) -> Result<(), IngestError> {
        for c in &self.columns {
            let reason = if c.start + c.bytes > self.row_bytes {
                Some(format!(
                    "column {}: START_BYTE {} + BYTES {} exceeds ROW_BYTES {}",
                    c.name,
                    c.start + 1,
                    c.bytes,
                    self.row_bytes
                ))
            } else if c.items * c.item_bytes > c.bytes || c.span() > c.bytes {
                Some(format!(
                    "column {}: {} items of {} bytes do not fit in {} bytes",
                    c.name, c.items, c.item_bytes, c.bytes
                ))
            } else if self.format == TableFormat::Binary
                && c.kind != ColumnKind::Character
                && !matches!(c.item_bytes, 1 | 2 | 4 | 8)
            {
                Some(format!(
                    "column {}: {}-byte binary {} values are not supported",
                    c.name, c.item_bytes, c.data_type
                ))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(IngestError::BadTable {
                    name: self.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    fn check_extent(&self) -> Result<(), IngestError> {
        let length = std::fs::metadata(&self.file)?.len();
        let end = self.offset + self.total_bytes();
        if end > length {
            return Err(IngestError::BadTable {
                name: self.name.clone(),
                reason: format!(
                    "table spans bytes {}..{end} but {} has {length} bytes",
                    self.offset, self.file
                ),
            });
        }
        Ok(())
    }
}

/// Pointer keywords of the label whose objects are tables, in label order.
pub fn table_pointers(label: &Label) -> Vec<String> {
    let file_objects = label
        .objects()
        .filter(|o| o.is_named("FILE") || o.is_named("UNCOMPRESSED_FILE"));
    let mut pointers: Vec<String> = Vec::new();
    for keyword in label.keywords().chain(file_objects.flat_map(|o| o.keywords())) {
        if !keyword.name.starts_with('^') || pointers.iter().any(|p| keyword.is_named(p)) {
            continue;
        }
        let is_table = label
            .traverse_container(keyword.name.trim_start_matches('^'), Some(ContainerKind::Object))
            .is_some_and(|o| o.objects().any(|c| c.is_named("COLUMN")));
        if is_table {
            pointers.push(keyword.name.clone());
        }
    }
    pointers
}
