//! Reading described tables into [`Table`]s.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use camino::Utf8Path;
use log::{debug, warn};

use super::descriptor::{table_pointers, ColumnDescriptor, ColumnKind, TableDescriptor, TableFormat};
use super::{FieldValue, Table, TableRecord};
use crate::geometry::ByteOrder;
use crate::import::sample_codec::decode_u32;
use crate::ingest_errors::IngestError;
use crate::label::Label;

/// A table that could not be imported; the ingest goes on without it.
#[derive(Debug, PartialEq)]
pub struct TableDiagnostic {
    pub pointer: String,
    pub error: IngestError,
}

/// Result of importing every table of a label.
#[derive(Debug, Default)]
pub struct TableImport {
    pub tables: Vec<Table>,
    pub diagnostics: Vec<TableDiagnostic>,
}

/// Read the rows of a located table.
///
/// Arguments
/// -----------------
/// * `descriptor`: a descriptor returned by [`TableDescriptor::from_label`].
///
/// Return
/// ----------
/// * The table named [`TableDescriptor::table_name`], one record per row, or
///   [`IngestError::TruncatedTable`] when the file ends inside the table.
pub fn read_table(descriptor: &TableDescriptor) -> Result<Table, IngestError> {
    let mut file = File::open(&descriptor.file)?;
    file.seek(SeekFrom::Start(descriptor.offset))?;
    let total = descriptor.total_bytes();
    let mut bytes = Vec::with_capacity(total as usize);
    let read = file.by_ref().take(total).read_to_end(&mut bytes)? as u64;
    if read < total {
        return Err(IngestError::TruncatedTable {
            offset: descriptor.offset + read,
            expected_bytes: total - read,
        });
    }

    let mut table = Table::new(descriptor.table_name(), descriptor.fields());
    for row in bytes.chunks_exact(descriptor.stride()) {
        let row = &row[descriptor.row_prefix_bytes..descriptor.row_prefix_bytes + descriptor.row_bytes];
        let record = descriptor
            .columns
            .iter()
            .map(|c| decode_column(c, row, descriptor))
            .collect::<Result<TableRecord, _>>()?;
        table.push(record);
    }
    debug!("Read table {} ({} rows)", table.name, table.len());
    Ok(table)
}

/// Import every table a label points at.
///
/// A table that fails description, location or decoding is logged at `warn` and recorded as a
/// [`TableDiagnostic`]; the others are still imported.
pub fn import_tables(label: &Label, label_path: &Utf8Path) -> TableImport {
    let mut import = TableImport::default();
    for pointer in table_pointers(label) {
        match TableDescriptor::from_label(label, label_path, &pointer).and_then(|d| read_table(&d)) {
            Ok(table) => import.tables.push(table),
            Err(error) => {
                warn!("Skipping table {pointer}: {error}");
                import.diagnostics.push(TableDiagnostic { pointer, error });
            }
        }
    }
    import
}

fn decode_column(
    column: &ColumnDescriptor,
    row: &[u8],
    descriptor: &TableDescriptor,
) -> Result<FieldValue, IngestError> {
    let items = (0..column.items)
        .map(|i| {
            let start = column.start + i * column.item_offset;
            let raw = &row[start..start + column.item_bytes];
            match descriptor.format {
                TableFormat::Ascii => ascii_item(column, raw, descriptor),
                TableFormat::Binary => binary_item(column, raw, descriptor),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collapse(items))
}

fn collapse(mut items: Vec<FieldValue>) -> FieldValue {
    if items.len() == 1 {
        return items.remove(0);
    }
    match items.first() {
        Some(FieldValue::Integer(_)) => {
            FieldValue::Integers(items.iter().filter_map(FieldValue::as_i64).collect())
        }
        Some(FieldValue::Double(_)) => {
            FieldValue::Doubles(items.iter().filter_map(FieldValue::as_f64).collect())
        }
        _ => FieldValue::Texts(
            items
                .into_iter()
                .map(|v| match v {
                    FieldValue::Text(t) => t,
                    other => other.to_string(),
                })
                .collect(),
        ),
    }
}

fn ascii_item(
    column: &ColumnDescriptor,
    raw: &[u8],
    descriptor: &TableDescriptor,
) -> Result<FieldValue, IngestError> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim().trim_matches('"').trim();
    let bad = || IngestError::BadTable {
        name: descriptor.name.clone(),
        reason: format!("column {}: cannot read [{text}] as {}", column.name, column.data_type),
    };
    Ok(match column.kind {
        ColumnKind::SignedInteger | ColumnKind::UnsignedInteger => {
            FieldValue::Integer(text.parse().map_err(|_| bad())?)
        }
        ColumnKind::Real => FieldValue::Double(text.parse().map_err(|_| bad())?),
        ColumnKind::Character => FieldValue::Text(text.to_string()),
    })
}

fn binary_item(
    column: &ColumnDescriptor,
    raw: &[u8],
    descriptor: &TableDescriptor,
) -> Result<FieldValue, IngestError> {
    let order = column.byte_order;
    Ok(match (column.kind, raw.len()) {
        (ColumnKind::Character, _) => {
            FieldValue::Text(String::from_utf8_lossy(raw).trim_end_matches(['\0', ' ']).to_string())
        }
        (ColumnKind::UnsignedInteger, 1..=4) => FieldValue::Integer(i64::from(decode_u32(raw, order))),
        (ColumnKind::SignedInteger, 1..=4) => {
            let shift = 32 - 8 * raw.len() as u32;
            let value = ((decode_u32(raw, order) << shift) as i32) >> shift;
            FieldValue::Integer(i64::from(value))
        }
        (ColumnKind::SignedInteger | ColumnKind::UnsignedInteger, 8) => {
            let bytes = eight(raw);
            let value = match order {
                ByteOrder::Lsb => i64::from_le_bytes(bytes),
                ByteOrder::Msb => i64::from_be_bytes(bytes),
            };
            FieldValue::Integer(value)
        }
        (ColumnKind::Real, 4) => {
            let value = f32::from_bits(decode_u32(raw, order));
            FieldValue::Double(f64::from(value))
        }
        (ColumnKind::Real, 8) => {
            let bytes = eight(raw);
            let value = match order {
                ByteOrder::Lsb => f64::from_le_bytes(bytes),
                ByteOrder::Msb => f64::from_be_bytes(bytes),
            };
            FieldValue::Double(value)
        }
        (_, n) => {
            return Err(IngestError::BadTable {
                name: descriptor.name.clone(),
                reason: format!("column {}: {n}-byte {} values", column.name, column.data_type),
            })
        }
    })
}

fn eight(raw: &[u8]) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(raw);
    bytes
}

#[cfg(test)]
mod test_reader {
    use super::*;
    use crate::table::FieldType;
    use std::io::Write;

    fn binary_product(dir: &Utf8Path, rows: usize) -> camino::Utf8PathBuf {
        let label = "PDS_VERSION_ID = PDS3\n\
RECORD_BYTES = 12\n\
^SCLK_TABLE = (\"sclk.dat\", 1)\n\
OBJECT = SCLK_TABLE\n\
  INTERCHANGE_FORMAT = BINARY\n\
  ROWS = 2\n\
  ROW_BYTES = 12\n\
  OBJECT = COLUMN\n\
    NAME = SCLK_COUNT\n\
    DATA_TYPE = LSB_INTEGER\n\
    START_BYTE = 1\n\
    BYTES = 4\n\
  END_OBJECT = COLUMN\n\
  OBJECT = COLUMN\n\
    NAME = \"EPHEMERIS TIME\"\n\
    DATA_TYPE = IEEE_REAL\n\
    START_BYTE = 5\n\
    BYTES = 8\n\
  END_OBJECT = COLUMN\n\
END_OBJECT = SCLK_TABLE\n\
END\n";
        let label_path = dir.join("product.lbl");
        std::fs::write(&label_path, label).unwrap();
        let mut data = File::create(dir.join("sclk.dat")).unwrap();
        for i in 0..rows {
            data.write_all(&(-(i as i32) - 1).to_le_bytes()).unwrap();
            data.write_all(&(i as f64 + 0.5).to_be_bytes()).unwrap();
        }
        label_path
    }

    #[test]
    fn test_read_binary_table() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let label_path = binary_product(dir, 2);
        let label = Label::from_file(&label_path).unwrap();

        let import = import_tables(&label, &label_path);
        assert!(import.diagnostics.is_empty());
        let table = &import.tables[0];
        assert_eq!(table.name, "SclkTable");
        assert_eq!(table.fields[1].name, "EphemerisTime");
        assert_eq!(table.fields[1].kind, FieldType::Double);
        assert_eq!(table.records[0], vec![FieldValue::Integer(-1), FieldValue::Double(0.5)]);
        assert_eq!(table.records[1][1], FieldValue::Double(1.5));
    }

    #[test]
    fn test_short_table_is_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let label_path = binary_product(dir, 1);
        let label = Label::from_file(&label_path).unwrap();

        let import = import_tables(&label, &label_path);
        assert!(import.tables.is_empty());
        assert_eq!(import.diagnostics.len(), 1);
        assert_eq!(import.diagnostics[0].pointer, "^SCLK_TABLE");
        assert_eq!(import.diagnostics[0].error.kind(), "BadTable");
    }

    #[test]
    fn test_empty_rows_are_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let label_path = binary_product(dir, 2);
        let text = std::fs::read_to_string(&label_path)
            .unwrap()
            .replace("ROW_BYTES = 12", "ROW_BYTES = 0")
            .replace("BYTES = 4\n", "BYTES = 0\n");
        std::fs::write(&label_path, text).unwrap();
        let label = Label::from_file(&label_path).unwrap();

        let import = import_tables(&label, &label_path);
        assert!(import.tables.is_empty());
        assert_eq!(import.diagnostics.len(), 1);
        assert_eq!(import.diagnostics[0].error.kind(), "BadTable");
    }

    #[test]
    fn test_read_ascii_table() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let label = "PDS_VERSION_ID = PDS3\n\
^HK_TABLE = \"hk.tab\"\n\
OBJECT = HK_TABLE\n\
  INTERCHANGE_FORMAT = ASCII\n\
  ROWS = 2\n\
  ROW_BYTES = 21\n\
  OBJECT = COLUMN\n\
    NAME = LINE\n\
    DATA_TYPE = ASCII_INTEGER\n\
    START_BYTE = 1\n\
    BYTES = 4\n\
  END_OBJECT = COLUMN\n\
  OBJECT = COLUMN\n\
    NAME = TEMPS\n\
    DATA_TYPE = ASCII_REAL\n\
    START_BYTE = 6\n\
    BYTES = 11\n\
    ITEMS = 2\n\
    ITEM_BYTES = 5\n\
    ITEM_OFFSET = 6\n\
  END_OBJECT = COLUMN\n\
  OBJECT = COLUMN\n\
    NAME = MODE\n\
    DATA_TYPE = CHARACTER\n\
    START_BYTE = 17\n\
    BYTES = 2\n\
  END_OBJECT = COLUMN\n\
END_OBJECT = HK_TABLE\n\
END\n";
        let label_path = dir.join("hk.lbl");
        std::fs::write(&label_path, label).unwrap();
        std::fs::write(dir.join("hk.tab"), "   1  1.25  2.50 A \r\n   2 -3.00  4.75 B \r\n").unwrap();
        let label = Label::from_file(&label_path).unwrap();

        let table = read_table(&TableDescriptor::from_label(&label, &label_path, "^HK_TABLE").unwrap())
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[1][0], FieldValue::Integer(2));
        assert_eq!(table.records[1][1], FieldValue::Doubles(vec![-3.0, 4.75]));
        assert_eq!(table.records[0][2], FieldValue::Text("A".into()));
        assert_eq!(table.fields[2].kind, FieldType::Text(2));
    }
}
