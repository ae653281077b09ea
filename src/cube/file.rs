//! Single-file cube: attached PVL label, BSQ raster, tables and original label.
//!
//! Lines are staged in an anonymous temporary raster, so they may arrive in any order. The cube
//! is assembled into a named temporary file in the destination directory and renamed over the
//! destination by [`CubeSink::close`]. A `FileCube` dropped before `close` leaves nothing behind.
//! No timestamp or host data is written: identical inputs give byte-identical cubes.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use tempfile::NamedTempFile;

use super::{check_line, replace_group, set_naif_keyword, CubeSink, CUBE_OBJECT};
use crate::constants::NULL8;
use crate::geometry::special_pixel::quantize;
use crate::geometry::CubePixelType;
use crate::ingest_errors::IngestError;
use crate::label::{ContainerKind, Keyword, Label, PvlContainer, PvlEntry};
use crate::table::{FieldType, FieldValue, Table};

/// Label space is rounded up to this many bytes.
const LABEL_ALIGNMENT: usize = 1024;

/// A cube written to disk on [`CubeSink::close`].
#[derive(Debug, Default)]
pub struct FileCube {
    state: Option<OpenCube>,
}

#[derive(Debug)]
struct OpenCube {
    path: Utf8PathBuf,
    samples: usize,
    lines: usize,
    bands: usize,
    pixel_type: CubePixelType,
    raster: File,
    written: Vec<bool>,
    cube: PvlContainer,
    tables: Vec<Table>,
    original_label: Option<String>,
}

impl FileCube {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&mut self) -> Result<&mut OpenCube, IngestError> {
        self.state
            .as_mut()
            .ok_or_else(|| IngestError::InvalidGeometry("cube used before create".into()))
    }
}

impl OpenCube {
    fn line_bytes(&self) -> usize {
        self.samples * self.pixel_type.bytes()
    }

    fn assemble(&mut self) -> Result<(), IngestError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_str().is_empty() => p.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        let raster_bytes = (self.line_bytes() * self.lines * self.bands) as u64;
        let table_blobs: Vec<Vec<u8>> = self.tables.iter().map(encode_table).collect();

        let mut label_bytes = LABEL_ALIGNMENT;
        let text = loop {
            let text = self.render_label(label_bytes as u64, raster_bytes, &table_blobs);
            let needed = (text.len() + 1).div_ceil(LABEL_ALIGNMENT) * LABEL_ALIGNMENT;
            if needed <= label_bytes {
                break text;
            }
            label_bytes = needed;
        };

        let output = NamedTempFile::new_in(&dir)?;
        let mut out = BufWriter::new(output.as_file());
        out.write_all(text.as_bytes())?;
        out.write_all(&vec![0u8; label_bytes - text.len()])?;

        let null_line = encode_line(&vec![NULL8; self.samples], self.pixel_type);
        let mut buffer = vec![0u8; self.line_bytes()];
        self.raster.seek(SeekFrom::Start(0))?;
        for index in 0..self.bands * self.lines {
            self.raster.read_exact(&mut buffer)?;
            if self.written[index] {
                out.write_all(&buffer)?;
            } else {
                out.write_all(&null_line)?;
            }
        }
        for blob in &table_blobs {
            out.write_all(blob)?;
        }
        if let Some(original) = &self.original_label {
            out.write_all(original.as_bytes())?;
        }
        out.flush()?;
        drop(out);

        output.persist(&self.path).map_err(|e| IngestError::IoError(e.error))?;
        info!("Wrote {} ({}x{}x{})", self.path, self.samples, self.lines, self.bands);
        Ok(())
    }

    /// Cube label for the given layout; byte positions are 1-based.
    fn render_label(&self, label_bytes: u64, raster_bytes: u64, table_blobs: &[Vec<u8>]) -> String {
        let mut label = Label::default();

        let mut cube = self.cube.clone();
        let mut core = PvlContainer::new_object("Core");
        core.add_keyword(Keyword::new("StartByte", (label_bytes + 1).to_string()));
        core.add_keyword(Keyword::new("Format", "BandSequential"));
        let mut dims = PvlContainer::new_group("Dimensions");
        dims.add_keyword(Keyword::new("Samples", self.samples.to_string()));
        dims.add_keyword(Keyword::new("Lines", self.lines.to_string()));
        dims.add_keyword(Keyword::new("Bands", self.bands.to_string()));
        core.add_container(dims);
        let mut pixels = PvlContainer::new_group("Pixels");
        pixels.add_keyword(Keyword::new("Type", self.pixel_type.label_name()));
        pixels.add_keyword(Keyword::new("ByteOrder", "Lsb"));
        pixels.add_keyword(Keyword::new("Base", "0.0"));
        pixels.add_keyword(Keyword::new("Multiplier", "1.0"));
        core.add_container(pixels);
        cube.entries.insert(0, PvlEntry::Container(core));
        label.add_container(cube);

        let mut position = label_bytes + raster_bytes + 1;
        for (table, blob) in self.tables.iter().zip(table_blobs) {
            let mut object = table.label_object();
            object.set_keyword(Keyword::new("StartByte", position.to_string()));
            object.set_keyword(Keyword::new("Bytes", blob.len().to_string()));
            label.add_container(object);
            position += blob.len() as u64;
        }
        if let Some(original) = &self.original_label {
            let mut object = PvlContainer::new_object("OriginalLabel");
            object.add_keyword(Keyword::new("Name", CUBE_OBJECT));
            object.add_keyword(Keyword::new("StartByte", position.to_string()));
            object.add_keyword(Keyword::new("Bytes", original.len().to_string()));
            label.add_container(object);
        }
        label.to_string()
    }
}

impl CubeSink for FileCube {
    fn create(
        &mut self,
        path: &Utf8Path,
        samples: usize,
        lines: usize,
        bands: usize,
        pixel_type: CubePixelType,
    ) -> Result<(), IngestError> {
        if samples == 0 || lines == 0 || bands == 0 {
            return Err(IngestError::InvalidGeometry(format!(
                "cannot create a {samples}x{lines}x{bands} cube"
            )));
        }
        let dir = match path.parent() {
            Some(p) if !p.as_str().is_empty() => p,
            _ => Utf8Path::new("."),
        };
        let raster = tempfile::tempfile_in(dir)?;
        raster.set_len((samples * pixel_type.bytes() * lines * bands) as u64)?;
        debug!("Creating {path}: {samples}x{lines}x{bands} {}", pixel_type.label_name());
        self.state = Some(OpenCube {
            path: path.to_path_buf(),
            samples,
            lines,
            bands,
            pixel_type,
            raster,
            written: vec![false; lines * bands],
            cube: PvlContainer::new(ContainerKind::Object, CUBE_OBJECT),
            tables: Vec::new(),
            original_label: None,
        });
        Ok(())
    }

    fn write_line(&mut self, buffer: &[f64], line: usize, band: usize) -> Result<(), IngestError> {
        let cube = self.open()?;
        check_line(cube.samples, cube.lines, cube.bands, buffer, line, band)?;
        let index = band * cube.lines + line;
        let bytes = encode_line(buffer, cube.pixel_type);
        cube.raster
            .seek(SeekFrom::Start((index * cube.line_bytes()) as u64))?;
        cube.raster.write_all(&bytes)?;
        cube.written[index] = true;
        Ok(())
    }

    fn write_table(&mut self, table: Table) -> Result<(), IngestError> {
        let cube = self.open()?;
        match cube.tables.iter_mut().find(|t| t.name == table.name) {
            Some(slot) => *slot = table,
            None => cube.tables.push(table),
        }
        Ok(())
    }

    fn put_group(&mut self, group: PvlContainer) -> Result<(), IngestError> {
        replace_group(&mut self.open()?.cube, group);
        Ok(())
    }

    fn put_naif_keyword(&mut self, name: &str, values: &[String]) -> Result<(), IngestError> {
        set_naif_keyword(&mut self.open()?.cube, name, values);
        Ok(())
    }

    fn write_original_label(&mut self, label: &Label) -> Result<(), IngestError> {
        self.open()?.original_label = Some(label.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<(), IngestError> {
        match self.state.take() {
            Some(mut cube) => cube.assemble(),
            None => Ok(()),
        }
    }
}

/// Quantize and encode samples little-endian in the cube pixel type.
pub fn encode_line(buffer: &[f64], pixel_type: CubePixelType) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(buffer.len() * pixel_type.bytes());
    for &v in buffer {
        let q = quantize(v, pixel_type);
        match pixel_type {
            CubePixelType::U8 => bytes.push(q as u8),
            CubePixelType::S16 => bytes.extend_from_slice(&(q as i16).to_le_bytes()),
            CubePixelType::U16 => bytes.extend_from_slice(&(q as u16).to_le_bytes()),
            CubePixelType::S32 => bytes.extend_from_slice(&(q as i32).to_le_bytes()),
            CubePixelType::U32 => bytes.extend_from_slice(&(q as u32).to_le_bytes()),
            CubePixelType::F32 => bytes.extend_from_slice(&(q as f32).to_le_bytes()),
            CubePixelType::F64 => bytes.extend_from_slice(&q.to_le_bytes()),
        }
    }
    bytes
}

/// Decode little-endian stored samples back into the internal domain.
pub fn decode_line(bytes: &[u8], pixel_type: CubePixelType) -> Vec<f64> {
    bytes
        .chunks_exact(pixel_type.bytes())
        .map(|c| {
            let stored = match pixel_type {
                CubePixelType::U8 => f64::from(c[0]),
                CubePixelType::S16 => f64::from(i16::from_le_bytes([c[0], c[1]])),
                CubePixelType::U16 => f64::from(u16::from_le_bytes([c[0], c[1]])),
                CubePixelType::S32 => f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                CubePixelType::U32 => f64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                CubePixelType::F32 => f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                CubePixelType::F64 => {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    f64::from_le_bytes(b)
                }
            };
            pixel_type.unquantize(stored)
        })
        .collect()
}

/// Binary records of a table: integers as `i32`, doubles as `f64`, text zero-padded.
fn encode_table(table: &Table) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(table.len() * table.record_bytes());
    for record in &table.records {
        for (field, value) in table.fields.iter().zip(record) {
            let start = bytes.len();
            match (field.kind, value) {
                (FieldType::Integer, FieldValue::Integer(v)) => {
                    bytes.extend_from_slice(&(*v as i32).to_le_bytes())
                }
                (FieldType::Integer, FieldValue::Integers(vs)) => {
                    for v in vs {
                        bytes.extend_from_slice(&(*v as i32).to_le_bytes());
                    }
                }
                (FieldType::Double, FieldValue::Double(v)) => bytes.extend_from_slice(&v.to_le_bytes()),
                (FieldType::Double, FieldValue::Integer(v)) => {
                    bytes.extend_from_slice(&(*v as f64).to_le_bytes())
                }
                (FieldType::Double, FieldValue::Doubles(vs)) => {
                    for v in vs {
                        bytes.extend_from_slice(&v.to_le_bytes());
                    }
                }
                (FieldType::Text(width), FieldValue::Text(t)) => push_text(&mut bytes, t, width),
                (FieldType::Text(width), FieldValue::Texts(ts)) => {
                    for t in ts {
                        push_text(&mut bytes, t, width);
                    }
                }
                (FieldType::Text(width), other) => push_text(&mut bytes, &other.to_string(), width),
                _ => {}
            }
            // Pad values that do not match the schema so records keep their size.
            bytes.resize(start + field.record_bytes(), 0);
        }
    }
    bytes
}

fn push_text(bytes: &mut Vec<u8>, text: &str, width: usize) {
    let raw = text.as_bytes();
    let n = raw.len().min(width);
    bytes.extend_from_slice(&raw[..n]);
    bytes.resize(bytes.len() + width - n, 0);
}

/// Label and layout of a cube file, read without loading the raster.
#[derive(Debug, Clone)]
pub struct CubeInfo {
    pub path: Utf8PathBuf,
    pub label: Label,
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub pixel_type: CubePixelType,
    start_byte: u64,
}

impl CubeInfo {
    pub fn open(path: &Utf8Path) -> Result<Self, IngestError> {
        let label = Label::from_file(path)?;
        let core = label
            .path(&[CUBE_OBJECT, "Core"])
            .ok_or_else(|| IngestError::wrong_product("a cube", format!("{path} without Core")))?;
        let dims = core
            .find_group("Dimensions")
            .ok_or_else(|| IngestError::missing("Dimensions"))?;
        let pixels = core
            .find_group("Pixels")
            .ok_or_else(|| IngestError::missing("Pixels"))?;
        let type_name = pixels.require("Type")?.as_str()?;
        let pixel_type = CubePixelType::from_label_name(type_name)
            .ok_or_else(|| IngestError::unsupported(format!("cube pixel type {type_name}")))?;
        Ok(CubeInfo {
            path: path.to_path_buf(),
            samples: dims.require("Samples")?.as_usize()?,
            lines: dims.require("Lines")?.as_usize()?,
            bands: dims.require("Bands")?.as_usize()?,
            pixel_type,
            start_byte: core.require("StartByte")?.as_usize()? as u64,
            label,
        })
    }

    /// Group `name` of the cube object.
    pub fn group(&self, name: &str) -> Option<&PvlContainer> {
        self.label.path(&[CUBE_OBJECT])?.find_group(name)
    }

    /// Internal samples of 0-based `(line, band)`.
    pub fn read_line(&self, line: usize, band: usize) -> Result<Vec<f64>, IngestError> {
        let line_bytes = self.samples * self.pixel_type.bytes();
        let offset = self.start_byte - 1 + ((band * self.lines + line) * line_bytes) as u64;
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; line_bytes];
        file.read_exact(&mut bytes)?;
        Ok(decode_line(&bytes, self.pixel_type))
    }
}

#[cfg(test)]
mod test_file_cube {
    use super::*;
    use crate::constants::{HIS8, NULL8};
    use crate::table::Field;

    fn write_cube(dir: &Utf8Path, name: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        let mut cube = FileCube::new();
        cube.create(&path, 3, 2, 1, CubePixelType::S16).unwrap();
        cube.write_line(&[1.0, HIS8, 3.4], 1, 0).unwrap();
        let mut table = Table::new("CtxPrefixDark", vec![Field::array("Dark", FieldType::Integer, 2)]);
        table.push(vec![FieldValue::Integers(vec![5, 6])]);
        cube.write_table(table).unwrap();
        let mut group = PvlContainer::new_group("Instrument");
        group.add_keyword(Keyword::new("InstrumentId", "CTX"));
        cube.put_group(group).unwrap();
        cube.put_naif_keyword("NaifFrameCode", &["-74021".into()]).unwrap();
        cube.write_original_label(&"PDS_VERSION_ID = PDS3\nEND\n".parse().unwrap())
            .unwrap();
        cube.close().unwrap();
        path
    }

    #[test]
    fn test_roundtrip_through_cube_info() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let path = write_cube(dir, "a.cub");

        let info = CubeInfo::open(&path).unwrap();
        assert_eq!((info.samples, info.lines, info.bands), (3, 2, 1));
        assert_eq!(info.pixel_type, CubePixelType::S16);
        let first = info.read_line(0, 0).unwrap();
        assert!(first.iter().all(|v| v.to_bits() == NULL8.to_bits()));
        let second = info.read_line(1, 0).unwrap();
        assert_eq!(second[0], 1.0);
        assert_eq!(second[1].to_bits(), HIS8.to_bits());
        assert_eq!(second[2], 3.0);
        assert_eq!(
            info.group("Kernels").unwrap().keyword("NaifFrameCode").unwrap().as_i64().unwrap(),
            -74021
        );
        assert!(info.label.find_object("OriginalLabel").is_some());
        assert_eq!(
            info.label.find_object("Table").unwrap().keyword("Bytes").unwrap().as_i64().unwrap(),
            8
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let a = std::fs::read(write_cube(dir, "a.cub")).unwrap();
        let b = std::fs::read(write_cube(dir, "b.cub")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dropped_cube_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        {
            let mut cube = FileCube::new();
            cube.create(&dir.join("never.cub"), 2, 2, 1, CubePixelType::U8).unwrap();
            cube.write_line(&[1.0, 2.0], 0, 0).unwrap();
        }
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
    }
}
