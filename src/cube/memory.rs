//! In-memory cube.

use std::ops::Range;

use camino::{Utf8Path, Utf8PathBuf};

use super::{check_line, replace_group, set_naif_keyword, CubeSink, CUBE_OBJECT};
use crate::geometry::special_pixel::quantize;
use crate::geometry::CubePixelType;
use crate::ingest_errors::IngestError;
use crate::label::{ContainerKind, Label, PvlContainer};
use crate::table::Table;

/// A band-major cube of internal `f64` samples with its groups and tables.
///
/// Samples are kept unquantized; [`MemoryCube::stored`] gives the value a file of the cube's
/// pixel type would hold.
#[derive(Debug, Clone)]
pub struct MemoryCube {
    path: Utf8PathBuf,
    samples: usize,
    lines: usize,
    bands: usize,
    pixel_type: CubePixelType,
    data: Vec<f64>,
    cube: PvlContainer,
    tables: Vec<Table>,
    original_label: Option<Label>,
    closed: bool,
}

impl Default for MemoryCube {
    fn default() -> Self {
        MemoryCube {
            path: Utf8PathBuf::new(),
            samples: 0,
            lines: 0,
            bands: 0,
            pixel_type: CubePixelType::F32,
            data: Vec::new(),
            cube: PvlContainer::new_object(CUBE_OBJECT),
            tables: Vec::new(),
            original_label: None,
            closed: false,
        }
    }
}

impl MemoryCube {
    pub fn new() -> Self {
        Self::default()
    }

    /// A created cube with every sample NULL.
    pub fn with_size(samples: usize, lines: usize, bands: usize, pixel_type: CubePixelType) -> Self {
        let mut cube = MemoryCube::new();
        cube.allocate(samples, lines, bands, pixel_type);
        cube
    }

    fn allocate(&mut self, samples: usize, lines: usize, bands: usize, pixel_type: CubePixelType) {
        self.samples = samples;
        self.lines = lines;
        self.bands = bands;
        self.pixel_type = pixel_type;
        self.data = vec![crate::constants::NULL8; samples * lines * bands];
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
    pub fn samples(&self) -> usize {
        self.samples
    }
    pub fn lines(&self) -> usize {
        self.lines
    }
    pub fn bands(&self) -> usize {
        self.bands
    }
    pub fn pixel_type(&self) -> CubePixelType {
        self.pixel_type
    }

    pub fn set_pixel_type(&mut self, pixel_type: CubePixelType) {
        self.pixel_type = pixel_type;
    }

    fn index(&self, sample: usize, line: usize, band: usize) -> usize {
        (band * self.lines + line) * self.samples + sample
    }

    /// Internal value at 0-based `(sample, line, band)`.
    pub fn get(&self, sample: usize, line: usize, band: usize) -> f64 {
        self.data[self.index(sample, line, band)]
    }

    pub fn set(&mut self, sample: usize, line: usize, band: usize, value: f64) {
        let i = self.index(sample, line, band);
        self.data[i] = value;
    }

    /// Value of the sample once quantized to the cube pixel type.
    pub fn stored(&self, sample: usize, line: usize, band: usize) -> f64 {
        quantize(self.get(sample, line, band), self.pixel_type)
    }

    pub fn line(&self, line: usize, band: usize) -> &[f64] {
        let start = self.index(0, line, band);
        &self.data[start..start + self.samples]
    }

    pub fn line_mut(&mut self, line: usize, band: usize) -> &mut [f64] {
        let start = self.index(0, line, band);
        let samples = self.samples;
        &mut self.data[start..start + samples]
    }

    pub fn band(&self, band: usize) -> &[f64] {
        let size = self.samples * self.lines;
        &self.data[band * size..(band + 1) * size]
    }

    /// The `IsisCube` object: every group put so far.
    pub fn cube_object(&self) -> &PvlContainer {
        &self.cube
    }

    pub fn group(&self, name: &str) -> Option<&PvlContainer> {
        self.cube.find_group(name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut PvlContainer> {
        self.cube.find_group_mut(name)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn original_label(&self) -> Option<&Label> {
        self.original_label.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Copy `bands` of this cube, its tables, groups and original label into `sink`.
    ///
    /// The sink is created at `path` with this cube's pixel type; it is not closed.
    pub fn write_to<S: CubeSink + ?Sized>(
        &self,
        sink: &mut S,
        path: &Utf8Path,
        bands: Range<usize>,
    ) -> Result<(), IngestError> {
        if bands.is_empty() || bands.end > self.bands {
            return Err(IngestError::InvalidGeometry(format!(
                "band range {}..{} outside a cube of {} bands",
                bands.start, bands.end, self.bands
            )));
        }
        sink.create(path, self.samples, self.lines, bands.len(), self.pixel_type)?;
        for (out_band, band) in bands.enumerate() {
            for line in 0..self.lines {
                sink.write_line(self.line(line, band), line, out_band)?;
            }
        }
        for table in &self.tables {
            sink.write_table(table.clone())?;
        }
        for group in self.cube.groups() {
            sink.put_group(group.clone())?;
        }
        if let Some(label) = &self.original_label {
            sink.write_original_label(label)?;
        }
        Ok(())
    }
}

impl CubeSink for MemoryCube {
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
        self.path = path.to_path_buf();
        self.allocate(samples, lines, bands, pixel_type);
        self.cube = PvlContainer::new(ContainerKind::Object, CUBE_OBJECT);
        self.tables.clear();
        self.original_label = None;
        self.closed = false;
        Ok(())
    }

    fn write_line(&mut self, buffer: &[f64], line: usize, band: usize) -> Result<(), IngestError> {
        check_line(self.samples, self.lines, self.bands, buffer, line, band)?;
        self.line_mut(line, band).copy_from_slice(buffer);
        Ok(())
    }

    fn write_table(&mut self, table: Table) -> Result<(), IngestError> {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(slot) => *slot = table,
            None => self.tables.push(table),
        }
        Ok(())
    }

    fn put_group(&mut self, group: PvlContainer) -> Result<(), IngestError> {
        replace_group(&mut self.cube, group);
        Ok(())
    }

    fn put_naif_keyword(&mut self, name: &str, values: &[String]) -> Result<(), IngestError> {
        set_naif_keyword(&mut self.cube, name, values);
        Ok(())
    }

    fn write_original_label(&mut self, label: &Label) -> Result<(), IngestError> {
        self.original_label = Some(label.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), IngestError> {
        self.closed = true;
        Ok(())
    }
}
