//! # Cube sinks
//!
//! Ingest writes through the [`CubeSink`] trait: pixel lines, tables, label groups, NAIF keywords
//! and the original label. The cube format itself is opaque to the rest of the crate.
//!
//! ## Overview
//!
//! - [`MemoryCube`]: an in-memory band-major cube, also used as the intermediate of drivers that
//!   reshape the image after import.
//! - [`FileCube`]: a single file holding a PVL label, a BSQ raster, the tables and the original
//!   label. It is written next to its destination and persisted atomically by [`CubeSink::close`].
//! - [`cache`]: an LRU of open cubes bounded by the open-file limit.
//!
//! ## Ordering
//!
//! A sink receives lines first, then tables, then groups. [`FileCube`] accepts lines in any order.
//!
//! ## Cube label
//!
//! ```text
//! Object = IsisCube
//!   Object = Core
//!     StartByte = ...
//!     Format    = BandSequential
//!     Group = Dimensions ... End_Group
//!     Group = Pixels     ... End_Group
//!   End_Object
//!   Group = Instrument ... End_Group
//!   Group = Kernels    ... End_Group
//! End_Object
//! Object = Table ... End_Object
//! Object = OriginalLabel ... End_Object
//! End
//! ```

pub mod cache;
pub mod file;
pub mod memory;

use camino::Utf8Path;

use crate::geometry::CubePixelType;
use crate::ingest_errors::IngestError;
use crate::label::{ContainerKind, Keyword, Label, PvlContainer};
use crate::table::Table;

pub use cache::{CubeCache, CubeOpener, LabelOpener};
pub use file::{CubeInfo, FileCube};
pub use memory::MemoryCube;

/// Name of the cube object in a cube label.
pub const CUBE_OBJECT: &str = "IsisCube";

/// Destination of an ingest.
pub trait CubeSink {
    /// Start a cube of the given size; must be called before any other method.
    fn create(
        &mut self,
        path: &Utf8Path,
        samples: usize,
        lines: usize,
        bands: usize,
        pixel_type: CubePixelType,
    ) -> Result<(), IngestError>;

    /// Store one line of internal samples at 0-based `(line, band)`.
    fn write_line(&mut self, buffer: &[f64], line: usize, band: usize) -> Result<(), IngestError>;

    fn write_table(&mut self, table: Table) -> Result<(), IngestError>;

    /// Insert `group` in the cube object, replacing a group of the same name.
    fn put_group(&mut self, group: PvlContainer) -> Result<(), IngestError>;

    /// Set a keyword of the `Kernels` group.
    fn put_naif_keyword(&mut self, name: &str, values: &[String]) -> Result<(), IngestError>;

    fn write_original_label(&mut self, label: &Label) -> Result<(), IngestError>;

    fn close(&mut self) -> Result<(), IngestError>;
}

/// `Kernels` keyword `name` holding `values`, as a sequence when there are several.
pub(crate) fn naif_keyword(name: &str, values: &[String]) -> Keyword {
    match values {
        [single] => Keyword::new(name, single.as_str()),
        _ => Keyword::sequence(name, values.iter().map(String::as_str)),
    }
}

/// Apply [`CubeSink::put_group`] semantics to a cube object.
pub(crate) fn replace_group(cube: &mut PvlContainer, group: PvlContainer) {
    cube.put_container(group);
}

/// Apply [`CubeSink::put_naif_keyword`] semantics to a cube object.
pub(crate) fn set_naif_keyword(cube: &mut PvlContainer, name: &str, values: &[String]) {
    cube.path_or_create(&[(ContainerKind::Group, "Kernels")])
        .set_keyword(naif_keyword(name, values));
}

pub(crate) fn check_line(
    samples: usize,
    lines: usize,
    bands: usize,
    buffer: &[f64],
    line: usize,
    band: usize,
) -> Result<(), IngestError> {
    if buffer.len() != samples || line >= lines || band >= bands {
        return Err(IngestError::InvalidGeometry(format!(
            "line {line} of band {band} with {} samples does not fit a {samples}x{lines}x{bands} cube",
            buffer.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test_cube {
    use super::*;

    #[test]
    fn test_naif_keyword_forms() {
        let single = naif_keyword("NaifFrameCode", &["-74021".to_string()]);
        assert_eq!(single.as_str().unwrap(), "-74021");
        let many = naif_keyword("NaifIkCode", &["-1".to_string(), "-2".to_string()]);
        assert_eq!(many.len(), 2);
    }

    #[test]
    fn test_check_line() {
        assert!(check_line(3, 2, 1, &[0.0; 3], 1, 0).is_ok());
        assert!(check_line(3, 2, 1, &[0.0; 2], 1, 0).is_err());
        assert!(check_line(3, 2, 1, &[0.0; 3], 2, 0).is_err());
    }
}
