//! Output cubes of an ingest.
//!
//! Most drivers write one cube. MARCI writes the even and odd framelets to two cubes, VIMS writes
//! its visible and infrared channels separately. Secondary outputs sit next to the primary one,
//! named `{stem}.{role}.cub`.

use camino::{Utf8Path, Utf8PathBuf};
use log::info;

use crate::cube::{CubeSink, FileCube, MemoryCube};
use crate::geometry::CubePixelType;
use crate::ingest_errors::IngestError;

/// Which of the outputs of an ingest a cube is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputRole {
    Primary,
    Even,
    Odd,
    Vis,
    Ir,
}

impl OutputRole {
    /// File name infix of a secondary output.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            OutputRole::Primary => None,
            OutputRole::Even => Some("even"),
            OutputRole::Odd => Some("odd"),
            OutputRole::Vis => Some("vis"),
            OutputRole::Ir => Some("ir"),
        }
    }
}

/// Path of the output `role` of an ingest whose primary output is `primary`.
pub fn role_path(primary: &Utf8Path, role: OutputRole) -> Utf8PathBuf {
    match role.suffix() {
        None => primary.to_path_buf(),
        Some(suffix) => {
            let stem = primary.file_stem().unwrap_or("out");
            primary.with_file_name(format!("{stem}.{suffix}.cub"))
        }
    }
}

/// The cubes an ingest writes to.
pub trait OutputSet {
    fn path(&self, role: OutputRole) -> Utf8PathBuf;

    /// Sink of `role`, made on first use.
    fn sink(&mut self, role: OutputRole) -> Result<&mut dyn CubeSink, IngestError>;

    /// Roles used so far, in order of first use.
    fn roles(&self) -> Vec<OutputRole>;

    /// Create the cube of `role` and return its sink.
    fn create(
        &mut self,
        role: OutputRole,
        samples: usize,
        lines: usize,
        bands: usize,
        pixel_type: CubePixelType,
    ) -> Result<&mut dyn CubeSink, IngestError> {
        let path = self.path(role);
        let sink = self.sink(role)?;
        sink.create(&path, samples, lines, bands, pixel_type)?;
        Ok(sink)
    }

    /// Close every sink; returns the paths written.
    fn close_all(&mut self) -> Result<Vec<Utf8PathBuf>, IngestError>;
}

fn slot<T: Default>(cubes: &mut Vec<(OutputRole, T)>, role: OutputRole) -> &mut T {
    let index = match cubes.iter().position(|(r, _)| *r == role) {
        Some(i) => i,
        None => {
            cubes.push((role, T::default()));
            cubes.len() - 1
        }
    };
    &mut cubes[index].1
}

/// Cube files on disk. Nothing is persisted until [`OutputSet::close_all`].
#[derive(Debug)]
pub struct FileOutputs {
    primary: Utf8PathBuf,
    cubes: Vec<(OutputRole, FileCube)>,
}

impl FileOutputs {
    pub fn new(primary: impl Into<Utf8PathBuf>) -> Self {
        FileOutputs {
            primary: primary.into(),
            cubes: Vec::new(),
        }
    }
}

impl OutputSet for FileOutputs {
    fn path(&self, role: OutputRole) -> Utf8PathBuf {
        role_path(&self.primary, role)
    }

    fn sink(&mut self, role: OutputRole) -> Result<&mut dyn CubeSink, IngestError> {
        let cube: &mut FileCube = slot(&mut self.cubes, role);
        Ok(cube)
    }

    fn roles(&self) -> Vec<OutputRole> {
        self.cubes.iter().map(|(r, _)| *r).collect()
    }

    fn close_all(&mut self) -> Result<Vec<Utf8PathBuf>, IngestError> {
        let mut written = Vec::with_capacity(self.cubes.len());
        for (role, cube) in self.cubes.iter_mut() {
            cube.close()?;
            let path = role_path(&self.primary, *role);
            info!("Wrote {path}");
            written.push(path);
        }
        Ok(written)
    }
}

/// In-memory cubes, for tests and for callers that post-process the result.
#[derive(Debug, Default)]
pub struct MemoryOutputs {
    primary: Utf8PathBuf,
    cubes: Vec<(OutputRole, MemoryCube)>,
}

impl MemoryOutputs {
    pub fn new(primary: impl Into<Utf8PathBuf>) -> Self {
        MemoryOutputs {
            primary: primary.into(),
            cubes: Vec::new(),
        }
    }

    pub fn get(&self, role: OutputRole) -> Option<&MemoryCube> {
        self.cubes.iter().find(|(r, _)| *r == role).map(|(_, c)| c)
    }

    pub fn primary(&self) -> Option<&MemoryCube> {
        self.get(OutputRole::Primary)
    }
}

impl OutputSet for MemoryOutputs {
    fn path(&self, role: OutputRole) -> Utf8PathBuf {
        role_path(&self.primary, role)
    }

    fn sink(&mut self, role: OutputRole) -> Result<&mut dyn CubeSink, IngestError> {
        let cube: &mut MemoryCube = slot(&mut self.cubes, role);
        Ok(cube)
    }

    fn roles(&self) -> Vec<OutputRole> {
        self.cubes.iter().map(|(r, _)| *r).collect()
    }

    fn close_all(&mut self) -> Result<Vec<Utf8PathBuf>, IngestError> {
        for (_, cube) in self.cubes.iter_mut() {
            cube.close()?;
        }
        Ok(self.roles().into_iter().map(|r| self.path(r)).collect())
    }
}
