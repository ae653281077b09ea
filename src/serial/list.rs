//! Serial number ↔ cube file registry.

use std::fs;

use ahash::AHashMap;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use super::{SerialNumberGenerator, UNKNOWN};
use crate::cube::CubeInfo;
use crate::ingest_errors::IngestError;
use crate::label::PvlContainer;

/// One registered cube.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialEntry {
    pub serial: String,
    pub observation: String,
    pub path: Utf8PathBuf,
}

/// Cubes keyed by serial number, in insertion order.
#[derive(Debug, Clone)]
pub struct SerialNumberList {
    generator: SerialNumberGenerator,
    entries: Vec<SerialEntry>,
    by_serial: AHashMap<String, usize>,
}

impl SerialNumberList {
    pub fn new(generator: SerialNumberGenerator) -> Self {
        SerialNumberList {
            generator,
            entries: Vec::new(),
            by_serial: AHashMap::new(),
        }
    }

    /// Register every cube named in the list file `list`, one path per line.
    ///
    /// Blank lines and lines starting with `#` are skipped; relative paths are taken as given.
    pub fn from_list_file(
        generator: SerialNumberGenerator,
        list: &Utf8Path,
    ) -> Result<Self, IngestError> {
        let mut serials = Self::new(generator);
        for line in fs::read_to_string(list)?.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            serials.add(Utf8Path::new(line))?;
        }
        Ok(serials)
    }

    /// Register the cube at `path`.
    pub fn add(&mut self, path: &Utf8Path) -> Result<&SerialEntry, IngestError> {
        let info = CubeInfo::open(path)?;
        self.add_label(path, &info.label)
    }

    /// Register a cube from its already parsed label.
    ///
    /// Return
    /// ----------
    /// * The new entry, `NoSerialMapping` when no serial number can be composed, `InvalidValue`
    ///   when the serial number is already registered.
    pub fn add_label(
        &mut self,
        path: &Utf8Path,
        label: &PvlContainer,
    ) -> Result<&SerialEntry, IngestError> {
        let serial = self.generator.serial_number(label)?;
        if serial == UNKNOWN {
            return Err(IngestError::NoSerialMapping {
                mission: path.to_string(),
            });
        }
        if let Some(&index) = self.by_serial.get(&serial) {
            return Err(IngestError::InvalidValue {
                keyword: "SerialNumber".into(),
                value: serial,
                reason: format!(
                    "[{path}] duplicates the serial number of [{}]",
                    self.entries[index].path
                ),
            });
        }
        let observation = self.generator.observation_number(label)?;
        debug!("{path} -> {serial}");
        self.by_serial.insert(serial.clone(), self.entries.len());
        self.entries.push(SerialEntry {
            serial,
            observation,
            path: path.to_path_buf(),
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_serial_number(&self, serial: &str) -> bool {
        self.by_serial.contains_key(serial)
    }

    pub fn get(&self, serial: &str) -> Option<&SerialEntry> {
        self.by_serial.get(serial).map(|&i| &self.entries[i])
    }

    /// Path of the cube with serial number `serial`.
    pub fn file_name(&self, serial: &str) -> Option<&Utf8Path> {
        self.get(serial).map(|e| e.path.as_path())
    }

    /// Serial number registered for `path`.
    pub fn serial_number(&self, path: &Utf8Path) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.serial.as_str())
    }

    /// Serial numbers sharing the observation number `observation`.
    pub fn observation_serials<'a>(&'a self, observation: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |e| e.observation == observation)
            .map(|e| e.serial.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SerialEntry> {
        self.entries.iter()
    }
}
