#![allow(dead_code)]

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use pds2cube::config::IngestConfig;
use pds2cube::cube::MemoryCube;
use pds2cube::decompress::Decompressor;
use pds2cube::drivers::MemoryOutputs;
use pds2cube::ingest::{Ingest, IngestReport};
use pds2cube::ingest_errors::IngestError;
use pds2cube::label::PvlContainer;
use pds2cube::spice::SpiceClock;

/// Size of the padded label of the synthetic products; pixels start right after it.
pub const LABEL_BYTES: usize = 2048;

pub fn temp_dir() -> (TempDir, Utf8PathBuf) {
    let guard = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(guard.path().to_path_buf()).unwrap();
    (guard, path)
}

/// `^NAME` pointer line of an attached product built by [`attached_product`].
pub fn pointer(object: &str) -> String {
    format!("^{object} = {} <BYTES>", LABEL_BYTES + 1)
}

/// Label text padded with blanks to [`LABEL_BYTES`], followed by `data`.
pub fn attached_bytes(label: &str, data: &[u8]) -> Vec<u8> {
    assert!(label.len() < LABEL_BYTES, "label of {} bytes does not fit", label.len());
    let mut bytes = label.as_bytes().to_vec();
    bytes.resize(LABEL_BYTES, b' ');
    bytes.extend_from_slice(data);
    bytes
}

pub fn attached_product(dir: &Utf8Path, name: &str, label: &str, data: &[u8]) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, attached_bytes(label, data)).unwrap();
    path
}

/// Ingest `from` into memory.
pub fn ingest_memory(ingest: &Ingest, from: &Utf8Path) -> (IngestReport, MemoryOutputs) {
    let mut outputs = MemoryOutputs::new(from.with_extension("cub"));
    let report = ingest.run_into(from, &mut outputs).unwrap();
    (report, outputs)
}

pub fn default_ingest() -> Ingest {
    Ingest::new(IngestConfig::default())
}

pub fn group<'a>(cube: &'a MemoryCube, name: &str) -> &'a PvlContainer {
    cube.group(name)
        .unwrap_or_else(|| panic!("cube has no {name} group"))
}

pub fn text<'a>(cube: &'a MemoryCube, group_name: &str, keyword: &str) -> &'a str {
    group(cube, group_name)
        .keyword(keyword)
        .unwrap_or_else(|| panic!("{group_name} has no {keyword}"))
        .as_str()
        .unwrap()
}

pub fn number(cube: &MemoryCube, group_name: &str, keyword: &str) -> f64 {
    group(cube, group_name)
        .keyword(keyword)
        .unwrap_or_else(|| panic!("{group_name} has no {keyword}"))
        .as_f64()
        .unwrap()
}

/// SPICE double: clock strings are `{partition}/{et}` and only the listed clock strings convert
/// back to ephemeris time.
#[derive(Debug, Clone, Default)]
pub struct FakeSpice {
    pub partition: u32,
    pub known: HashMap<String, f64>,
}

impl FakeSpice {
    pub fn new(partition: u32) -> Self {
        FakeSpice {
            partition,
            known: HashMap::new(),
        }
    }

    pub fn with_clock(mut self, sclk: &str, et: f64) -> Self {
        self.known.insert(sclk.to_string(), et);
        self
    }
}

impl SpiceClock for FakeSpice {
    fn et_to_sclk(&self, _clock_id: i32, et: f64) -> Result<String, IngestError> {
        Ok(format!("{}/{}", self.partition, et.round() as i64))
    }

    fn sclk_to_et(&self, clock_id: i32, sclk: &str) -> Result<f64, IngestError> {
        self.known.get(sclk).copied().ok_or_else(|| {
            IngestError::Collaborator(format!("clock {clock_id} has no time for [{sclk}]"))
        })
    }
}

/// Decompressor double writing a fixed product.
#[derive(Debug, Clone)]
pub struct FixedDecompressor {
    pub product: Vec<u8>,
}

impl Decompressor for FixedDecompressor {
    fn decompress(&self, input: &Utf8Path, output: &Utf8Path) -> Result<(), IngestError> {
        if !input.is_file() {
            return Err(IngestError::Collaborator(format!("[{input}] does not exist")));
        }
        std::fs::write(output, &self.product)?;
        Ok(())
    }
}
