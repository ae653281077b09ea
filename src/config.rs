//! # Ingest configuration
//!
//! [`IngestConfig`] gathers the user choices that change how a product is ingested: special
//! pixel range overrides, prefix and suffix overrides, MARCI framelet options, the Voyager camera
//! for unlabelled products, the forced driver and the translation override directory.
//!
//! Build it with [`IngestConfigBuilder`]; [`IngestConfigBuilder::build`] rejects overlapping
//! special ranges and inverted intervals.
//!
//! ```rust
//! use pds2cube::config::{FlipMode, IngestConfigBuilder};
//! use pds2cube::geometry::{SpecialPixel, SpecialRange};
//!
//! let config = IngestConfigBuilder::new()
//!     .special_range(SpecialPixel::Null, SpecialRange::new(0.0, 1.0))
//!     .flip(FlipMode::No)
//!     .build()
//!     .unwrap();
//! assert!(config.keep_original_label);
//! ```

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;

use crate::geometry::{SpecialPixel, SpecialRange, SpecialRanges};
use crate::import::CancelToken;
use crate::ingest_errors::IngestError;
use crate::label::fixups::VoyagerCamera;
use crate::translation::TranslationLibrary;

/// Whether MARCI framelets are flipped top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipMode {
    /// Decided from the correlation of adjacent framelets.
    #[default]
    Auto,
    Yes,
    No,
}

impl FromStr for FlipMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(FlipMode::Auto),
            "YES" => Ok(FlipMode::Yes),
            "NO" => Ok(FlipMode::No),
            other => Err(IngestError::InvalidValue {
                keyword: "FLIP".into(),
                value: other.to_string(),
                reason: "expected AUTO, YES or NO".into(),
            }),
        }
    }
}

impl fmt::Display for FlipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlipMode::Auto => "AUTO",
            FlipMode::Yes => "YES",
            FlipMode::No => "NO",
        })
    }
}

/// Options of one ingest.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Ranges replacing the ones derived from the label, per special pixel.
    pub special_ranges: SpecialRanges,
    pub flip: FlipMode,
    /// MARCI: shift every filter band down by this many framelets per band index.
    pub color_offset: usize,
    /// Replaces the line prefix bytes of the label.
    pub prefix_bytes: Option<u64>,
    /// Replaces the line suffix bytes of the label.
    pub suffix_bytes: Option<u64>,
    pub keep_original_label: bool,
    /// Driver name forced instead of the detected one.
    pub driver: Option<String>,
    pub translation_dir: Option<Utf8PathBuf>,
    pub camera: VoyagerCamera,
    pub cancel: CancelToken,
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            special_ranges: SpecialRanges::default(),
            flip: FlipMode::Auto,
            color_offset: 0,
            prefix_bytes: None,
            suffix_bytes: None,
            keep_original_label: true,
            driver: None,
            translation_dir: None,
            camera: VoyagerCamera::Automatic,
            cancel: CancelToken::new(),
            show_progress: false,
        }
    }
}

impl IngestConfig {
    /// Translation tables, with the override directory when one is set.
    pub fn library(&self) -> TranslationLibrary {
        match &self.translation_dir {
            Some(dir) => TranslationLibrary::with_override_dir(dir.clone()),
            None => TranslationLibrary::builtin(),
        }
    }
}

/// Builder of [`IngestConfig`].
#[derive(Debug, Clone, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn special_range(mut self, special: SpecialPixel, range: SpecialRange) -> Self {
        self.config.special_ranges.set(special, Some(range));
        self
    }
    pub fn flip(mut self, v: FlipMode) -> Self {
        self.config.flip = v;
        self
    }
    pub fn color_offset(mut self, v: usize) -> Self {
        self.config.color_offset = v;
        self
    }
    pub fn prefix_bytes(mut self, v: u64) -> Self {
        self.config.prefix_bytes = Some(v);
        self
    }
    pub fn suffix_bytes(mut self, v: u64) -> Self {
        self.config.suffix_bytes = Some(v);
        self
    }
    pub fn keep_original_label(mut self, v: bool) -> Self {
        self.config.keep_original_label = v;
        self
    }
    pub fn driver(mut self, name: impl Into<String>) -> Self {
        self.config.driver = Some(name.into());
        self
    }
    pub fn translation_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.translation_dir = Some(dir.into());
        self
    }
    pub fn camera(mut self, v: VoyagerCamera) -> Self {
        self.config.camera = v;
        self
    }
    pub fn cancel(mut self, v: CancelToken) -> Self {
        self.config.cancel = v;
        self
    }
    pub fn show_progress(mut self, v: bool) -> Self {
        self.config.show_progress = v;
        self
    }

    /// Validate and return the configuration.
    ///
    /// Return
    /// ----------
    /// * `InvalidGeometry` for an inverted or overlapping special range, `InvalidValue` for an
    ///   empty driver name or a translation directory that does not exist.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let config = self.config;
        config.special_ranges.validate()?;
        if config.driver.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(IngestError::InvalidValue {
                keyword: "driver".into(),
                value: String::new(),
                reason: "driver name is empty".into(),
            });
        }
        if let Some(dir) = &config.translation_dir {
            if !dir.is_dir() {
                return Err(IngestError::InvalidValue {
                    keyword: "translations".into(),
                    value: dir.to_string(),
                    reason: "not a directory".into(),
                });
            }
        }
        Ok(config)
    }
}
