//! # Raw pixel geometry
//!
//! A [`GeometryDescriptor`] says everything the pixel importer needs to walk a raw byte stream:
//! dimensions, interleave, sample type and byte order, the sizes of the byte runs wrapped around
//! the pixels, the linear calibration, the special-pixel ranges and an optional DN lookup table.
//!
//! ## Overview
//!
//! - [`GeometryBuilder`]: fluent construction; [`GeometryBuilder::build`] validates and freezes.
//! - [`GeometryDescriptor`]: the frozen record, read through accessors only.
//! - [`special_pixel`]: sentinels, special ranges and [`quantize`](special_pixel::quantize).
//! - [`dn_remap`]: DN lookup tables.
//! - [`pds_geometry`]: derivation of a descriptor from a PDS label.
//!
//! ## Byte layout
//!
//! | Organization | header / trailer | prefix | suffix |
//! |--------------|------------------|--------|--------|
//! | BSQ | per band | per line per band | per line per band |
//! | BIL | per line record | per line per band | per line per band |
//! | BIP | per line record | per line | per line per band |
//!
//! [`GeometryDescriptor::expected_bytes`] gives the bytes a complete stream occupies.

pub mod dn_remap;
pub mod pds_geometry;
pub mod special_pixel;

use std::fmt;

use crate::ingest_errors::IngestError;

pub use dn_remap::DnRemap;
pub use special_pixel::{CubePixelType, SpecialPixel, SpecialRange, SpecialRanges};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Organization {
    #[default]
    Bsq,
    Bil,
    Bip,
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Organization::Bsq => "BSQ",
            Organization::Bil => "BIL",
            Organization::Bip => "BIP",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Organization {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BSQ" | "BAND_SEQUENTIAL" => Ok(Organization::Bsq),
            "BIL" | "LINE_INTERLEAVED" => Ok(Organization::Bil),
            "BIP" | "SAMPLE_INTERLEAVED" => Ok(Organization::Bip),
            other => Err(IngestError::InvalidValue {
                keyword: "Organization".into(),
                value: other.to_string(),
                reason: "expected BSQ, BIL or BIP".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    Lsb,
    #[default]
    Msb,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Lsb
        } else {
            ByteOrder::Msb
        }
    }
}

/// Sample type of the raw stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelType {
    #[default]
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    F32,
    F64,
}

impl PixelType {
    pub fn bytes(self) -> u64 {
        match self {
            PixelType::U8 | PixelType::S8 => 1,
            PixelType::U16 | PixelType::S16 => 2,
            PixelType::U32 | PixelType::S32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, PixelType::F32 | PixelType::F64)
    }

    /// Pixel type from a PDS sample kind and bit width.
    ///
    /// Arguments
    /// -----------------
    /// * `kind`: `Integer`, `Natural` (unsigned) or `Real`, as the PDS translation tables
    ///   normalise `SAMPLE_TYPE` / `CORE_ITEM_TYPE`.
    /// * `bits`: sample width.
    ///
    /// Return
    /// ----------
    /// * The pixel type. Signed 8-bit integers are read as unsigned bytes, as most archives label
    ///   unsigned 8-bit data that way.
    pub fn from_pds(kind: &str, bits: u64) -> Result<Self, IngestError> {
        let kind_upper = kind.trim().to_ascii_uppercase();
        let ty = match (kind_upper.as_str(), bits) {
            ("INTEGER" | "NATURAL", 8) => Some(PixelType::U8),
            ("INTEGER", 16) => Some(PixelType::S16),
            ("INTEGER", 32) => Some(PixelType::S32),
            ("NATURAL", 16) => Some(PixelType::U16),
            ("NATURAL", 32) => Some(PixelType::U32),
            ("REAL", 32) => Some(PixelType::F32),
            ("REAL", 64) => Some(PixelType::F64),
            _ => None,
        };
        ty.ok_or_else(|| {
            IngestError::unsupported(format!("{bits}-bit {kind} samples are not supported"))
        })
    }
}

/// Linear calibration `v = multiplier · r + base`, for all bands or one pair per band.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    Scalar { base: f64, multiplier: f64 },
    /// `(base, multiplier)` per band.
    PerBand(Vec<(f64, f64)>),
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::Scalar {
            base: 0.0,
            multiplier: 1.0,
        }
    }
}

impl Calibration {
    /// `(base, multiplier)` of the zero-based `band`.
    #[inline]
    pub fn for_band(&self, band: usize) -> (f64, f64) {
        match self {
            Calibration::Scalar { base, multiplier } => (*base, *multiplier),
            Calibration::PerBand(pairs) => pairs.get(band).copied().unwrap_or((0.0, 1.0)),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Calibration::Scalar { base, multiplier } if *base == 0.0 && *multiplier == 1.0)
    }
}

/// Frozen description of a raw pixel stream. Build it with [`GeometryDescriptor::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescriptor {
    samples: usize,
    lines: usize,
    bands: usize,
    organization: Organization,
    pixel_type: PixelType,
    byte_order: ByteOrder,
    file_header_bytes: u64,
    data_header_bytes: u64,
    data_trailer_bytes: u64,
    data_prefix_bytes: u64,
    data_suffix_bytes: u64,
    calibration: Calibration,
    special_ranges: SpecialRanges,
    dn_remap: Option<DnRemap>,
}

impl GeometryDescriptor {
    pub fn builder() -> GeometryBuilder {
        GeometryBuilder::new()
    }

    /// A builder preloaded with this descriptor, for driver overrides.
    pub fn to_builder(&self) -> GeometryBuilder {
        GeometryBuilder {
            params: self.clone(),
        }
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
    pub fn organization(&self) -> Organization {
        self.organization
    }
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
    pub fn file_header_bytes(&self) -> u64 {
        self.file_header_bytes
    }
    pub fn data_header_bytes(&self) -> u64 {
        self.data_header_bytes
    }
    pub fn data_trailer_bytes(&self) -> u64 {
        self.data_trailer_bytes
    }
    pub fn data_prefix_bytes(&self) -> u64 {
        self.data_prefix_bytes
    }
    pub fn data_suffix_bytes(&self) -> u64 {
        self.data_suffix_bytes
    }
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
    pub fn special_ranges(&self) -> &SpecialRanges {
        &self.special_ranges
    }
    pub fn dn_remap(&self) -> Option<&DnRemap> {
        self.dn_remap.as_ref()
    }

    /// Bytes of one line of pixels for one band.
    pub fn pixel_line_bytes(&self) -> u64 {
        self.samples as u64 * self.pixel_type.bytes()
    }

    /// Bytes a complete stream occupies, file header included.
    pub fn expected_bytes(&self) -> u64 {
        let (s, l, b) = (self.samples as u64, self.lines as u64, self.bands as u64);
        let bps = self.pixel_type.bytes();
        let (h, t) = (self.data_header_bytes, self.data_trailer_bytes);
        let (p, x) = (self.data_prefix_bytes, self.data_suffix_bytes);
        self.file_header_bytes
            + match self.organization {
                Organization::Bsq => b * (h + t) + b * l * (p + s * bps + x),
                Organization::Bil => l * (h + t) + l * b * (p + s * bps + x),
                Organization::Bip => l * (h + t + p) + l * (b * s * bps + b * x),
            }
    }

    /// Cube pixel type for the output of an import with this geometry.
    ///
    /// A DN lookup table yields `S16`; a non-identity calibration yields `F32`; otherwise the
    /// narrowest cube type holding every input value.
    pub fn output_pixel_type(&self) -> CubePixelType {
        if self.dn_remap.is_some() {
            return CubePixelType::S16;
        }
        if !self.calibration.is_identity() {
            return CubePixelType::F32;
        }
        match self.pixel_type {
            PixelType::U8 => CubePixelType::U8,
            PixelType::S8 | PixelType::S16 => CubePixelType::S16,
            PixelType::U16 => CubePixelType::U16,
            PixelType::U32 | PixelType::S32 | PixelType::F32 | PixelType::F64 => {
                CubePixelType::F32
            }
        }
    }
}

impl Default for GeometryDescriptor {
    fn default() -> Self {
        GeometryDescriptor {
            samples: 0,
            lines: 0,
            bands: 1,
            organization: Organization::Bsq,
            pixel_type: PixelType::U8,
            byte_order: ByteOrder::Msb,
            file_header_bytes: 0,
            data_header_bytes: 0,
            data_trailer_bytes: 0,
            data_prefix_bytes: 0,
            data_suffix_bytes: 0,
            calibration: Calibration::default(),
            special_ranges: SpecialRanges::default(),
            dn_remap: None,
        }
    }
}

/// Builder for [`GeometryDescriptor`], with validation.
#[derive(Debug, Clone)]
pub struct GeometryBuilder {
    params: GeometryDescriptor,
}

impl Default for GeometryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryBuilder {
    /// A builder with one band, BSQ, unsigned bytes, MSB and no byte runs.
    pub fn new() -> Self {
        Self {
            params: GeometryDescriptor::default(),
        }
    }

    /// Set samples, lines and bands at once.
    pub fn dimensions(mut self, samples: usize, lines: usize, bands: usize) -> Self {
        self.params.samples = samples;
        self.params.lines = lines;
        self.params.bands = bands;
        self
    }
    pub fn samples(mut self, v: usize) -> Self {
        self.params.samples = v;
        self
    }
    pub fn lines(mut self, v: usize) -> Self {
        self.params.lines = v;
        self
    }
    pub fn bands(mut self, v: usize) -> Self {
        self.params.bands = v;
        self
    }
    pub fn organization(mut self, v: Organization) -> Self {
        self.params.organization = v;
        self
    }
    pub fn pixel_type(mut self, v: PixelType) -> Self {
        self.params.pixel_type = v;
        self
    }
    pub fn byte_order(mut self, v: ByteOrder) -> Self {
        self.params.byte_order = v;
        self
    }

    // --- Byte runs ---
    pub fn file_header_bytes(mut self, v: u64) -> Self {
        self.params.file_header_bytes = v;
        self
    }
    pub fn data_header_bytes(mut self, v: u64) -> Self {
        self.params.data_header_bytes = v;
        self
    }
    pub fn data_trailer_bytes(mut self, v: u64) -> Self {
        self.params.data_trailer_bytes = v;
        self
    }
    pub fn data_prefix_bytes(mut self, v: u64) -> Self {
        self.params.data_prefix_bytes = v;
        self
    }
    pub fn data_suffix_bytes(mut self, v: u64) -> Self {
        self.params.data_suffix_bytes = v;
        self
    }

    // --- Pixel values ---
    pub fn base(mut self, v: f64) -> Self {
        let (_, multiplier) = self.scalar_pair();
        self.params.calibration = Calibration::Scalar { base: v, multiplier };
        self
    }
    pub fn multiplier(mut self, v: f64) -> Self {
        let (base, _) = self.scalar_pair();
        self.params.calibration = Calibration::Scalar {
            base,
            multiplier: v,
        };
        self
    }
    /// One `(base, multiplier)` pair per band.
    pub fn band_calibration(mut self, pairs: Vec<(f64, f64)>) -> Self {
        self.params.calibration = Calibration::PerBand(pairs);
        self
    }
    pub fn calibration(mut self, v: Calibration) -> Self {
        self.params.calibration = v;
        self
    }
    pub fn special_range(mut self, special: SpecialPixel, range: Option<SpecialRange>) -> Self {
        self.params.special_ranges.set(special, range);
        self
    }
    pub fn special_ranges(mut self, v: SpecialRanges) -> Self {
        self.params.special_ranges = v;
        self
    }
    pub fn dn_remap(mut self, v: Option<DnRemap>) -> Self {
        self.params.dn_remap = v;
        self
    }

    fn scalar_pair(&self) -> (f64, f64) {
        match &self.params.calibration {
            Calibration::Scalar { base, multiplier } => (*base, *multiplier),
            Calibration::PerBand(_) => (0.0, 1.0),
        }
    }

    /// Finalize the builder and produce a frozen [`GeometryDescriptor`].
    ///
    /// Validation rules
    /// -----------------
    /// * `samples`, `lines` and `bands` are all positive.
    /// * Every calibration value is finite; a per-band calibration has exactly `bands` pairs.
    /// * The special ranges are well formed and pairwise disjoint.
    /// * A DN lookup table is only used with 8- or 16-bit unsigned samples and has one entry per
    ///   possible raw value.
    ///
    /// Return
    /// ----------
    /// * The descriptor, or [`IngestError::InvalidGeometry`] naming the first failed rule.
    pub fn build(self) -> Result<GeometryDescriptor, IngestError> {
        let p = &self.params;
        if p.samples == 0 || p.lines == 0 || p.bands == 0 {
            return Err(IngestError::InvalidGeometry(format!(
                "dimensions must be positive, got {} samples × {} lines × {} bands",
                p.samples, p.lines, p.bands
            )));
        }

        match &p.calibration {
            Calibration::Scalar { base, multiplier } => {
                if !base.is_finite() || !multiplier.is_finite() {
                    return Err(IngestError::InvalidGeometry(format!(
                        "calibration base {base} / multiplier {multiplier} is not finite"
                    )));
                }
            }
            Calibration::PerBand(pairs) => {
                if pairs.len() != p.bands {
                    return Err(IngestError::InvalidGeometry(format!(
                        "{} band calibration pairs for {} bands",
                        pairs.len(),
                        p.bands
                    )));
                }
                if pairs.iter().any(|(b, m)| !b.is_finite() || !m.is_finite()) {
                    return Err(IngestError::InvalidGeometry(
                        "band calibration holds a non-finite value".into(),
                    ));
                }
            }
        }

        p.special_ranges.validate()?;

        if let Some(remap) = &p.dn_remap {
            let entries = match p.pixel_type {
                PixelType::U8 => 256,
                PixelType::U16 => 65536,
                other => {
                    return Err(IngestError::InvalidGeometry(format!(
                        "DN lookup table requires 8- or 16-bit unsigned samples, got {other:?}"
                    )))
                }
            };
            if remap.len() != entries {
                return Err(IngestError::InvalidGeometry(format!(
                    "DN lookup table has {} entries, expected {entries}",
                    remap.len()
                )));
            }
        }

        Ok(self.params)
    }
}
