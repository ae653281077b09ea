//! # Special pixels
//!
//! Five sentinel values mark samples that carry no valid DN: `NULL` (no data), `LRS`/`HRS`
//! (low/high representation saturation) and `LIS`/`HIS` (low/high instrument saturation).
//!
//! Internally every sample is an `f64`, and the sentinels are the five most negative finite
//! doubles ([`NULL8`], [`LRS8`], ...). When a line is written to a cube, [`quantize`] maps each
//! sample into the cube pixel type: sentinels onto that type's reserved values, valid values
//! rounded and clamped into the type's valid range. A valid DN never lands on a sentinel.
//!
//! | Type | NULL | LRS | LIS | HIS | HRS | valid range |
//! |------|------|-----|-----|-----|-----|-------------|
//! | U8   | 0 | 0 | 0 | 255 | 255 | 1 ..= 254 |
//! | S16  | -32768 | -32767 | -32766 | -32765 | 32767 | -32752 ..= 32766 |
//! | U16  | 0 | 1 | 2 | 65534 | 65535 | 3 ..= 65522 |
//! | S32  | MIN | MIN+1 | MIN+2 | MIN+3 | MAX | MIN+4 ..= MAX-1 |
//! | U32  | 0 | 1 | 2 | MAX-1 | MAX | 3 ..= MAX-16 |
//! | F32  | `0xFF7FFFFB` | `..FC` | `..FD` | `..FE` | `..FF` | above `0xFF7FFFFA` |

use crate::constants::{
    HIS4_BITS, HIS8, HIS8_BITS, HRS4_BITS, HRS8, HRS8_BITS, LIS4_BITS, LIS8, LIS8_BITS,
    LRS4_BITS, LRS8, LRS8_BITS, NULL4_BITS, NULL8, NULL8_BITS, VALID_MIN4_BITS, VALID_MIN8,
};
use crate::ingest_errors::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialPixel {
    Null,
    Lrs,
    Lis,
    His,
    Hrs,
}

impl SpecialPixel {
    pub const ALL: [SpecialPixel; 5] = [
        SpecialPixel::Null,
        SpecialPixel::Lrs,
        SpecialPixel::Lis,
        SpecialPixel::His,
        SpecialPixel::Hrs,
    ];

    /// Internal `f64` sentinel.
    pub fn value(self) -> f64 {
        match self {
            SpecialPixel::Null => NULL8,
            SpecialPixel::Lrs => LRS8,
            SpecialPixel::Lis => LIS8,
            SpecialPixel::His => HIS8,
            SpecialPixel::Hrs => HRS8,
        }
    }

    /// The sentinel `v` is, if any.
    pub fn of(v: f64) -> Option<SpecialPixel> {
        match v.to_bits() {
            NULL8_BITS => Some(SpecialPixel::Null),
            LRS8_BITS => Some(SpecialPixel::Lrs),
            LIS8_BITS => Some(SpecialPixel::Lis),
            HIS8_BITS => Some(SpecialPixel::His),
            HRS8_BITS => Some(SpecialPixel::Hrs),
            _ => None,
        }
    }

    /// The sentinel whose 32-bit float pattern is `bits`, if any.
    pub fn of_f32_bits(bits: u32) -> Option<SpecialPixel> {
        match bits {
            NULL4_BITS => Some(SpecialPixel::Null),
            LRS4_BITS => Some(SpecialPixel::Lrs),
            LIS4_BITS => Some(SpecialPixel::Lis),
            HIS4_BITS => Some(SpecialPixel::His),
            HRS4_BITS => Some(SpecialPixel::Hrs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialPixel::Null => "NULL",
            SpecialPixel::Lrs => "LRS",
            SpecialPixel::Lis => "LIS",
            SpecialPixel::His => "HIS",
            SpecialPixel::Hrs => "HRS",
        }
    }
}

/// True for the five internal sentinels.
#[inline]
pub fn is_special(v: f64) -> bool {
    SpecialPixel::of(v).is_some()
}

/// True for a sample that carries a DN.
#[inline]
pub fn is_valid(v: f64) -> bool {
    !v.is_nan() && v >= VALID_MIN8
}

/// Pixel types a cube can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubePixelType {
    U8,
    S16,
    U16,
    S32,
    U32,
    F32,
    F64,
}

impl CubePixelType {
    pub fn bytes(self) -> usize {
        match self {
            CubePixelType::U8 => 1,
            CubePixelType::S16 | CubePixelType::U16 => 2,
            CubePixelType::S32 | CubePixelType::U32 | CubePixelType::F32 => 4,
            CubePixelType::F64 => 8,
        }
    }

    /// Name used in cube labels.
    pub fn label_name(self) -> &'static str {
        match self {
            CubePixelType::U8 => "UnsignedByte",
            CubePixelType::S16 => "SignedWord",
            CubePixelType::U16 => "UnsignedWord",
            CubePixelType::S32 => "SignedInteger",
            CubePixelType::U32 => "UnsignedInteger",
            CubePixelType::F32 => "Real",
            CubePixelType::F64 => "Double",
        }
    }

    pub fn from_label_name(name: &str) -> Option<Self> {
        [
            CubePixelType::U8,
            CubePixelType::S16,
            CubePixelType::U16,
            CubePixelType::S32,
            CubePixelType::U32,
            CubePixelType::F32,
            CubePixelType::F64,
        ]
        .into_iter()
        .find(|t| t.label_name().eq_ignore_ascii_case(name))
    }

    /// Stored value of `special` in this type.
    pub fn sentinel(self, special: SpecialPixel) -> f64 {
        use SpecialPixel::*;
        match self {
            CubePixelType::U8 => match special {
                Null | Lrs | Lis => 0.0,
                His | Hrs => 255.0,
            },
            CubePixelType::S16 => match special {
                Null => -32768.0,
                Lrs => -32767.0,
                Lis => -32766.0,
                His => -32765.0,
                Hrs => 32767.0,
            },
            CubePixelType::U16 => match special {
                Null => 0.0,
                Lrs => 1.0,
                Lis => 2.0,
                His => 65534.0,
                Hrs => 65535.0,
            },
            CubePixelType::S32 => match special {
                Null => i32::MIN as f64,
                Lrs => (i32::MIN + 1) as f64,
                Lis => (i32::MIN + 2) as f64,
                His => (i32::MIN + 3) as f64,
                Hrs => i32::MAX as f64,
            },
            CubePixelType::U32 => match special {
                Null => 0.0,
                Lrs => 1.0,
                Lis => 2.0,
                His => (u32::MAX - 1) as f64,
                Hrs => u32::MAX as f64,
            },
            CubePixelType::F32 => {
                let bits = match special {
                    Null => NULL4_BITS,
                    Lrs => LRS4_BITS,
                    Lis => LIS4_BITS,
                    His => HIS4_BITS,
                    Hrs => HRS4_BITS,
                };
                f32::from_bits(bits) as f64
            }
            CubePixelType::F64 => special.value(),
        }
    }

    /// Inclusive range of valid stored values.
    pub fn valid_range(self) -> (f64, f64) {
        match self {
            CubePixelType::U8 => (1.0, 254.0),
            CubePixelType::S16 => (-32752.0, 32766.0),
            CubePixelType::U16 => (3.0, 65522.0),
            CubePixelType::S32 => ((i32::MIN + 4) as f64, (i32::MAX - 1) as f64),
            CubePixelType::U32 => (3.0, (u32::MAX - 16) as f64),
            CubePixelType::F32 => (f32::from_bits(VALID_MIN4_BITS) as f64, f32::MAX as f64),
            CubePixelType::F64 => (VALID_MIN8, f64::MAX),
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, CubePixelType::F32 | CubePixelType::F64)
    }

    /// Map a stored value back into the internal domain.
    pub fn unquantize(self, stored: f64) -> f64 {
        if let CubePixelType::F64 = self {
            return stored;
        }
        if let CubePixelType::F32 = self {
            return SpecialPixel::of_f32_bits((stored as f32).to_bits())
                .map(SpecialPixel::value)
                .unwrap_or(stored);
        }
        // U8 shares sentinels; low values read back as NULL, high values as HRS.
        [
            SpecialPixel::Null,
            SpecialPixel::Lrs,
            SpecialPixel::Lis,
            SpecialPixel::His,
            SpecialPixel::Hrs,
        ]
        .into_iter()
        .find(|s| self.sentinel(*s) == stored)
        .map(SpecialPixel::value)
        .unwrap_or(stored)
    }
}

/// Map an internal sample into `ty`.
///
/// Return
/// ----------
/// * Either exactly one sentinel of `ty`, or a value inside [`CubePixelType::valid_range`]
///   (rounded for integer types, representable as `f32` for `F32`). NaN maps to NULL.
pub fn quantize(v: f64, ty: CubePixelType) -> f64 {
    if v.is_nan() {
        return ty.sentinel(SpecialPixel::Null);
    }
    if let Some(special) = SpecialPixel::of(v) {
        return ty.sentinel(special);
    }
    let (lo, hi) = ty.valid_range();
    if ty.is_integer() {
        v.round().clamp(lo, hi)
    } else if ty == CubePixelType::F32 {
        (v.clamp(lo, hi) as f32) as f64
    } else {
        v.clamp(lo, hi)
    }
}

/// Interval of DNs mapped onto one sentinel: `[min, max)`, or exactly `min` when `min == max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialRange {
    pub min: f64,
    pub max: f64,
}

impl SpecialRange {
    pub fn new(min: f64, max: f64) -> Self {
        SpecialRange { min, max }
    }

    pub fn exact(value: f64) -> Self {
        SpecialRange {
            min: value,
            max: value,
        }
    }

    fn is_point(&self) -> bool {
        self.min == self.max
    }

    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        if self.is_point() {
            v == self.min
        } else {
            v >= self.min && v < self.max
        }
    }

    fn overlaps(&self, other: &SpecialRange) -> bool {
        match (self.is_point(), other.is_point()) {
            (true, true) => self.min == other.min,
            (true, false) => other.contains(self.min),
            (false, true) => self.contains(other.min),
            (false, false) => self.min < other.max && other.min < self.max,
        }
    }
}

/// The five optional special ranges of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpecialRanges {
    pub null: Option<SpecialRange>,
    pub lrs: Option<SpecialRange>,
    pub lis: Option<SpecialRange>,
    pub his: Option<SpecialRange>,
    pub hrs: Option<SpecialRange>,
}

impl SpecialRanges {
    pub fn get(&self, special: SpecialPixel) -> Option<SpecialRange> {
        match special {
            SpecialPixel::Null => self.null,
            SpecialPixel::Lrs => self.lrs,
            SpecialPixel::Lis => self.lis,
            SpecialPixel::His => self.his,
            SpecialPixel::Hrs => self.hrs,
        }
    }

    pub fn set(&mut self, special: SpecialPixel, range: Option<SpecialRange>) {
        let slot = match special {
            SpecialPixel::Null => &mut self.null,
            SpecialPixel::Lrs => &mut self.lrs,
            SpecialPixel::Lis => &mut self.lis,
            SpecialPixel::His => &mut self.his,
            SpecialPixel::Hrs => &mut self.hrs,
        };
        *slot = range;
    }

    pub fn is_empty(&self) -> bool {
        SpecialPixel::ALL.iter().all(|s| self.get(*s).is_none())
    }

    /// Reject inverted or overlapping ranges.
    pub fn validate(&self) -> Result<(), IngestError> {
        let present: Vec<(SpecialPixel, SpecialRange)> = SpecialPixel::ALL
            .iter()
            .filter_map(|s| self.get(*s).map(|r| (*s, r)))
            .collect();
        for (special, range) in &present {
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max {
                return Err(IngestError::InvalidGeometry(format!(
                    "{} range [{}, {}) is empty or inverted",
                    special.name(),
                    range.min,
                    range.max
                )));
            }
        }
        for (i, (a, ra)) in present.iter().enumerate() {
            for (b, rb) in &present[i + 1..] {
                if ra.overlaps(rb) {
                    return Err(IngestError::InvalidGeometry(format!(
                        "{} and {} special ranges overlap",
                        a.name(),
                        b.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Replace `v` by the sentinel of the first range containing it; NaN becomes NULL.
    #[inline]
    pub fn classify(&self, v: f64) -> f64 {
        if v.is_nan() {
            return NULL8;
        }
        for special in SpecialPixel::ALL {
            if let Some(range) = self.get(special) {
                if range.contains(v) {
                    return special.value();
                }
            }
        }
        v
    }
}
