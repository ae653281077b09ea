//! # Constants and type definitions for pds2cube
//!
//! This module centralizes the **special-pixel sentinels**, **default record sizes** and the
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Special-pixel sentinels in the internal `f64` domain (`NULL8`, `LRS8`, ...)
//! - Sentinel bit patterns of the 32-bit float output type
//! - Type aliases for DNs, byte offsets and identifiers
//! - Keyword names shared by several modules
//!
//! Integer sentinels live next to the output pixel types in
//! [`special_pixel`](crate::geometry::special_pixel).

use smallvec::SmallVec;

// -------------------------------------------------------------------------------------------------
// Special pixels, 64-bit float domain
// -------------------------------------------------------------------------------------------------

/// Bit pattern of the 64-bit NULL sentinel.
pub const NULL8_BITS: u64 = 0xFFEF_FFFF_FFFF_FFFB;
/// Bit pattern of the 64-bit low representation saturation sentinel.
pub const LRS8_BITS: u64 = 0xFFEF_FFFF_FFFF_FFFC;
/// Bit pattern of the 64-bit low instrument saturation sentinel.
pub const LIS8_BITS: u64 = 0xFFEF_FFFF_FFFF_FFFD;
/// Bit pattern of the 64-bit high instrument saturation sentinel.
pub const HIS8_BITS: u64 = 0xFFEF_FFFF_FFFF_FFFE;
/// Bit pattern of the 64-bit high representation saturation sentinel.
pub const HRS8_BITS: u64 = 0xFFEF_FFFF_FFFF_FFFF;
/// Largest bit pattern (smallest value) still considered a valid 64-bit DN.
pub const VALID_MIN8_BITS: u64 = 0xFFEF_FFFF_FFFF_FFFA;

/// Internal NULL sample.
pub const NULL8: f64 = f64::from_bits(NULL8_BITS);
/// Internal LRS sample.
pub const LRS8: f64 = f64::from_bits(LRS8_BITS);
/// Internal LIS sample.
pub const LIS8: f64 = f64::from_bits(LIS8_BITS);
/// Internal HIS sample.
pub const HIS8: f64 = f64::from_bits(HIS8_BITS);
/// Internal HRS sample.
pub const HRS8: f64 = f64::from_bits(HRS8_BITS);
/// Smallest valid internal sample; every special pixel is below it.
pub const VALID_MIN8: f64 = f64::from_bits(VALID_MIN8_BITS);

// -------------------------------------------------------------------------------------------------
// Special pixels, 32-bit float domain
// -------------------------------------------------------------------------------------------------

pub const NULL4_BITS: u32 = 0xFF7F_FFFB;
pub const LRS4_BITS: u32 = 0xFF7F_FFFC;
pub const LIS4_BITS: u32 = 0xFF7F_FFFD;
pub const HIS4_BITS: u32 = 0xFF7F_FFFE;
pub const HRS4_BITS: u32 = 0xFF7F_FFFF;
pub const VALID_MIN4_BITS: u32 = 0xFF7F_FFFA;

// -------------------------------------------------------------------------------------------------
// PDS conventions
// -------------------------------------------------------------------------------------------------

/// Record size assumed when a label does not declare `RECORD_BYTES`.
pub const DEFAULT_RECORD_BYTES: u64 = 1;

/// Root keyword identifying a PDS3 label.
pub const PDS_VERSION_KEYWORD: &str = "PDS_VERSION_ID";

/// Root keyword identifying an ISIS2 cube label.
pub const ISIS2_SOURCE_KEYWORD: &str = "CCSD3ZF0000100000001NJPL3IF0PDS200000001";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// A sample value in the internal processing domain
pub type Dn = f64;

/// Absolute position in a byte source
pub type ByteOffset = u64;

/// Serial number of an ingested image
pub type SerialNumber = String;

/// Observation number shared by all images of one observation
pub type ObservationNumber = String;

/// Ordered values of a keyword; labels seldom carry more than a handful
pub type ValueList<T> = SmallVec<[T; 4]>;

#[cfg(test)]
mod test_constants {
    use super::*;

    #[test]
    fn test_sentinel_bit_patterns() {
        assert_eq!(NULL8.to_bits(), NULL8_BITS);
        assert_eq!(f32::from_bits(NULL4_BITS).to_bits(), NULL4_BITS);
        assert_eq!(LRS8.to_bits(), LRS8_BITS);
        assert_eq!(LIS8.to_bits(), LIS8_BITS);
        assert_eq!(HIS8.to_bits(), HIS8_BITS);
        assert_eq!(HRS8.to_bits(), HRS8_BITS);
    }

    #[test]
    fn test_sentinels_are_ordered() {
        assert!(HRS8 < HIS8 && HIS8 < LIS8 && LIS8 < LRS8 && LRS8 < NULL8);
        assert!(NULL8 < VALID_MIN8);
        assert_eq!(HRS8, -f64::MAX);
    }
}
