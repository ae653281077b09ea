//! # SPICE collaborator
//!
//! Some drivers need clock and time conversions that only a NAIF toolkit with the mission kernels
//! can do: VIRTIS start/stop times from spacecraft clock counts, the Voyager shutter time from the
//! image number, HiRISE target radii. They reach it through [`SpiceClock`], implemented by the
//! host application.
//!
//! ## Defaults
//!
//! - UTC ↔ ET conversions are done with `hifitime` (ET is TDB seconds past J2000).
//! - Target radii come from the built-in `target_radii.csv` (kilometers).
//!
//! Spacecraft clock conversions have no default.

use std::str::FromStr;

use hifitime::{Epoch, TimeScale, Unit};
use serde::Deserialize;

use crate::ingest_errors::IngestError;
use crate::translation::TranslationLibrary;

/// Name of the built-in radii file.
pub const TARGET_RADII_FILE: &str = "target_radii.csv";

/// Clock and body-constant services of a SPICE toolkit.
pub trait SpiceClock {
    /// Ephemeris time of a UTC calendar string (`2004-03-02T04:05:06.123`, optional trailing `Z`).
    fn utc_to_et(&self, utc: &str) -> Result<f64, IngestError> {
        utc_to_et(utc)
    }

    /// ISO calendar ("ISOC") UTC string of `et` with `precision` decimals of seconds.
    fn et_to_utc(&self, et: f64, precision: usize) -> Result<String, IngestError> {
        Ok(et_to_utc(et, precision))
    }

    /// Spacecraft clock string of `et` for the clock of NAIF id `clock_id`.
    fn et_to_sclk(&self, clock_id: i32, et: f64) -> Result<String, IngestError>;

    /// Ephemeris time of the spacecraft clock string `sclk`.
    fn sclk_to_et(&self, clock_id: i32, sclk: &str) -> Result<f64, IngestError>;

    /// Radii `[a, b, c]` of `target` in kilometers.
    fn target_radii(&self, target: &str) -> Result<[f64; 3], IngestError> {
        builtin_target_radii(&TranslationLibrary::builtin(), target)
    }
}

/// `hifitime` conversion of a UTC string to ephemeris time.
pub fn utc_to_et(utc: &str) -> Result<f64, IngestError> {
    let text = utc.trim().trim_end_matches(['Z', 'z']);
    Epoch::from_str(text)
        .map(|epoch| epoch.to_et_seconds())
        .map_err(|e| IngestError::Collaborator(format!("cannot convert UTC [{utc}]: {e}")))
}

/// `hifitime` ISOC rendering of an ephemeris time, rounded to `precision` decimals (at most 9).
pub fn et_to_utc(et: f64, precision: usize) -> String {
    let precision = precision.min(9) as u32;
    let step = 10_i64.pow(9 - precision);
    let epoch = Epoch::from_et_seconds(et)
        .to_time_scale(TimeScale::UTC)
        .round(Unit::Nanosecond * step);
    let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
    let mut text = format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}");
    if precision > 0 {
        let fraction = nanos / 10_u32.pow(9 - precision);
        text.push_str(&format!(".{fraction:0width$}", width = precision as usize));
    }
    text
}

#[derive(Debug, Deserialize)]
struct RadiiRecord {
    target: String,
    a: f64,
    b: f64,
    c: f64,
}

/// Radii of `target` from the `target_radii.csv` file of `library`.
pub fn builtin_target_radii(
    library: &TranslationLibrary,
    target: &str,
) -> Result<[f64; 3], IngestError> {
    let wanted = target.trim().replace(' ', "_");
    library
        .records::<RadiiRecord>(TARGET_RADII_FILE)?
        .into_iter()
        .find(|r| r.target.eq_ignore_ascii_case(&wanted))
        .map(|r| [r.a, r.b, r.c])
        .ok_or_else(|| IngestError::Collaborator(format!("no radii known for target [{target}]")))
}

#[cfg(test)]
mod test_spice {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_utc_roundtrip() {
        let et = utc_to_et("2009-03-05T12:34:56.789Z").unwrap();
        assert_eq!(et_to_utc(et, 3), "2009-03-05T12:34:56.789");
        assert_eq!(et_to_utc(et, 0), "2009-03-05T12:34:57");
    }

    #[test]
    fn test_j2000_is_near_zero() {
        // J2000 is 2000-01-01T12:00:00 TT, 64.184 s after the same UTC wall clock.
        let et = utc_to_et("2000-01-01T11:58:55.816").unwrap();
        assert_relative_eq!(et, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_bad_utc() {
        assert_eq!(utc_to_et("yesterday").unwrap_err().kind(), "Collaborator");
    }

    #[test]
    fn test_builtin_radii() {
        let library = TranslationLibrary::builtin();
        let mars = builtin_target_radii(&library, "MARS").unwrap();
        assert_relative_eq!(mars[0], 3396.19);
        assert_relative_eq!(mars[2], 3376.2);
        assert!(builtin_target_radii(&library, "Vulcan").is_err());
    }
}
