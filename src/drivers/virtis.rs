//! Rosetta VIRTIS-M and VIRTIS-H qubes.
//!
//! ## Overview
//!
//! Level 2 (uncalibrated) qubes carry an 864-byte housekeeping trailer after every line; the first
//! 82 big-endian words of it are decoded into the `VIRTISHouseKeeping` table with the definitions
//! of `virtis_housekeeping.csv`. Every `FrameParameter[3] + 1` lines, starting with the first,
//! is a dark current scan and is set to NULL.
//!
//! Level 3 (calibrated) qubes carry a 4-byte suffix per band line. The second word of the suffixes
//! of the first three bands of a line holds its SCET, written to the `dataSCET` column of the
//! `VIRTISHouseKeeping` table. The first and last SCET give the start and stop times through the
//! SPICE clock.
//!
//! Draft archive labels miss commas in two sequences; those are repaired when the label does not
//! parse.

use log::{debug, info};
use serde::Deserialize;

use crate::constants::NULL8;
use crate::geometry::pds_geometry::ImageObject;
use crate::geometry::{SpecialPixel, SpecialRange};
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::fixups::virtis_commas;
use crate::label::{Keyword, Label, PvlContainer};
use crate::table::{Field, FieldType, FieldValue, Table};

use super::context::group_mut;
use super::identity::IdentityKey;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "virtis",
    keys: &[IdentityKey::new("ROSETTA", Some("VIRTIS"), None)],
    allowed: &[ImageObject::Qube, ImageObject::SpectralQube],
    description: "a Rosetta VIRTIS level 2 or 3 qube",
};

pub const HOUSEKEEPING_FILE: &str = "virtis_housekeeping.csv";
pub const HOUSEKEEPING_TABLE: &str = "VIRTISHouseKeeping";

/// Bytes of housekeeping after every line of a level 2 qube.
pub const LEVEL2_TRAILER_BYTES: u64 = 864;
/// Bytes of suffix after every band line of a level 3 qube.
pub const LEVEL3_SUFFIX_BYTES: u64 = 4;
/// Housekeeping words decoded per line.
pub const HOUSEKEEPING_WORDS: usize = 82;
/// Raw value of a NULL pixel and of an invalid housekeeping word.
pub const INVALID_WORD: u16 = 65535;
/// NAIF id of the Rosetta spacecraft clock.
pub const CLOCK_ID: i32 = -226;

/// Frame code of a VIRTIS channel.
pub fn naif_frame_code(channel: &str) -> Result<&'static str, IngestError> {
    match channel.trim().to_ascii_uppercase().replace('-', "_").as_str() {
        "VIRTIS_M_IR" => Ok("-226213"),
        "VIRTIS_M_VIS" => Ok("-226211"),
        "VIRTIS_H" => Ok("-226220"),
        other => Err(IngestError::unsupported(format!(
            "VIRTIS channel [{other}]"
        ))),
    }
}

/// Seconds of a SCET held in three words.
pub fn scet_seconds(w1: u16, w2: u16, w3: u16) -> f64 {
    f64::from(w1) * 65536.0 + f64::from(w2) + f64::from(w3) / 65536.0
}

/// SCET in the `SSSSSSSSSS:FFFFF` clock string form.
pub fn scet_string(w1: u16, w2: u16, w3: u16) -> String {
    format!("{}:{}", u64::from(w1) * 65536 + u64::from(w2), w3)
}

/// Big-endian words of `bytes`.
pub fn words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HousekeepingKind {
    /// Three words read with [`scet_seconds`].
    Scet,
    /// `a + b·w + c·w²`.
    Poly,
    /// `(w >> a) & b`.
    Bits,
}

/// One column of the housekeeping table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HousekeepingItem {
    pub name: String,
    pub word: usize,
    pub kind: HousekeepingKind,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl HousekeepingItem {
    /// Value of the item in `words`; `None` for a SCET that is invalid or zero.
    pub fn decode(&self, words: &[u16]) -> Option<f64> {
        match self.kind {
            HousekeepingKind::Scet => {
                let scet = words.get(self.word..self.word + 3)?;
                if scet.contains(&INVALID_WORD) {
                    return None;
                }
                let seconds = scet_seconds(scet[0], scet[1], scet[2]);
                (seconds != 0.0).then_some(seconds)
            }
            HousekeepingKind::Poly | HousekeepingKind::Bits => {
                let w = *words.get(self.word)?;
                if w == INVALID_WORD {
                    return Some(f64::from(INVALID_WORD));
                }
                let x = f64::from(w);
                Some(match self.kind {
                    HousekeepingKind::Poly => self.a + self.b * x + self.c * x * x,
                    _ => f64::from((w >> self.a as u32) & self.b as u16),
                })
            }
        }
    }
}

/// Housekeeping table of the level 2 line trailers `trailers`.
///
/// Lines whose SCETs are not all valid are left out.
pub fn housekeeping_table(trailers: &[Vec<u8>], items: &[HousekeepingItem]) -> Table {
    let fields = items
        .iter()
        .map(|item| Field::new(item.name.clone(), FieldType::Double))
        .collect();
    let mut table = Table::new(HOUSEKEEPING_TABLE, fields);
    let mut skipped = 0;
    for trailer in trailers {
        let words = words(&trailer[..trailer.len().min(HOUSEKEEPING_WORDS * 2)]);
        let record: Option<Vec<FieldValue>> = items
            .iter()
            .map(|item| item.decode(&words).map(FieldValue::Double))
            .collect();
        match record {
            Some(record) => table.push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("{skipped} housekeeping records without a valid SCET skipped");
    }
    table
}

/// SCET strings of every line of a level 3 qube from its band suffixes, indexed
/// `band·lines + line`.
pub fn line_scets(suffixes: &[Vec<u8>], lines: usize) -> Result<Vec<String>, IngestError> {
    (0..lines)
        .map(|line| {
            let mut scet = [0u16; 3];
            for (band, word) in scet.iter_mut().enumerate() {
                let suffix = suffixes.get(band * lines + line).ok_or_else(|| {
                    IngestError::InvalidGeometry("VIRTIS SCET needs at least 3 bands".into())
                })?;
                *word = *words(suffix).get(1).ok_or_else(|| IngestError::TruncatedTable {
                    offset: 2,
                    expected_bytes: 2,
                })?;
            }
            Ok(scet_string(scet[0], scet[1], scet[2]))
        })
        .collect()
}

/// One-column table of the line SCETs.
pub fn scet_table(scets: &[String]) -> Table {
    let mut table = Table::new(
        HOUSEKEEPING_TABLE,
        vec![Field::new("dataSCET", FieldType::Text(50))],
    );
    for scet in scets {
        table.push(vec![FieldValue::Text(scet.clone())]);
    }
    table
}

/// Lines holding a dark current scan in a qube of `lines` lines.
pub fn dark_lines(lines: usize, frame_parameter_3: usize) -> impl Iterator<Item = usize> {
    (0..lines).step_by(frame_parameter_3 + 1)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VirtisDriver;

impl VirtisDriver {
    /// Start/stop times and clock counts of a level 3 qube from its first and last SCET.
    fn level3_times(
        ctx: &DriverContext,
        instrument: &mut PvlContainer,
        scets: &[String],
    ) -> Result<(), IngestError> {
        let (Some(first), Some(last)) = (scets.first(), scets.last()) else {
            return Ok(());
        };
        let spice = ctx.spice("convert VIRTIS SCETs")?;
        let exposure = instrument.require("FrameParameter")?.get_f64(0)?;
        let start = spice.sclk_to_et(CLOCK_ID, first)? - exposure;
        let stop = spice.sclk_to_et(CLOCK_ID, last)? - exposure;
        instrument.set_keyword(Keyword::new("StartTime", spice.et_to_utc(start, 3)?));
        instrument.set_keyword(Keyword::new("StopTime", spice.et_to_utc(stop, 3)?));
        instrument.set_keyword(Keyword::new(
            "SpacecraftClockStartCount",
            spice.et_to_sclk(CLOCK_ID, start)?,
        ));
        instrument.set_keyword(Keyword::new(
            "SpacecraftClockStopCount",
            spice.et_to_sclk(CLOCK_ID, stop)?,
        ));
        Ok(())
    }
}

impl Driver for VirtisDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn read_label(&self, ctx: &mut DriverContext) -> Result<Label, IngestError> {
        match ctx.read_label() {
            Err(IngestError::BadLabel { line, .. }) => {
                ctx.warn(format!(
                    "Label of [{}] does not parse at line {line}; repairing its sequences",
                    ctx.input
                ));
                ctx.read_label_with(virtis_commas)
            }
            other => other,
        }
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let mut groups = ctx.translate(label, &["virtis.trn", "pds_archive.trn"])?;
        let level = label.require("PROCESSING_LEVEL_ID")?.as_i64()?;
        let channel = label
            .traverse_keyword("ROSETTA:CHANNEL_ID")
            .ok_or_else(|| IngestError::missing("ROSETTA:CHANNEL_ID"))?
            .as_str()?;
        let frame_code = naif_frame_code(channel)?;

        let mut pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        let null = SpecialRange::exact(f64::from(INVALID_WORD));
        let mut ranges = *pds.geometry.special_ranges();
        for special in SpecialPixel::ALL {
            if ranges.get(special).is_some_and(|r| r.contains(null.min)) {
                ranges.set(special, None);
            }
        }
        ranges.set(SpecialPixel::Null, Some(null));
        let builder = pds.geometry.to_builder().special_ranges(ranges);
        let (builder, options) = match level {
            2 => (
                builder.data_trailer_bytes(LEVEL2_TRAILER_BYTES),
                ImportOptions::default().with_data_trailers(true),
            ),
            3 => (
                builder
                    .data_trailer_bytes(0)
                    .data_suffix_bytes(LEVEL3_SUFFIX_BYTES),
                ImportOptions::default().with_suffixes(true),
            ),
            other => {
                return Err(IngestError::unsupported(format!(
                    "VIRTIS processing level {other}"
                )))
            }
        };
        pds.geometry = builder.build()?;
        info!("VIRTIS level {level} {channel}");
        let summary = ctx.import_primary(&pds, options, outputs)?;
        let (samples, lines, bands) = (
            pds.geometry.samples(),
            pds.geometry.lines(),
            pds.geometry.bands(),
        );

        let instrument = group_mut(&mut groups, "Instrument");
        let table = if level == 2 {
            let items = ctx.library.records::<HousekeepingItem>(HOUSEKEEPING_FILE)?;
            housekeeping_table(&summary.side.data_trailers, &items)
        } else {
            let scets = line_scets(&summary.side.suffixes, lines)?;
            Self::level3_times(ctx, instrument, &scets)?;
            scet_table(&scets)
        };

        let sink = outputs.sink(OutputRole::Primary)?;
        if level == 2 {
            let rate = instrument.require("FrameParameter")?.get_i64(3)?;
            let rate = usize::try_from(rate).map_err(|_| IngestError::InvalidValue {
                keyword: "FrameParameter".into(),
                value: rate.to_string(),
                reason: "dark current rate must not be negative".into(),
            })?;
            let null_line = vec![NULL8; samples];
            for band in 0..bands {
                for line in dark_lines(lines, rate) {
                    sink.write_line(&null_line, line, band)?;
                }
            }
        }
        sink.write_table(table)?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)?;
        sink.put_naif_keyword("NaifFrameCode", &[frame_code.to_string()])
    }
}
