//! NEAR Shoemaker Multi-Spectral Imager.
//!
//! MSI frames have rectangular pixels: 244 lines are stretched to 412 so the pixels come out
//! square, then a border of the stretched frame is set to NULL because the edge pixels are not
//! calibrated.

use log::debug;

use crate::cube::{CubeSink, MemoryCube};
use crate::geometry::pds_geometry::ImageObject;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::{Keyword, Label, PvlContainer};

use super::context::group_mut;
use super::generic::strip_time_zone;
use super::identity::IdentityKey;
use super::post_process::{enlarge_lines, null_border};
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "near_msi",
    keys: &[IdentityKey::new("NEAR", Some("MSI"), None)],
    allowed: &[ImageObject::Image],
    description: "a NEAR MSI image",
};

pub const NAIF_FRAME_CODE: &str = "-93001";

/// Lines of a raw MSI frame.
pub const RAW_LINES: usize = 244;

/// Lines after the aspect ratio correction.
pub const ENLARGED_LINES: usize = 412;

/// NULL border of the enlarged frame.
pub const BORDER: usize = 33;

/// Keep the spacecraft clock counts as labelled and store them without their period.
fn clock_counts(instrument: &mut PvlContainer) {
    for name in ["SpacecraftClockStartCount", "SpacecraftClockStopCount"] {
        let Some(original) = instrument.keyword(name).cloned() else {
            continue;
        };
        let Ok(text) = original.as_str() else {
            continue;
        };
        let compact = text.replace('.', "");
        let mut kept = original.clone();
        kept.name = format!("Original{name}");
        instrument.set_keyword(Keyword::new(name, compact));
        instrument.set_keyword(kept);
    }
}

/// Stretch and trim an imported frame.
pub fn square_pixels(raw: &MemoryCube) -> Result<MemoryCube, IngestError> {
    let lines = raw.lines() * ENLARGED_LINES / RAW_LINES;
    let mut enlarged = enlarge_lines(raw, lines)?;
    null_border(&mut enlarged, BORDER);
    Ok(enlarged)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NearMsiDriver;

impl Driver for NearMsiDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let mut groups = ctx.translate(label, &["near_msi.trn", "pds_archive.trn"])?;
        let instrument = group_mut(&mut groups, "Instrument");
        clock_counts(instrument);
        strip_time_zone(instrument, "StartTime");
        strip_time_zone(instrument, "StopTime");
        if let Some(temperature) = instrument.keyword_mut("DpuDeckTemperature") {
            temperature.set_units("K");
        }
        if let Some(center) = group_mut(&mut groups, "BandBin").keyword_mut("Center") {
            center.set_units("nm");
        }

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        let g = &pds.geometry;
        let path = outputs.path(OutputRole::Primary);
        let mut raw = MemoryCube::new();
        raw.create(&path, g.samples(), g.lines(), g.bands(), g.output_pixel_type())?;
        ctx.import_pixels(&pds, DriverContext::layout(&pds), ImportOptions::default(), &mut raw)?;
        let square = square_pixels(&raw)?;
        debug!("MSI frame enlarged from {} to {} lines", raw.lines(), square.lines());

        let sink = outputs.sink(OutputRole::Primary)?;
        square.write_to(sink, &path, 0..square.bands())?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)?;
        sink.put_naif_keyword("NaifFrameCode", &[NAIF_FRAME_CODE.to_string()])
    }
}
