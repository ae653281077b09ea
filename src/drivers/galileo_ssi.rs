//! Galileo Solid State Imaging.
//!
//! SSI labels leave `/*` comments open and are repaired before parsing. Frames taken in a summation
//! mode are stored at full size with the summed pixels in the upper-left quarter; that corner is
//! cropped out and `Summing` is set to 2.

use log::info;

use crate::cube::{CubeSink, MemoryCube};
use crate::geometry::pds_geometry::ImageObject;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::fixups::close_open_comments;
use crate::label::{Keyword, Label};

use super::context::group_mut;
use super::identity::IdentityKey;
use super::post_process::crop_upper_left;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "galileo_ssi",
    keys: &[IdentityKey::new("GALILEO", Some("SSI"), None)],
    allowed: &[ImageObject::Image],
    description: "a Galileo SSI image",
};

pub const NAIF_FRAME_CODE: &str = "-77001";

/// Data set of the reprocessed frames in which summed images keep their full size.
pub const SUMMED_DATA_SET: &str = "SSI-2-REDR-V1.0";

/// A frame of `frame_duration` seconds from `data_set` was taken in summation mode.
pub fn is_summed(frame_duration: Option<f64>, data_set: &str) -> bool {
    frame_duration.is_some_and(|d| d > 2.0 && d < 3.0)
        && data_set.to_ascii_uppercase().contains(SUMMED_DATA_SET)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GalileoSsiDriver;

impl Driver for GalileoSsiDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn read_label(&self, ctx: &mut DriverContext) -> Result<Label, IngestError> {
        ctx.read_label_with(close_open_comments)
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let mut groups = ctx.translate(label, &["galileo_ssi.trn", "pds_archive.trn"])?;
        let frame_duration = label
            .traverse_keyword("FRAME_DURATION")
            .and_then(|k| k.as_f64().ok());
        let data_set = label
            .traverse_keyword("DATA_SET_ID")
            .and_then(|k| k.as_str().ok())
            .unwrap_or_default();
        let summed = is_summed(frame_duration, data_set);

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        if summed {
            let g = &pds.geometry;
            let path = outputs.path(OutputRole::Primary);
            let mut full = MemoryCube::new();
            full.create(&path, g.samples(), g.lines(), g.bands(), g.output_pixel_type())?;
            ctx.import_pixels(&pds, DriverContext::layout(&pds), ImportOptions::default(), &mut full)?;
            let cropped = crop_upper_left(&full, g.samples() / 2, g.lines() / 2)?;
            info!(
                "Summed SSI frame cropped to {}x{}",
                cropped.samples(),
                cropped.lines()
            );
            cropped.write_to(outputs.sink(OutputRole::Primary)?, &path, 0..cropped.bands())?;
        } else {
            ctx.import_primary(&pds, ImportOptions::default(), outputs)?;
        }
        group_mut(&mut groups, "Instrument")
            .set_keyword(Keyword::new("Summing", if summed { "2" } else { "1" }));
        for name in ["Center", "Width"] {
            if let Some(keyword) = group_mut(&mut groups, "BandBin").keyword_mut(name) {
                keyword.set_units("micrometers");
            }
        }

        let sink = outputs.sink(OutputRole::Primary)?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)?;
        sink.put_naif_keyword("NaifFrameCode", &[NAIF_FRAME_CODE.to_string()])
    }
}

#[cfg(test)]
mod test_galileo_ssi {
    use super::*;

    #[test]
    fn test_summed_mode() {
        assert!(is_summed(Some(2.333), "GO-J-SSI-2-REDR-V1.0"));
        assert!(!is_summed(Some(8.667), "GO-J-SSI-2-REDR-V1.0"));
        assert!(!is_summed(Some(2.333), "GO-J-SSI-3-REDR-V1.0"));
        assert!(!is_summed(None, "GO-J-SSI-2-REDR-V1.0"));
    }
}
