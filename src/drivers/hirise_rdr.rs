//! MRO HiRISE RDR.
//!
//! RDRs are map projected. Their per-CCD flags are stored in CCD order and put back in CPMM order,
//! and the local radius the RDR was produced with is replaced by the target radii.

use log::debug;

use crate::geometry::pds_geometry::ImageObject;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::{Keyword, Label, PvlContainer};
use crate::spice::builtin_target_radii;

use super::identity::IdentityKey;
use super::projection::{is_projected, mapping_group, ProjectionOffsets};
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "hirise_rdr",
    keys: &[IdentityKey::new(
        "MARS_RECONNAISSANCE_ORBITER",
        Some("HIRISE"),
        Some("RDR"),
    )],
    allowed: &[ImageObject::Image],
    description: "a map-projected MRO HiRISE RDR",
};

/// CPMM index of each CCD.
pub const CPMM_BY_CCD: [usize; 14] = [0, 1, 2, 3, 5, 8, 10, 11, 12, 13, 6, 7, 4, 9];

/// Flags reordered with [`CPMM_BY_CCD`].
pub const PERMUTED_FLAGS: [&str; 3] = ["SpecialProcessingFlag", "cpmmSummingFlag", "cpmmTdiFlag"];

/// Reorder the values of `keyword` so that `out[i] = in[CPMM_BY_CCD[i]]`.
pub fn permute_flags(keyword: &mut Keyword) -> Result<(), IngestError> {
    if keyword.len() != CPMM_BY_CCD.len() {
        return Err(IngestError::InvalidValue {
            keyword: keyword.name.clone(),
            value: keyword.len().to_string(),
            reason: format!("expected {} values", CPMM_BY_CCD.len()),
        });
    }
    let values = keyword.values.clone();
    for (slot, index) in keyword.values.iter_mut().zip(CPMM_BY_CCD) {
        *slot = values[index].clone();
    }
    Ok(())
}

/// Replace the radii of `mapping` by `radii` (km), keeping the original equatorial radius as
/// `CenterLatitudeRadius`.
pub fn replace_radii(mapping: &mut PvlContainer, radii: [f64; 3]) -> Result<(), IngestError> {
    let original = mapping.require("EquatorialRadius")?.clone();
    let mut center = original;
    center.name = "CenterLatitudeRadius".into();
    mapping.set_keyword(Keyword::with_units(
        "EquatorialRadius",
        (radii[0] * 1000.0).to_string(),
        "meters",
    ));
    mapping.set_keyword(Keyword::with_units(
        "PolarRadius",
        (radii[2] * 1000.0).to_string(),
        "meters",
    ));
    mapping.set_keyword(center);
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HiriseRdrDriver;

impl Driver for HiriseRdrDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        if !is_projected(label) {
            return Err(IngestError::wrong_product(
                CONFIG.description,
                "a product without IMAGE_MAP_PROJECTION",
            ));
        }
        let mut groups = ctx.translate(label, &["hirise_rdr.trn", "pds_archive.trn"])?;
        if let Some(mosaic) = groups.find_group_mut("Mosaic") {
            for name in PERMUTED_FLAGS {
                if let Some(keyword) = mosaic.keyword_mut(name) {
                    permute_flags(keyword)?;
                }
            }
        }

        let mut mapping = mapping_group(label, ctx.library, ProjectionOffsets::default())?
            .ok_or_else(|| IngestError::missing("MAP_PROJECTION_TYPE"))?;
        let target = mapping.require("TargetName")?.as_str()?.to_string();
        let radii = match ctx.spice("read target radii") {
            Ok(spice) => spice.target_radii(&target)?,
            Err(_) => builtin_target_radii(ctx.library, &target)?,
        };
        debug!("Radii of {target}: {radii:?} km");
        replace_radii(&mut mapping, radii)?;
        groups.put_container(mapping);

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        ctx.import_primary(&pds, ImportOptions::default(), outputs)?;
        let sink = outputs.sink(OutputRole::Primary)?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)
    }
}
