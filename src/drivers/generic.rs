//! Generic PDS and ISIS2 import.

use crate::geometry::pds_geometry::{detect_source, ImageObject, SourceKind};
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::{Keyword, Label, PvlContainer};

use super::context::group_mut;
use super::projection::{mapping_group, ProjectionOffsets};
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

pub const NAME: &str = "pds";

static CONFIG: DriverConfig = DriverConfig {
    name: NAME,
    keys: &[],
    allowed: &ImageObject::ALL,
    description: "any PDS image or qube, or ISIS2 cube",
};

/// Imports any product the importer can walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdsDriver;

/// `Instrument`, `BandBin`, `Archive` and `Mapping` groups of a generic product.
pub fn generic_groups(
    ctx: &DriverContext,
    label: &Label,
    source: SourceKind,
) -> Result<PvlContainer, IngestError> {
    let mut groups = match source {
        SourceKind::Pds => {
            ctx.translate(label, &["pds_instrument.trn", "pds_archive.trn", "pds_bandbin.trn"])?
        }
        SourceKind::Isis2 => {
            let mut groups = ctx.translate(label, &["isis2_instrument.trn", "isis2_bandbin.trn"])?;
            strip_time_zone(group_mut(&mut groups, "Instrument"), "StartTime");
            strip_time_zone(group_mut(&mut groups, "Instrument"), "StopTime");
            groups
        }
    };
    if let Some(mapping) = mapping_group(label, ctx.library, ProjectionOffsets::default())? {
        groups.put_container(mapping);
    }
    Ok(groups)
}

/// Drop the trailing `Z` of a UTC time keyword.
pub fn strip_time_zone(group: &mut PvlContainer, name: &str) {
    let Some(keyword) = group.keyword(name) else {
        return;
    };
    let Ok(text) = keyword.as_str() else {
        return;
    };
    if let Some(stripped) = text.strip_suffix(['Z', 'z']) {
        let stripped = stripped.to_string();
        group.set_keyword(Keyword::new(name, stripped));
    }
}

impl Driver for PdsDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let source = detect_source(label)?;
        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        ctx.import_primary(&pds, ImportOptions::default(), outputs)?;
        let groups = generic_groups(ctx, label, source)?;

        let sink = outputs.sink(OutputRole::Primary)?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)
    }
}
