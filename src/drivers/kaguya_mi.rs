//! SELENE (Kaguya) Multiband Imager map products.
//!
//! MI MAP labels give `SAMPLE_PROJECTION_OFFSET` with the opposite sign of the PDS convention;
//! it is negated before the projection is translated.

use crate::geometry::pds_geometry::ImageObject;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::{Label, PvlContainer, PvlValue};

use super::identity::IdentityKey;
use super::projection::{mapping_group, ProjectionOffsets, PROJECTION_OBJECT};
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "kaguya_mi",
    keys: &[
        IdentityKey::new("SELENE", Some("MI"), None),
        IdentityKey::new("KAGUYA", Some("MI"), None),
    ],
    allowed: &[ImageObject::Image],
    description: "a SELENE MI map product",
};

pub const VIS_FRAME_CODE: &str = "-131335";
pub const NIR_FRAME_CODE: &str = "-131341";

/// Frame code of the MI channel, from `INSTRUMENT_ID` (`MI-VIS`, `MI-NIR`) or the first filter
/// (`MV*`, `MN*`).
pub fn naif_frame_code(instrument_id: &str, first_filter: &str) -> Result<&'static str, IngestError> {
    let id = instrument_id.to_ascii_uppercase();
    let filter = first_filter.to_ascii_uppercase();
    if id.contains("NIR") || filter.starts_with("MN") {
        Ok(NIR_FRAME_CODE)
    } else if id.contains("VIS") || filter.starts_with("MV") {
        Ok(VIS_FRAME_CODE)
    } else {
        Err(IngestError::unsupported(format!(
            "MI channel of instrument [{instrument_id}] with filter [{first_filter}]"
        )))
    }
}

/// Copy of `label` with `SAMPLE_PROJECTION_OFFSET` negated.
pub fn negate_sample_offset(label: &PvlContainer) -> Result<PvlContainer, IngestError> {
    let mut copy = label.clone();
    let projection = copy
        .traverse_container_mut(PROJECTION_OBJECT, None)
        .ok_or_else(|| IngestError::missing(PROJECTION_OBJECT))?;
    let keyword = projection
        .keyword_mut("SAMPLE_PROJECTION_OFFSET")
        .ok_or_else(|| IngestError::missing("SAMPLE_PROJECTION_OFFSET"))?;
    let negated = -keyword.as_f64()?;
    let value = match keyword.units(0) {
        Some(units) => PvlValue::with_units(negated.to_string(), units.to_string()),
        None => PvlValue::new(negated.to_string()),
    };
    keyword.set_value(value);
    Ok(copy)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KaguyaMiDriver;

impl Driver for KaguyaMiDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let mut groups = ctx.translate(label, &["kaguya_mi.trn"])?;
        let instrument_id = label
            .traverse_keyword("INSTRUMENT_ID")
            .and_then(|k| k.as_str().ok())
            .unwrap_or_default();
        let first_filter = label
            .traverse_keyword("FILTER_NAME")
            .and_then(|k| k.get_str(0).ok())
            .unwrap_or_default();
        let frame_code = naif_frame_code(instrument_id, first_filter)?;

        let adjusted = negate_sample_offset(label)?;
        let mapping = mapping_group(&adjusted, ctx.library, ProjectionOffsets::default())?
            .ok_or_else(|| IngestError::missing("MAP_PROJECTION_TYPE"))?;
        groups.put_container(mapping);

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        ctx.import_primary(&pds, ImportOptions::default(), outputs)?;

        let sink = outputs.sink(OutputRole::Primary)?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)?;
        sink.put_naif_keyword("NaifFrameCode", &[frame_code.to_string()])
    }
}
