//! Apollo 15/16/17 metric camera.

use crate::geometry::pds_geometry::ImageObject;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::Label;

use super::context::group_value;
use super::identity::IdentityKey;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "apollo",
    keys: &[
        IdentityKey::new("APOLLO", Some("METRIC"), None),
        IdentityKey::new("APOLLO", Some("METRIC CAMERA"), None),
    ],
    allowed: &[ImageObject::Image],
    description: "an Apollo 15, 16 or 17 metric camera image",
};

/// Frame code of the metric camera of Apollo `mission`.
pub fn naif_frame_code(spacecraft: &str) -> Result<String, IngestError> {
    let number: String = spacecraft.chars().filter(char::is_ascii_digit).collect();
    match number.as_str() {
        "15" | "16" | "17" => Ok(format!("-9{number}240")),
        _ => Err(IngestError::wrong_product(
            "Apollo 15, 16 or 17",
            spacecraft.to_string(),
        )),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApolloDriver;

impl Driver for ApolloDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let groups = ctx.translate(label, &["apollo.trn", "pds_archive.trn"])?;
        let spacecraft = group_value(&groups, "Instrument", "SpacecraftName").unwrap_or_default();
        let frame_code = naif_frame_code(spacecraft)?;

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        ctx.import_primary(&pds, ImportOptions::default(), outputs)?;

        let sink = outputs.sink(OutputRole::Primary)?;
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)?;
        sink.put_naif_keyword("NaifFrameCode", &[frame_code])
    }
}
