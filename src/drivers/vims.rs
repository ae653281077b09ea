//! Cassini VIMS qubes.
//!
//! ## Overview
//!
//! A VIMS qube holds both spectrometer channels: bands 1 to 96 are the visible channel, 97 to
//! 352 the infrared one. The qube is imported whole into memory (through the sideplane reader of
//! [`crate::import::vims`] when the qube has suffix planes), then each channel that was operating
//! (its `SAMPLING_MODE_ID` is not `N/A`) is written to its own cube with its own `Instrument`,
//! `BandBin` and `Kernels` groups.

use std::ops::Range;

use log::info;

use crate::cube::{CubeSink, MemoryCube};
use crate::geometry::pds_geometry::{ImageObject, PdsGeometry};
use crate::import::vims::VIS_BANDS;
use crate::import::{ImportOptions, LayoutPolicy};
use crate::ingest_errors::IngestError;
use crate::label::{ContainerKind, Keyword, Label, PvlContainer, PvlValue};

use super::context::group_mut;
use super::generic::strip_time_zone;
use super::identity::IdentityKey;
use super::projection::is_projected;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "vims",
    keys: &[IdentityKey::new("CASSINI", Some("VIMS"), None)],
    allowed: &[ImageObject::Qube],
    description: "a Cassini VIMS qube",
};

/// Bands of a full VIMS qube.
pub const TOTAL_BANDS: usize = 352;

const NOT_APPLICABLE: &str = "N/A";

/// One spectrometer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VimsChannel {
    Vis,
    Ir,
}

impl VimsChannel {
    pub const ALL: [VimsChannel; 2] = [VimsChannel::Vis, VimsChannel::Ir];

    pub fn name(self) -> &'static str {
        match self {
            VimsChannel::Vis => "VIS",
            VimsChannel::Ir => "IR",
        }
    }

    /// 0-based bands of the qube.
    pub fn bands(self) -> Range<usize> {
        match self {
            VimsChannel::Vis => 0..VIS_BANDS,
            VimsChannel::Ir => VIS_BANDS..TOTAL_BANDS,
        }
    }

    /// Index of the channel in the `(IR, VIS)` pairs of the label.
    pub fn label_index(self) -> usize {
        match self {
            VimsChannel::Vis => 1,
            VimsChannel::Ir => 0,
        }
    }

    pub fn role(self) -> OutputRole {
        match self {
            VimsChannel::Vis => OutputRole::Vis,
            VimsChannel::Ir => OutputRole::Ir,
        }
    }

    pub fn naif_frame_code(self) -> &'static str {
        match self {
            VimsChannel::Vis => "-82370",
            VimsChannel::Ir => "-82371",
        }
    }
}

/// Channels whose sampling mode is not `N/A`.
pub fn operating_channels(qube: &PvlContainer) -> Result<Vec<VimsChannel>, IngestError> {
    let modes = qube.require("SAMPLING_MODE_ID")?;
    let mut channels = Vec::new();
    for channel in VimsChannel::ALL {
        if modes.get_str(channel.label_index())? != NOT_APPLICABLE {
            channels.push(channel);
        }
    }
    Ok(channels)
}

/// Pixel layout of the qube: the sideplane reader when it carries suffix planes.
pub fn vims_layout(pds: &PdsGeometry) -> LayoutPolicy {
    match pds.suffix_items {
        [0, ..] => DriverContext::layout(pds),
        [sideplane_items, backplane_items, _] => LayoutPolicy::VimsBilWithSideplanes {
            sideplane_items,
            backplane_items,
        },
    }
}

/// Groups of the `channel` cube, added to the translated `base` groups.
pub fn channel_groups(
    qube: &PvlContainer,
    base: &PvlContainer,
    channel: VimsChannel,
) -> Result<PvlContainer, IngestError> {
    let index = channel.label_index();
    let mut groups = base.clone();
    let instrument = group_mut(&mut groups, "Instrument");
    strip_time_zone(instrument, "StartTime");
    strip_time_zone(instrument, "StopTime");
    instrument.set_keyword(Keyword::new(
        "SamplingMode",
        qube.require("SAMPLING_MODE_ID")?.get_str(index)?.to_string(),
    ));
    instrument.set_keyword(Keyword::new("Channel", channel.name()));
    let exposure = qube.require("EXPOSURE_DURATION")?;
    let mut duration = Keyword::new(
        "ExposureDuration",
        PvlValue::with_units(exposure.get_str(0)?.to_string(), "IR"),
    );
    duration.push(PvlValue::with_units(exposure.get_str(1)?.to_string(), "VIS"));
    instrument.set_keyword(duration);
    if let Some(gain) = qube.keyword("GAIN_MODE_ID") {
        instrument.set_keyword(Keyword::new("GainMode", gain.get_str(index)?.to_string()));
    }

    let bands = channel.bands();
    let centers = qube
        .find_group("BAND_BIN")
        .ok_or_else(|| IngestError::missing("BAND_BIN"))?
        .require("BAND_BIN_CENTER")?;
    let center = bands
        .clone()
        .map(|b| centers.get_str(b).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    let band_bin = group_mut(&mut groups, "BandBin");
    band_bin.set_keyword(Keyword::sequence(
        "OriginalBand",
        bands.map(|b| (b + 1).to_string()),
    ));
    band_bin.set_keyword(Keyword::sequence("Center", center));
    Ok(groups)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VimsDriver;

impl Driver for VimsDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        if is_projected(label) {
            return Err(IngestError::wrong_product(
                "an unprojected VIMS qube",
                "a map-projected product; import it with the pds driver",
            ));
        }
        let qube = label
            .traverse_container("QUBE", Some(ContainerKind::Object))
            .ok_or_else(|| IngestError::missing("QUBE"))?;
        let channels = operating_channels(qube)?;
        if channels.is_empty() {
            return Err(IngestError::unsupported(
                "VIMS qube with neither channel operating",
            ));
        }
        let base = ctx.translate(label, &["vims.trn"])?;

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        let g = &pds.geometry;
        if g.bands() < TOTAL_BANDS {
            return Err(IngestError::InvalidGeometry(format!(
                "VIMS qube of {} bands, expected {TOTAL_BANDS}",
                g.bands()
            )));
        }
        let mut qube_cube = MemoryCube::new();
        let scratch = outputs.path(channels[0].role());
        qube_cube.create(&scratch, g.samples(), g.lines(), g.bands(), g.output_pixel_type())?;
        ctx.import_pixels(&pds, vims_layout(&pds), ImportOptions::default(), &mut qube_cube)?;

        for channel in VimsChannel::ALL {
            info!(
                "{}Created = {}",
                if channel == VimsChannel::Vis { "Vis" } else { "Ir" },
                channels.contains(&channel)
            );
        }
        let tables = ctx.import_tables(label);
        for channel in channels {
            let groups = channel_groups(qube, &base, channel)?;
            let role = channel.role();
            let path = outputs.path(role);
            let sink = outputs.sink(role)?;
            qube_cube.write_to(sink, &path, channel.bands())?;
            for table in &tables {
                sink.write_table(table.clone())?;
            }
            ctx.finish(label, &groups, sink)?;
            sink.put_naif_keyword("NaifFrameCode", &[channel.naif_frame_code().to_string()])?;
        }
        Ok(())
    }
}
