//! MRO Context Camera EDR.
//!
//! CTX lines carry dark reference pixels before and after the imaging pixels, fewer when the line
//! is summed. They are stripped from the image and kept as the `CtxPrefixDark` and
//! `CtxSuffixDark` tables, one row per line. Pixels are square-root companded 8-bit values,
//! expanded to 12-bit DNs.

use log::debug;

use crate::geometry::pds_geometry::ImageObject;
use crate::geometry::DnRemap;
use crate::import::{ImportOptions, SideBuffers};
use crate::ingest_errors::IngestError;
use crate::label::{Keyword, Label};
use crate::table::{Field, FieldType, FieldValue, Table};

use super::context::{group_mut, group_value};
use super::identity::IdentityKey;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "ctx",
    keys: &[IdentityKey::new(
        "MARS_RECONNAISSANCE_ORBITER",
        Some("CTX"),
        Some("EDR"),
    )],
    allowed: &[ImageObject::Image],
    description: "an MRO CTX EDR",
};

pub const NAIF_FRAME_CODE: &str = "-74021";

/// Largest DN of the expanded square-root encoding.
pub const SQROOT_MAX: f64 = 4095.0;

/// Dark pixel layout of a CTX line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtxLayout {
    pub summing: u64,
    pub prefix: u64,
    pub suffix: u64,
    /// Unused byte after the suffix of lines starting at the first detector pixel.
    pub pad: u64,
    pub samples: usize,
}

impl CtxLayout {
    /// Layout of lines of `line_samples` bytes at `summing` starting at `first_pixel`.
    pub fn new(line_samples: usize, summing: u64, first_pixel: i64) -> Result<Self, IngestError> {
        if summing != 1 && summing != 2 {
            return Err(IngestError::unsupported(format!(
                "CTX spatial summing {summing}; only 1 and 2 are supported"
            )));
        }
        let prefix = 14 / summing;
        let suffix = 18 / summing;
        let pad = u64::from(first_pixel == 0);
        let dark = (prefix + suffix + pad) as usize;
        if line_samples <= dark {
            return Err(IngestError::InvalidGeometry(format!(
                "CTX line of {line_samples} samples holds no image pixels"
            )));
        }
        Ok(CtxLayout {
            summing,
            prefix,
            suffix,
            pad,
            samples: line_samples - dark,
        })
    }
}

/// One-row-per-line table of the dark pixels in `runs`, decoded through `remap`.
pub fn dark_table(name: &str, runs: &[Vec<u8>], width: usize, remap: &DnRemap) -> Table {
    let mut table = Table::new(name, vec![Field::array("DarkPixels", FieldType::Integer, width)])
        .with_keyword(Keyword::new("Association", "Lines"));
    for run in runs {
        let values = run
            .iter()
            .take(width)
            .map(|b| remap.apply(f64::from(*b)) as i64)
            .collect();
        table.push(vec![FieldValue::Integers(values)]);
    }
    table
}

fn dark_tables(side: &SideBuffers, layout: &CtxLayout, remap: &DnRemap) -> Vec<Table> {
    vec![
        dark_table("CtxPrefixDark", &side.prefixes, layout.prefix as usize, remap),
        dark_table("CtxSuffixDark", &side.suffixes, layout.suffix as usize, remap),
    ]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CtxDriver;

impl Driver for CtxDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let mut groups = ctx.translate(label, &["ctx.trn", "pds_archive.trn"])?;
        let bit_mode = group_value(&groups, "Instrument", "SampleBitModeId").unwrap_or_default();
        if !bit_mode.eq_ignore_ascii_case("SQROOT") {
            return Err(IngestError::unsupported(format!(
                "CTX SAMPLE_BIT_MODE_ID [{bit_mode}]; only SQROOT is supported"
            )));
        }
        let instrument = group_mut(&mut groups, "Instrument");
        let summing = instrument.require("SpatialSumming")?.as_usize()? as u64;
        let first_pixel = instrument.require("SampleFirstPixel")?.as_i64()?;

        let mut pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        let layout = CtxLayout::new(pds.geometry.samples(), summing, first_pixel)?;
        debug!("CTX layout {layout:?}");
        let remap = DnRemap::sqrt_inverse(SQROOT_MAX);
        pds.geometry = pds
            .geometry
            .to_builder()
            .samples(layout.samples)
            .data_prefix_bytes(layout.prefix)
            .data_suffix_bytes(layout.suffix + layout.pad)
            .dn_remap(Some(remap.clone()))
            .build()?;

        let options = ImportOptions::default()
            .with_prefixes(true)
            .with_suffixes(true);
        let summary = ctx.import_primary(&pds, options, outputs)?;

        let band_bin = group_mut(&mut groups, "BandBin");
        band_bin.set_keyword(Keyword::new("FilterName", "BroadBand"));
        band_bin.set_keyword(Keyword::with_units("Center", "0.650", "micrometers"));
        band_bin.set_keyword(Keyword::with_units("Width", "0.150", "micrometers"));

        let sink = outputs.sink(OutputRole::Primary)?;
        for table in dark_tables(&summary.side, &layout, &remap) {
            sink.write_table(table)?;
        }
        ctx.write_tables(label, sink)?;
        ctx.finish(label, &groups, sink)?;
        sink.put_naif_keyword("NaifFrameCode", &[NAIF_FRAME_CODE.to_string()])
    }
}
