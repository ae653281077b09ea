//! MRO Mars Color Imager.
//!
//! ## Overview
//!
//! MARCI is a pushframe camera: each exposure reads a short strip of lines per filter, a
//! *framelet*, and the raw product stacks the framelets of every filter one after the other:
//!
//! ```text
//! framelet 0: filter 0 (height lines), filter 1, ..., filter n-1
//! framelet 1: filter 0, filter 1, ...
//! ```
//!
//! Consecutive framelets overlap on the ground, so they are split into two cubes: the `Even`
//! output holds framelets 0, 2, 4, ... and the `Odd` output holds 1, 3, 5, ..., each with one
//! band per filter and NULL in the framelets of the other output. The framelet height is
//! `16 / SAMPLING_FACTOR` lines.
//!
//! Two options reshape the result:
//! * the color offset shifts band `b` down by `b × offset` framelets, padding with NULL;
//! * the flip mode reverses the lines of every framelet. `AUTO` decides from the correlation of
//!   the first two framelets of the first filter.

use log::{debug, info};
use serde::Deserialize;

use crate::config::FlipMode;
use crate::cube::MemoryCube;
use crate::geometry::pds_geometry::ImageObject;
use crate::geometry::DnRemap;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::{Keyword, Label, PvlContainer};

use super::context::group_mut;
use super::identity::IdentityKey;
use super::post_process::correlation;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "marci",
    keys: &[IdentityKey::new(
        "MARS_RECONNAISSANCE_ORBITER",
        Some("MARCI"),
        None,
    )],
    allowed: &[ImageObject::Image],
    description: "an MRO MARCI EDR",
};

pub const FILTER_FILE: &str = "marci_filters.csv";

/// Lines of an unsummed framelet.
pub const FULL_FRAMELET_HEIGHT: usize = 16;

/// Largest DN of the expanded square-root encoding.
pub const SQROOT_MAX: f64 = 4095.0;

/// One row of the MARCI filter table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarciFilter {
    pub filter: String,
    pub center: f64,
    pub width: f64,
    pub naif_ik_code: i32,
    pub channel: String,
}

/// How the raw framelets are laid out and where they go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameletLayout {
    pub filters: usize,
    pub height: usize,
    pub framelets: usize,
    /// Framelets each successive band is shifted down by.
    pub color_offset: usize,
}

impl FrameletLayout {
    /// Layout of `lines` raw lines holding `filters` filters summed by `summing`.
    pub fn new(
        lines: usize,
        filters: usize,
        summing: usize,
        color_offset: usize,
    ) -> Result<Self, IngestError> {
        if summing == 0 || FULL_FRAMELET_HEIGHT % summing != 0 {
            return Err(IngestError::unsupported(format!(
                "MARCI sampling factor {summing}"
            )));
        }
        if filters == 0 {
            return Err(IngestError::missing("FILTER_NAME"));
        }
        let height = FULL_FRAMELET_HEIGHT / summing;
        let stride = filters * height;
        if lines == 0 || lines % stride != 0 {
            return Err(IngestError::InvalidGeometry(format!(
                "{lines} lines is not a whole number of {filters}-filter framelets of {height} lines"
            )));
        }
        Ok(FrameletLayout {
            filters,
            height,
            framelets: lines / stride,
            color_offset,
        })
    }

    /// Lines of each output cube.
    pub fn output_lines(&self) -> usize {
        (self.framelets + self.color_offset * (self.filters - 1)) * self.height
    }

    /// First raw line of `framelet` for `filter`.
    pub fn raw_line(&self, framelet: usize, filter: usize) -> usize {
        (framelet * self.filters + filter) * self.height
    }

    /// First output line of `framelet` in band `filter`.
    pub fn output_line(&self, framelet: usize, filter: usize) -> usize {
        (framelet + filter * self.color_offset) * self.height
    }
}

/// Whether framelets should be flipped, from the first two framelets of the first filter of `raw`.
///
/// The last line of framelet 0 is correlated with the first and the last line of framelet 1;
/// the framelets are upside down when the last line matches better.
pub fn detect_flip(raw: &MemoryCube, layout: &FrameletLayout) -> bool {
    if layout.framelets < 2 {
        return false;
    }
    let last_of_first = raw.line(layout.raw_line(0, 0) + layout.height - 1, 0);
    let next = layout.raw_line(1, 0);
    let with_first = correlation(last_of_first, raw.line(next, 0));
    let with_last = correlation(last_of_first, raw.line(next + layout.height - 1, 0));
    debug!("Framelet correlation: first line {with_first:?}, last line {with_last:?}");
    match (with_first, with_last) {
        (Some(first), Some(last)) => last > first,
        _ => false,
    }
}

/// Split the single band `raw` cube into its even and odd framelet cubes.
pub fn split_framelets(
    raw: &MemoryCube,
    layout: &FrameletLayout,
    flip: bool,
) -> (MemoryCube, MemoryCube) {
    let shape = || {
        MemoryCube::with_size(
            raw.samples(),
            layout.output_lines(),
            layout.filters,
            raw.pixel_type(),
        )
    };
    let (mut even, mut odd) = (shape(), shape());
    for framelet in 0..layout.framelets {
        let out = if framelet % 2 == 0 { &mut even } else { &mut odd };
        for filter in 0..layout.filters {
            let source = layout.raw_line(framelet, filter);
            let target = layout.output_line(framelet, filter);
            for row in 0..layout.height {
                let from = if flip { layout.height - 1 - row } else { row };
                out.line_mut(target + row, filter)
                    .copy_from_slice(raw.line(source + from, 0));
            }
        }
    }
    (even, odd)
}

/// `BandBin` group of `filters`, with the NAIF instrument code they share.
pub fn band_bin(
    names: &[String],
    table: &[MarciFilter],
) -> Result<(PvlContainer, i32), IngestError> {
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let row = table
            .iter()
            .find(|r| r.filter.eq_ignore_ascii_case(name))
            .ok_or_else(|| IngestError::NoTranslation {
                rule: "FilterName".into(),
                value: name.clone(),
            })?;
        rows.push(row);
    }
    let Some(code) = rows.first().map(|r| r.naif_ik_code) else {
        return Err(IngestError::missing("FILTER_NAME"));
    };
    if rows.iter().any(|r| r.naif_ik_code != code) {
        return Err(IngestError::unsupported(
            "MARCI product mixing visible and ultraviolet filters",
        ));
    }

    let mut group = PvlContainer::new_group("BandBin");
    group.add_keyword(Keyword::sequence("FilterName", rows.iter().map(|r| r.filter.clone())));
    let mut center = Keyword::sequence("Center", rows.iter().map(|r| r.center.to_string()));
    center.set_units("micrometers");
    group.add_keyword(center);
    let mut width = Keyword::sequence("Width", rows.iter().map(|r| r.width.to_string()));
    width.set_units("micrometers");
    group.add_keyword(width);
    group.add_keyword(Keyword::sequence(
        "OriginalBand",
        (1..=rows.len()).map(|b| b.to_string()),
    ));
    Ok((group, code))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarciDriver;

impl Driver for MarciDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        let mut groups = ctx.translate(label, &["marci.trn", "pds_archive.trn"])?;
        let filters: Vec<String> = label
            .traverse_keyword("FILTER_NAME")
            .ok_or_else(|| IngestError::missing("FILTER_NAME"))?
            .texts()
            .map(str::to_string)
            .collect();
        let summing = label
            .traverse_keyword("SAMPLING_FACTOR")
            .map(|k| k.as_usize())
            .transpose()?
            .unwrap_or(1);
        let table = ctx.library.records::<MarciFilter>(FILTER_FILE)?;
        let (band_bin, ik_code) = band_bin(&filters, &table)?;
        groups.put_container(band_bin);

        let mut pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        pds.geometry = pds
            .geometry
            .to_builder()
            .dn_remap(Some(DnRemap::sqrt_inverse(SQROOT_MAX)))
            .build()?;
        let g = &pds.geometry;
        let layout = FrameletLayout::new(g.lines(), filters.len(), summing, ctx.config.color_offset)?;
        debug!("MARCI layout {layout:?}");

        let mut raw = MemoryCube::with_size(g.samples(), g.lines(), 1, g.output_pixel_type());
        ctx.import_pixels(&pds, DriverContext::layout(&pds), ImportOptions::default(), &mut raw)?;
        let flip = match ctx.config.flip {
            FlipMode::Yes => true,
            FlipMode::No => false,
            FlipMode::Auto => detect_flip(&raw, &layout),
        };
        info!(
            "Splitting {} framelets of {} filters{}",
            layout.framelets,
            layout.filters,
            if flip { ", flipped" } else { "" }
        );
        let (even, odd) = split_framelets(&raw, &layout, flip);
        let tables = ctx.import_tables(label);

        for (role, cube, framelets) in [
            (OutputRole::Even, even, "Even"),
            (OutputRole::Odd, odd, "Odd"),
        ] {
            let mut role_groups = groups.clone();
            let instrument = group_mut(&mut role_groups, "Instrument");
            instrument.set_keyword(Keyword::new("Framelets", framelets));
            instrument.set_keyword(Keyword::new("DataFlipped", if flip { "Yes" } else { "No" }));

            let path = outputs.path(role);
            let sink = outputs.sink(role)?;
            cube.write_to(sink, &path, 0..cube.bands())?;
            for table in &tables {
                sink.write_table(table.clone())?;
            }
            ctx.finish(label, &role_groups, sink)?;
            sink.put_naif_keyword("NaifIkCode", &[ik_code.to_string()])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_marci {
    use super::*;
    use crate::constants::NULL8;
    use crate::geometry::CubePixelType;
    use crate::translation::TranslationLibrary;

    /// Raw cube whose samples hold `1000 × framelet + 100 × filter + row`.
    fn raw_cube(layout: &FrameletLayout, samples: usize) -> MemoryCube {
        let lines = layout.framelets * layout.filters * layout.height;
        let mut raw = MemoryCube::with_size(samples, lines, 1, CubePixelType::S16);
        for line in 0..lines {
            let framelet = line / (layout.filters * layout.height);
            let filter = (line / layout.height) % layout.filters;
            let row = line % layout.height;
            raw.line_mut(line, 0)
                .fill((1000 * framelet + 100 * filter + row) as f64);
        }
        raw
    }

    #[test]
    fn test_layout() {
        let layout = FrameletLayout::new(5 * 8 * 3, 5, 2, 0).unwrap();
        assert_eq!(layout.height, 8);
        assert_eq!(layout.framelets, 3);
        assert_eq!(layout.output_lines(), 24);

        assert!(FrameletLayout::new(5 * 8 * 3 + 1, 5, 2, 0).is_err());
        assert_eq!(
            FrameletLayout::new(16, 1, 3, 0).unwrap_err().kind(),
            "UnsupportedProduct"
        );
        assert_eq!(FrameletLayout::new(80, 5, 1, 1).unwrap().output_lines(), 16 + 4 * 16);
    }

    #[test]
    fn test_split_even_odd() {
        let layout = FrameletLayout::new(2 * 4 * 3, 2, 4, 0).unwrap();
        let raw = raw_cube(&layout, 3);
        let (even, odd) = split_framelets(&raw, &layout, false);

        assert_eq!((even.lines(), even.bands()), (12, 2));
        assert_eq!(even.get(0, 0, 0), 0.0);
        assert_eq!(even.get(0, 3, 1), 103.0);
        assert_eq!(even.get(0, 4, 0), NULL8);
        assert_eq!(even.get(0, 8, 1), 2100.0);
        assert_eq!(odd.get(2, 5, 0), 1001.0);
        assert_eq!(odd.get(2, 0, 0), NULL8);
    }

    #[test]
    fn test_split_flipped_with_offset() {
        let layout = FrameletLayout::new(2 * 4 * 2, 2, 4, 1).unwrap();
        let raw = raw_cube(&layout, 1);
        let (even, odd) = split_framelets(&raw, &layout, true);

        assert_eq!(even.lines(), 12);
        assert_eq!(even.get(0, 0, 0), 3.0);
        assert_eq!(even.get(0, 3, 0), 0.0);
        assert_eq!(even.get(0, 0, 1), NULL8);
        assert_eq!(even.get(0, 4, 1), 103.0);
        assert_eq!(odd.get(0, 8, 1), 1103.0);
    }

    #[test]
    fn test_detect_flip() {
        let layout = FrameletLayout::new(2 * 4, 1, 4, 0).unwrap();
        let mut raw = MemoryCube::with_size(4, 8, 1, CubePixelType::S16);
        let pattern = [1.0, 5.0, 2.0, 8.0];
        let other = [7.0, 1.0, 6.0, 2.0];
        for line in 0..8 {
            raw.line_mut(line, 0).copy_from_slice(&other);
        }
        raw.line_mut(3, 0).copy_from_slice(&pattern);
        raw.line_mut(4, 0).copy_from_slice(&[3.0, 3.0, 1.0, 9.0]);
        raw.line_mut(7, 0).copy_from_slice(&pattern);
        assert!(detect_flip(&raw, &layout));

        raw.line_mut(4, 0).copy_from_slice(&pattern);
        raw.line_mut(7, 0).copy_from_slice(&[3.0, 3.0, 1.0, 9.0]);
        assert!(!detect_flip(&raw, &layout));

        let single = FrameletLayout::new(4, 1, 4, 0).unwrap();
        assert!(!detect_flip(&raw, &single));
    }

    #[test]
    fn test_band_bin() {
        let table = TranslationLibrary::builtin()
            .records::<MarciFilter>(FILTER_FILE)
            .unwrap();
        let names: Vec<String> = ["BLUE", "RED"].iter().map(|s| s.to_string()).collect();
        let (group, code) = band_bin(&names, &table).unwrap();
        assert_eq!(code, -74410);
        assert_eq!(group.keyword("Center").unwrap().get_f64(1).unwrap(), 0.65);
        assert_eq!(group.keyword("Center").unwrap().units(0), Some("micrometers"));

        let uv: Vec<String> = vec!["SHORT_UV".into()];
        assert_eq!(band_bin(&uv, &table).unwrap().1, -74420);

        let mixed: Vec<String> = vec!["BLUE".into(), "LONG_UV".into()];
        assert!(band_bin(&mixed, &table).is_err());
        let unknown: Vec<String> = vec!["PURPLE".into()];
        assert_eq!(band_bin(&unknown, &table).unwrap_err().kind(), "NoTranslation");
        assert_eq!(
            band_bin(&[], &table).unwrap_err(),
            IngestError::missing("FILTER_NAME")
        );
    }
}
