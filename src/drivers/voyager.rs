//! Voyager 1 and 2 imaging science subsystem.
//!
//! ## Overview
//!
//! Archive products are often compressed (`.IMQ`); they are expanded by the decompressor
//! collaborator into the scratch directory first. Their labels need textual repairs before they
//! parse: open comments, an empty `INSTRUMENT_NAME` and a corrupted `IMAGE_ID`.
//!
//! The label `IMAGE_TIME` is only good to the second. The start time is recomputed from the image
//! number (the FDS count) through the spacecraft clock, which needs the SPICE collaborator.
//!
//! The pixels are always imported. A label that cannot be translated leaves the cube without
//! its groups and is reported as a warning.

use camino::Utf8PathBuf;
use log::info;

use crate::geometry::pds_geometry::ImageObject;
use crate::import::ImportOptions;
use crate::ingest_errors::IngestError;
use crate::label::fixups::{hash_open_comments, voyager_label_repairs};
use crate::label::{parse_label, Keyword, Label, PvlContainer};

use super::context::{group_mut, group_value};
use super::generic::strip_time_zone;
use super::identity::IdentityKey;
use super::{Driver, DriverConfig, DriverContext, OutputRole, OutputSet};

static CONFIG: DriverConfig = DriverConfig {
    name: "voyager",
    keys: &[IdentityKey::new("VOYAGER", None, None)],
    allowed: &[ImageObject::Image],
    description: "a Voyager ISS raw image",
};

pub const RESEAU_FILE: &str = "voyager_reseaus.pvl";
pub const RAW_PRODUCT: &str = "DECOMPRESSED_RAW_IMAGE";
pub const NARROW: &str = "NARROW_ANGLE_CAMERA";
pub const WIDE: &str = "WIDE_ANGLE_CAMERA";

/// Shutter modes in which a wide angle image number is the readout count.
const SIMULTANEOUS_SHUTTER: [&str; 2] = ["BOTSIM", "BSIMAN"];

/// Which Voyager and which camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoyagerIss {
    /// 1 or 2.
    pub spacecraft: u8,
    pub wide: bool,
}

impl VoyagerIss {
    pub fn new(spacecraft: &str, instrument: &str) -> Result<Self, IngestError> {
        let spacecraft = match spacecraft {
            "VOYAGER_1" => 1,
            "VOYAGER_2" => 2,
            other => {
                return Err(IngestError::wrong_product(
                    "VOYAGER_1 or VOYAGER_2",
                    other.to_string(),
                ))
            }
        };
        let wide = match instrument {
            NARROW => false,
            WIDE => true,
            other => {
                return Err(IngestError::unsupported(format!(
                    "Voyager instrument [{other}]; select the narrow or wide angle camera to \
                     translate the labels"
                )))
            }
        };
        Ok(VoyagerIss { spacecraft, wide })
    }

    pub fn naif_frame_code(&self) -> String {
        format!("-3{}10{}", self.spacecraft, if self.wide { 2 } else { 1 })
    }

    /// NAIF id of the spacecraft clock.
    pub fn clock_id(&self) -> i32 {
        -30 - i32::from(self.spacecraft)
    }

    /// `issna` or `isswa`.
    pub fn short_name(&self) -> &'static str {
        if self.wide {
            "isswa"
        } else {
            "issna"
        }
    }

    pub fn band_bin_table(&self) -> &'static str {
        if self.wide {
            "voyager_wa_bandbin.trn"
        } else {
            "voyager_na_bandbin.trn"
        }
    }
}

/// `CameraState1` and `CameraState2` of an image.
pub fn camera_states(scan_mode: &str, shutter_mode: &str, wide: bool) -> (String, String) {
    let state1 = scan_mode.split(':').next().unwrap_or_default().trim().to_string();
    let state2 = if wide && SIMULTANEOUS_SHUTTER.contains(&shutter_mode) {
        "1"
    } else {
        "0"
    };
    (state1, state2.to_string())
}

/// FDS count of the shutter event: the image number without its period, minus the scan mode for
/// wide angle images shuttered with the narrow angle camera.
pub fn shutter_image_number(
    clock_count: &str,
    scan_mode: &str,
    shutter_mode: &str,
    wide: bool,
) -> Result<String, IngestError> {
    let number = clock_count.replace('.', "");
    if !(wide && SIMULTANEOUS_SHUTTER.contains(&shutter_mode)) {
        return Ok(number);
    }
    let invalid = |value: &str| IngestError::InvalidValue {
        keyword: "IMAGE_NUMBER".into(),
        value: value.to_string(),
        reason: "not a number".into(),
    };
    let image: i64 = number.parse().map_err(|_| invalid(&number))?;
    let scan: i64 = scan_mode
        .get(..1)
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| invalid(scan_mode))?;
    Ok((image - scan).to_string())
}

/// Spacecraft clock string of `image_number` in the partition of `approximate`.
pub fn shutter_clock(approximate: &str, image_number: &str) -> String {
    let partition = approximate.get(..2).unwrap_or(approximate);
    let digits = |range: std::ops::Range<usize>| image_number.get(range).unwrap_or_default();
    format!("{partition}{}:{}", digits(0..5), digits(5..7))
}

/// `Reseaus` group of `camera` from the nominal positions in `nominal`.
pub fn reseaus_group(nominal: &PvlContainer, camera: &VoyagerIss) -> Result<PvlContainer, IngestError> {
    let prefix = format!("VG{}_{}", camera.spacecraft, camera.short_name().to_ascii_uppercase());
    let count = nominal.require(&format!("{prefix}_NUMBER_RESEAUS"))?.as_usize()?;
    let triplets = nominal.require(&format!("{prefix}_RESEAUS"))?;
    if triplets.len() < count * 3 {
        return Err(IngestError::InvalidValue {
            keyword: triplets.name.clone(),
            value: triplets.len().to_string(),
            reason: format!("expected {} values", count * 3),
        });
    }
    let texts: Vec<&str> = triplets.texts().collect();
    let texts = &texts;
    let column = |offset: usize| (0..count).map(move |i| texts[3 * i + offset].to_string());

    let mut group = PvlContainer::new_group("Reseaus");
    group.add_keyword(Keyword::sequence("Line", column(0)));
    group.add_keyword(Keyword::sequence("Sample", column(1)));
    group.add_keyword(Keyword::sequence("Type", column(2)));
    group.add_keyword(Keyword::sequence("Valid", (0..count).map(|_| "0")));
    group.add_keyword(Keyword::new(
        "Template",
        format!(
            "$voyager{n}/reseaus/vg{n}.{}.template.cub",
            camera.short_name(),
            n = camera.spacecraft
        ),
    ));
    group.add_keyword(Keyword::new("Status", "Nominal"));
    Ok(group)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoyagerDriver;

impl VoyagerDriver {
    /// Expand a compressed product into the scratch directory and read from there.
    fn decompress(ctx: &mut DriverContext) -> Result<(), IngestError> {
        let stem = ctx.input.file_stem().unwrap_or("voyager").to_string();
        let output: Utf8PathBuf = ctx.scratch_dir()?.join(format!("{stem}.img"));
        ctx.decompressor()?.decompress(&ctx.input, &output)?;
        info!("Decompressed [{}] into [{output}]", ctx.input);
        ctx.input = output;
        Ok(())
    }

    fn groups(
        ctx: &mut DriverContext,
        label: &Label,
    ) -> Result<(PvlContainer, VoyagerIss), IngestError> {
        let mut groups = ctx.translate(label, &["voyager.trn"])?;
        let value = |name: &str| -> Result<String, IngestError> {
            group_value(&groups, "Instrument", name)
                .map(str::to_string)
                .ok_or_else(|| IngestError::missing(name))
        };
        let camera = VoyagerIss::new(&value("SpacecraftName")?, &value("InstrumentId")?)?;
        let scan_mode = value("ScanModeId")?;
        let shutter_mode = value("ShutterModeId")?;
        let image_number = shutter_image_number(
            &value("SpacecraftClockCount")?,
            &scan_mode,
            &shutter_mode,
            camera.wide,
        )?;
        ctx.translate_into(label, &[camera.band_bin_table()], &mut groups)?;

        let instrument = group_mut(&mut groups, "Instrument");
        let (state1, state2) = camera_states(&scan_mode, &shutter_mode, camera.wide);
        instrument.set_keyword(Keyword::new("CameraState1", state1));
        instrument.set_keyword(Keyword::new("CameraState2", state2));
        if let Some(exposure) = instrument.keyword_mut("ExposureDuration") {
            exposure.set_units("seconds");
        }
        strip_time_zone(instrument, "StartTime");
        let clock_count = instrument.require("SpacecraftClockCount")?.as_str()?.replace('.', "");
        instrument.set_keyword(Keyword::new("SpacecraftClockCount", clock_count));

        let band_bin = group_mut(&mut groups, "BandBin");
        for name in ["Center", "Width"] {
            if let Some(keyword) = band_bin.keyword_mut(name) {
                keyword.set_units("micrometers");
            }
        }

        match ctx.spice("compute the Voyager start time") {
            Ok(spice) => {
                let instrument = group_mut(&mut groups, "Instrument");
                let label_time = instrument.require("StartTime")?.as_str()?.to_string();
                let approximate = spice.et_to_sclk(camera.clock_id(), spice.utc_to_et(&label_time)?)?;
                let sclk = shutter_clock(&approximate, &image_number);
                let et = spice.sclk_to_et(camera.clock_id(), &sclk)?;
                instrument.set_keyword(Keyword::new("StartTime", spice.et_to_utc(et, 3)?));
            }
            Err(e) => ctx.warn(format!("StartTime kept from the label: {e}")),
        }

        let nominal = parse_label(ctx.library.text(RESEAU_FILE)?.as_bytes())?;
        groups.put_container(reseaus_group(&nominal, &camera)?);
        Ok((groups, camera))
    }
}

impl Driver for VoyagerDriver {
    fn config(&self) -> &'static DriverConfig {
        &CONFIG
    }

    fn read_label(&self, ctx: &mut DriverContext) -> Result<Label, IngestError> {
        let compressed = ctx
            .input
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("IMQ"));
        if compressed {
            Self::decompress(ctx)?;
        }
        let file = ctx.input.clone();
        let camera = ctx.config.camera;
        let mut repairs = Vec::new();
        let label = ctx.read_label_with(|text| {
            let (repaired, warnings) = voyager_label_repairs(&hash_open_comments(text), &file, camera);
            repairs = warnings;
            repaired
        })?;
        ctx.warnings.extend(repairs);
        Ok(label)
    }

    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        if let Some(product_type) = label.keyword("PRODUCT_TYPE") {
            let product_type = product_type.as_str()?;
            if !product_type.eq_ignore_ascii_case(RAW_PRODUCT) {
                return Err(IngestError::unsupported(format!(
                    "Voyager product type [{product_type}]; only {RAW_PRODUCT} is supported"
                )));
            }
        }

        let pds = ctx.pds_geometry(label, CONFIG.allowed)?;
        ctx.import_primary(&pds, ImportOptions::default(), outputs)?;
        let translated = match Self::groups(ctx, label) {
            Ok(translated) => Some(translated),
            Err(e) => {
                let source = ctx.source.clone();
                ctx.warn(format!(
                    "The cube of [{source}] was created but its labels were not translated: {e}"
                ));
                None
            }
        };

        let sink = outputs.sink(OutputRole::Primary)?;
        ctx.write_tables(label, sink)?;
        match translated {
            Some((groups, camera)) => {
                ctx.finish(label, &groups, sink)?;
                sink.put_naif_keyword("NaifFrameCode", &[camera.naif_frame_code()])
            }
            None => ctx.finish(label, &PvlContainer::root(), sink),
        }
    }
}

#[cfg(test)]
mod test_voyager {
    use super::*;
    use crate::translation::TranslationLibrary;

    #[test]
    fn test_camera() {
        let camera = VoyagerIss::new("VOYAGER_2", WIDE).unwrap();
        assert_eq!(camera.naif_frame_code(), "-32102");
        assert_eq!(camera.clock_id(), -32);
        assert_eq!(VoyagerIss::new("VOYAGER_1", NARROW).unwrap().naif_frame_code(), "-31101");
        assert_eq!(
            VoyagerIss::new("VOYAGER_1", "Unknown").unwrap_err().kind(),
            "UnsupportedProduct"
        );
        assert_eq!(
            VoyagerIss::new("MARINER_10", NARROW).unwrap_err().kind(),
            "WrongProduct"
        );
    }

    #[test]
    fn test_camera_states() {
        assert_eq!(camera_states("3:1", "BOTSIM", true), ("3".into(), "1".into()));
        assert_eq!(camera_states("1:1", "BOTSIM", false), ("1".into(), "0".into()));
        assert_eq!(camera_states("1:1", "NAONLY", true), ("1".into(), "0".into()));
    }

    #[test]
    fn test_shutter_image_number() {
        assert_eq!(
            shutter_image_number("16368.48", "1:1", "NAONLY", false).unwrap(),
            "1636848"
        );
        assert_eq!(
            shutter_image_number("16368.48", "3:1", "BSIMAN", true).unwrap(),
            "1636845"
        );
        assert_eq!(shutter_clock("2/1636845:00", "1636845"), "2/16368:45");
    }

    #[test]
    fn test_reseaus_group() {
        let text = TranslationLibrary::builtin().text(RESEAU_FILE).unwrap();
        let nominal = parse_label(text.as_bytes()).unwrap();
        let camera = VoyagerIss::new("VOYAGER_1", NARROW).unwrap();
        let group = reseaus_group(&nominal, &camera).unwrap();

        let count = nominal.require("VG1_ISSNA_NUMBER_RESEAUS").unwrap().as_usize().unwrap();
        assert_eq!(group.keyword("Line").unwrap().len(), count);
        assert_eq!(group.keyword("Type").unwrap().get_str(0).unwrap(), "1");
        assert!(group.keyword("Valid").unwrap().texts().all(|v| v == "0"));
        assert_eq!(
            group.keyword("Template").unwrap().as_str().unwrap(),
            "$voyager1/reseaus/vg1.issna.template.cub"
        );
    }
}
