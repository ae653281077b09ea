//! `Mapping` group of map-projected products.
//!
//! The keywords of `IMAGE_MAP_PROJECTION` are read through `pds_projection.trn`, then normalized:
//! radii in meters, resolution in meters per pixel, longitudes ordered for their direction and
//! domain, and the upper-left corner computed from the projection offsets.

use log::debug;

use crate::ingest_errors::IngestError;
use crate::label::keyword::parse_pds_real;
use crate::label::{Keyword, PvlContainer};
use crate::translation::{TranslationLibrary, Translator};

pub const PROJECTION_TABLE: &str = "pds_projection.trn";

/// Object holding the projection keywords of a PDS label.
pub const PROJECTION_OBJECT: &str = "IMAGE_MAP_PROJECTION";

/// Conversion from projection offsets (line, sample) to the projection x/y of the upper-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionOffsets {
    pub x_mult: f64,
    pub y_mult: f64,
    pub x_off: f64,
    pub y_off: f64,
}

impl Default for ProjectionOffsets {
    fn default() -> Self {
        ProjectionOffsets {
            x_mult: -1.0,
            y_mult: 1.0,
            x_off: -0.5,
            y_off: -0.5,
        }
    }
}

/// True when `label` carries an `IMAGE_MAP_PROJECTION` object at any depth.
pub fn is_projected(label: &PvlContainer) -> bool {
    label.traverse_container(PROJECTION_OBJECT, None).is_some()
        || label.traverse_keyword(&format!("^{PROJECTION_OBJECT}")).is_some()
}

fn number(translator: &Translator, rule: &str) -> Result<f64, IngestError> {
    let text = translator.translate(rule)?;
    parse_pds_real(&text).ok_or_else(|| IngestError::InvalidValue {
        keyword: rule.to_string(),
        value: text,
        reason: "expected a number".into(),
    })
}

/// Value of `rule` when present and numeric.
fn optional_number(translator: &Translator, rule: &str) -> Option<f64> {
    if !translator.input_has_keyword(rule) {
        return None;
    }
    translator
        .translate(rule)
        .ok()
        .and_then(|text| parse_pds_real(&text))
}

fn to_180_domain(longitude: f64) -> f64 {
    let wrapped = longitude.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

fn real(name: &str, value: f64) -> Keyword {
    Keyword::new(name, value.to_string())
}

fn real_with_units(name: &str, value: f64, units: &str) -> Keyword {
    Keyword::with_units(name, value.to_string(), units)
}

/// Translate the map projection of `label` into a `Mapping` group.
///
/// Arguments
/// -----------------
/// * `label`: root of the product label.
/// * `library`: source of `pds_projection.trn`.
/// * `offsets`: line/sample to x/y conversion of the product.
///
/// Return
/// ----------
/// * `None` when the label has no projection, otherwise the group; `MissingKeyword` when the
///   target or a radius is absent.
pub fn mapping_group(
    label: &PvlContainer,
    library: &TranslationLibrary,
    offsets: ProjectionOffsets,
) -> Result<Option<PvlContainer>, IngestError> {
    let table = library.table(PROJECTION_TABLE)?;
    let translator = Translator::new(label, &table);
    if !translator.input_has_keyword("ProjectionName") {
        return Ok(None);
    }

    let projection = translator.translate("ProjectionName")?;
    let target = translator.translate("TargetName")?;
    let equatorial = number(&translator, "EquatorialRadius")? * 1000.0;
    let polar = number(&translator, "PolarRadius")? * 1000.0;

    let direction = if translator.input_has_keyword("LongitudeDirection") {
        translator.translate("LongitudeDirection")?
    } else {
        translator.translate("LongitudeDirectionFromSystem")?
    };
    let latitude_type = if polar == equatorial {
        "Planetocentric".to_string()
    } else {
        translator.translate("LatitudeType")?
    };

    let positive_west = translator.input_has_keyword("EasternmostLongitude")
        || translator.input_has_keyword("WesternmostLongitude");
    let mut min_lon = optional_number(&translator, "EasternmostLongitude")
        .or_else(|| optional_number(&translator, "MinimumLongitude"));
    let mut max_lon = optional_number(&translator, "WesternmostLongitude")
        .or_else(|| optional_number(&translator, "MaximumLongitude"));

    let mut domain = number(&translator, "LongitudeDomain")?;
    if positive_west && direction == "PositiveEast" {
        std::mem::swap(&mut min_lon, &mut max_lon);
    }
    if let (Some(min), Some(max)) = (min_lon, max_lon) {
        if min > max {
            domain = 180.0;
            min_lon = Some(to_180_domain(min));
        }
    }
    if min_lon.is_some_and(|v| v < 0.0) || max_lon.is_some_and(|v| v < 0.0) {
        domain = 180.0;
    }

    let mut resolution = number(&translator, "PixelResolution")?;
    let resolution_units = translator
        .input_keyword("PixelResolution")
        .and_then(|k| k.units(0))
        .map(str::to_ascii_uppercase);
    if !matches!(resolution_units.as_deref(), Some("METERS/PIXEL") | Some("M/PIXEL")) {
        resolution *= 1000.0;
    }

    let line_offset = number(&translator, "LineProjectionOffset")?;
    let sample_offset = number(&translator, "SampleProjectionOffset")?;
    let upper_left_x = offsets.x_mult * (sample_offset + offsets.x_off) * resolution;
    let upper_left_y = offsets.y_mult * (line_offset + offsets.y_off) * resolution;
    debug!(
        "{projection} of {target}: {resolution} m/pixel, upper left ({upper_left_x}, {upper_left_y})"
    );

    let mut group = PvlContainer::new_group("Mapping");
    group.add_keyword(Keyword::new("ProjectionName", projection));
    group.add_keyword(Keyword::new("TargetName", target));
    group.add_keyword(real_with_units("EquatorialRadius", equatorial, "meters"));
    group.add_keyword(real_with_units("PolarRadius", polar, "meters"));
    group.add_keyword(Keyword::new("LongitudeDirection", direction));
    group.add_keyword(Keyword::new("LatitudeType", latitude_type));
    group.add_keyword(Keyword::new("LongitudeDomain", format!("{domain}")));
    if let Some(v) = optional_number(&translator, "MinimumLatitude") {
        group.add_keyword(real("MinimumLatitude", v));
    }
    if let Some(v) = optional_number(&translator, "MaximumLatitude") {
        group.add_keyword(real("MaximumLatitude", v));
    }
    if let Some(v) = min_lon {
        group.add_keyword(real("MinimumLongitude", v));
    }
    if let Some(v) = max_lon {
        group.add_keyword(real("MaximumLongitude", v));
    }
    for name in ["CenterLatitude", "CenterLongitude"] {
        if let Some(v) = optional_number(&translator, name) {
            group.add_keyword(real(name, v));
        }
    }
    group.add_keyword(real_with_units("PixelResolution", resolution, "meters/pixel"));
    if let Some(scale) = optional_number(&translator, "Scale") {
        group.add_keyword(real_with_units("Scale", scale, "pixels/degree"));
    }
    group.add_keyword(real_with_units("UpperLeftCornerX", upper_left_x, "meters"));
    group.add_keyword(real_with_units("UpperLeftCornerY", upper_left_y, "meters"));
    let rotation = number(&translator, "Rotation")?;
    if rotation != 0.0 {
        group.add_keyword(real("Rotation", rotation));
    }
    Ok(Some(group))
}
