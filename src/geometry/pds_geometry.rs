//! # Geometry from a PDS label
//!
//! Reads the raw layout of an `IMAGE`, `QUBE` or `SPECTRAL_QUBE` object through the built-in
//! translation tables `pds_image.trn` and `pds_qube.trn`, and resolves the data pointer
//! (`^IMAGE`, `^QUBE`, ...) to a file and a byte offset.
//!
//! ## Data pointers
//!
//! | Pointer form              | File             | Offset                   |
//! |---------------------------|------------------|--------------------------|
//! | `^IMAGE = 12`             | the label file   | `(12 - 1) · RECORD_BYTES` |
//! | `^IMAGE = 2048 <BYTES>`   | the label file   | `2047`                   |
//! | `^IMAGE = "a.img"`        | `a.img`          | `0`                      |
//! | `^IMAGE = ("a.img", 3)`   | `a.img`          | `2 · RECORD_BYTES`       |
//!
//! `RECORD_BYTES` is taken from the `FILE` object holding the pointer, else from the label root.
//! Detached names are resolved against the label directory, then retried lower-cased.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use super::special_pixel::{SpecialPixel, SpecialRange, SpecialRanges};
use super::{ByteOrder, Calibration, GeometryBuilder, GeometryDescriptor, Organization, PixelType};
use crate::constants::{DEFAULT_RECORD_BYTES, ISIS2_SOURCE_KEYWORD, PDS_VERSION_KEYWORD};
use crate::ingest_errors::IngestError;
use crate::label::keyword::{parse_pds_integer, parse_pds_real};
use crate::label::{ContainerKind, Keyword, Label, PvlContainer};
use crate::translation::{TranslationLibrary, Translator};

/// Top-level objects that hold pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageObject {
    Image,
    Qube,
    SpectralQube,
}

impl ImageObject {
    pub const ALL: [ImageObject; 3] = [
        ImageObject::Image,
        ImageObject::Qube,
        ImageObject::SpectralQube,
    ];

    pub fn object_name(self) -> &'static str {
        match self {
            ImageObject::Image => "IMAGE",
            ImageObject::Qube => "QUBE",
            ImageObject::SpectralQube => "SPECTRAL_QUBE",
        }
    }

    pub fn pointer_name(self) -> &'static str {
        match self {
            ImageObject::Image => "^IMAGE",
            ImageObject::Qube => "^QUBE",
            ImageObject::SpectralQube => "^SPECTRAL_QUBE",
        }
    }

    fn table_name(self) -> &'static str {
        match self {
            ImageObject::Image => "pds_image.trn",
            ImageObject::Qube | ImageObject::SpectralQube => "pds_qube.trn",
        }
    }
}

impl fmt::Display for ImageObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_name())
    }
}

/// Kind of label the product carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pds,
    Isis2,
}

/// Tell a PDS3 label from an ISIS2 cube label.
pub fn detect_source(label: &Label) -> Result<SourceKind, IngestError> {
    if label.has_keyword(PDS_VERSION_KEYWORD) {
        Ok(SourceKind::Pds)
    } else if label.has_keyword(ISIS2_SOURCE_KEYWORD) {
        Ok(SourceKind::Isis2)
    } else {
        Err(IngestError::wrong_product(
            "a PDS3 or ISIS2 label",
            format!("a label without {PDS_VERSION_KEYWORD}"),
        ))
    }
}

/// Where a pointer starts inside its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerStart {
    /// 1-based record.
    Record(u64),
    /// 1-based byte.
    Byte(u64),
    /// Start of the file.
    FileStart,
}

/// A parsed `^NAME` pointer keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPointer {
    pub file: Option<String>,
    pub start: PointerStart,
}

impl DataPointer {
    pub fn parse(keyword: &Keyword) -> Result<Self, IngestError> {
        let start_of = |index: usize| -> Result<PointerStart, IngestError> {
            let value = keyword.get_i64(index)?;
            let value = u64::try_from(value).ok().filter(|v| *v >= 1).ok_or_else(|| {
                IngestError::InvalidValue {
                    keyword: keyword.name.clone(),
                    value: value.to_string(),
                    reason: "pointer start must be at least 1".into(),
                }
            })?;
            let bytes = keyword
                .units(index)
                .is_some_and(|u| u.eq_ignore_ascii_case("BYTES"));
            Ok(if bytes {
                PointerStart::Byte(value)
            } else {
                PointerStart::Record(value)
            })
        };

        match keyword.len() {
            1 => {
                let text = keyword.get_str(0)?;
                if parse_pds_integer(text).is_some() {
                    Ok(DataPointer {
                        file: None,
                        start: start_of(0)?,
                    })
                } else {
                    Ok(DataPointer {
                        file: Some(text.to_string()),
                        start: PointerStart::FileStart,
                    })
                }
            }
            2 => Ok(DataPointer {
                file: Some(keyword.get_str(0)?.to_string()),
                start: start_of(1)?,
            }),
            _ => Err(IngestError::InvalidValue {
                keyword: keyword.name.clone(),
                value: keyword.texts().collect::<Vec<_>>().join(", "),
                reason: "expected a record, a file name, or (file, record)".into(),
            }),
        }
    }

    /// Absolute byte offset of the pointed data in its file.
    pub fn byte_offset(&self, record_bytes: u64) -> u64 {
        match self.start {
            PointerStart::Record(n) => (n - 1) * record_bytes,
            PointerStart::Byte(n) => n - 1,
            PointerStart::FileStart => 0,
        }
    }
}

/// A resolved pointer: the file holding the data and the offset of its first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocation {
    pub file: Utf8PathBuf,
    pub offset: u64,
    pub detached: bool,
}

/// Resolve a detached file name against the label directory.
///
/// Return
/// ----------
/// * The first existing candidate among `dir/name` and `dir/lowercase(name)`, else
///   [`IngestError::DataFileNotFound`].
pub fn resolve_data_file(label_path: &Utf8Path, name: &str) -> Result<Utf8PathBuf, IngestError> {
    let dir = label_path.parent().unwrap_or(Utf8Path::new(""));
    let direct = dir.join(name);
    if direct.is_file() {
        return Ok(direct);
    }
    let lower = dir.join(name.to_lowercase());
    if lower.is_file() {
        debug!("Resolved data file {name} as {lower}");
        return Ok(lower);
    }
    Err(IngestError::DataFileNotFound(direct.into_string()))
}

/// Find the pointer keyword `name` at the root or in a `FILE`/`UNCOMPRESSED_FILE` object,
/// together with the container it was found in.
pub fn find_pointer<'a>(label: &'a Label, name: &str) -> Option<(&'a Keyword, &'a PvlContainer)> {
    if let Some(keyword) = label.keyword(name) {
        return Some((keyword, &label.root));
    }
    label
        .objects()
        .filter(|o| o.is_named("FILE") || o.is_named("UNCOMPRESSED_FILE"))
        .find_map(|o| o.keyword(name).map(|k| (k, o)))
}

/// Resolve the pointer keyword `name` (e.g. `^IMAGE`) of a label read from `label_path`.
pub fn locate_pointer(
    label: &Label,
    label_path: &Utf8Path,
    name: &str,
) -> Result<DataLocation, IngestError> {
    let (keyword, holder) = find_pointer(label, name).ok_or_else(|| IngestError::missing(name))?;
    let pointer = DataPointer::parse(keyword)?;
    let record_bytes = record_bytes(holder).or_else(|| record_bytes(&label.root));
    let offset = pointer.byte_offset(record_bytes.unwrap_or(DEFAULT_RECORD_BYTES));
    let location = match &pointer.file {
        Some(file) => DataLocation {
            file: resolve_data_file(label_path, file)?,
            offset,
            detached: true,
        },
        None => DataLocation {
            file: label_path.to_path_buf(),
            offset,
            detached: false,
        },
    };
    debug!(
        "{name} resolved to {} at byte {}",
        location.file, location.offset
    );
    Ok(location)
}

fn record_bytes(container: &PvlContainer) -> Option<u64> {
    container
        .keyword("RECORD_BYTES")
        .and_then(|k| k.as_i64().ok())
        .and_then(|v| u64::try_from(v).ok())
        .filter(|v| *v > 0)
}

/// The pixel object of a label, its raw geometry and where its bytes are.
#[derive(Debug, Clone, PartialEq)]
pub struct PdsGeometry {
    pub object: ImageObject,
    pub geometry: GeometryDescriptor,
    pub data: DataLocation,
    /// `SUFFIX_ITEMS` of a qube, `[0, 0, 0]` for an image.
    pub suffix_items: [usize; 3],
    /// `SUFFIX_BYTES` of a qube.
    pub suffix_item_bytes: u64,
}

/// First of `allowed` present in the label.
pub fn find_image_object(label: &Label, allowed: &[ImageObject]) -> Result<ImageObject, IngestError> {
    allowed
        .iter()
        .copied()
        .find(|object| {
            label
                .traverse_container(object.object_name(), Some(ContainerKind::Object))
                .is_some()
                || label.keyword(object.pointer_name()).is_some()
        })
        .ok_or_else(|| {
            IngestError::wrong_product(
                allowed
                    .iter()
                    .map(|o| o.object_name())
                    .collect::<Vec<_>>()
                    .join(" or "),
                "a label without a supported image object",
            )
        })
}

/// Reject products whose pixels are JPEG2000 encoded.
pub fn check_encoding(label: &Label) -> Result<(), IngestError> {
    let encoded = label
        .traverse_container("COMPRESSED_FILE", Some(ContainerKind::Object))
        .and_then(|c| c.keyword("ENCODING_TYPE"))
        .and_then(|k| k.as_str().ok())
        .is_some_and(|t| t.to_ascii_uppercase().contains("JP2"));
    if encoded {
        return Err(IngestError::unsupported(
            "JPEG2000 encoded products are not supported; decompress them first",
        ));
    }
    Ok(())
}

/// Derive the raw geometry and data location of a label read from `label_path`.
///
/// Arguments
/// -----------------
/// * `label`: the parsed product label.
/// * `label_path`: path the label was read from; detached files are resolved next to it.
/// * `allowed`: pixel objects the caller accepts, in order of preference.
/// * `library`: source of the `pds_image.trn` / `pds_qube.trn` tables.
///
/// Return
/// ----------
/// * The geometry, or `WrongProduct` when no allowed object is present, `UnsupportedProduct`
///   for layouts the importer cannot walk, `MissingKeyword` / `InvalidValue` for bad keywords.
pub fn derive_geometry(
    label: &Label,
    label_path: &Utf8Path,
    allowed: &[ImageObject],
    library: &TranslationLibrary,
) -> Result<PdsGeometry, IngestError> {
    check_encoding(label)?;
    let object = find_image_object(label, allowed)?;
    let table = library.table(object.table_name())?;
    let translator = Translator::new(label, &table);

    let (builder, suffix_items, suffix_item_bytes) = match object {
        ImageObject::Image => (image_builder(&translator)?, [0; 3], 0),
        ImageObject::Qube | ImageObject::SpectralQube => qube_builder(&translator)?,
    };
    let data = locate_pointer(label, label_path, object.pointer_name())?;
    let geometry = builder.file_header_bytes(data.offset).build()?;
    debug!(
        "{object}: {}x{}x{} {} {:?} {:?}, data at {}:{}",
        geometry.samples(),
        geometry.lines(),
        geometry.bands(),
        geometry.organization(),
        geometry.pixel_type(),
        geometry.byte_order(),
        data.file,
        data.offset
    );

    Ok(PdsGeometry {
        object,
        geometry,
        data,
        suffix_items,
        suffix_item_bytes,
    })
}

fn translated_usize(translator: &Translator, rule: &str) -> Result<usize, IngestError> {
    let text = translator.translate(rule)?;
    parse_pds_integer(&text)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| IngestError::InvalidValue {
            keyword: rule.to_string(),
            value: text,
            reason: "expected a non-negative integer".into(),
        })
}

fn translated_f64(translator: &Translator, rule: &str) -> Result<f64, IngestError> {
    let text = translator.translate(rule)?;
    parse_pds_real(&text).ok_or_else(|| IngestError::InvalidValue {
        keyword: rule.to_string(),
        value: text,
        reason: "expected a number".into(),
    })
}

fn byte_order(translator: &Translator) -> Result<ByteOrder, IngestError> {
    Ok(match translator.translate("CoreByteOrder")?.as_str() {
        "Lsb" => ByteOrder::Lsb,
        _ => ByteOrder::Msb,
    })
}

fn image_builder(translator: &Translator) -> Result<GeometryBuilder, IngestError> {
    let bits = translated_usize(translator, "CoreBitsPerPixel")? as u64;
    let pixel_type = PixelType::from_pds(&translator.translate("CorePixelType")?, bits)?;
    let organization = translator.translate("CoreOrganization")?.parse::<Organization>()?;
    let calibration = Calibration::Scalar {
        base: translated_f64(translator, "CoreBase")?,
        multiplier: translated_f64(translator, "CoreMultiplier")?,
    };
    let special_ranges = label_special_ranges(translator, pixel_type, &calibration);

    Ok(GeometryDescriptor::builder()
        .dimensions(
            translated_usize(translator, "CoreSamples")?,
            translated_usize(translator, "CoreLines")?,
            translated_usize(translator, "CoreBands")?,
        )
        .organization(organization)
        .pixel_type(pixel_type)
        .byte_order(byte_order(translator)?)
        .data_prefix_bytes(translated_usize(translator, "CoreLinePrefixBytes")? as u64)
        .data_suffix_bytes(translated_usize(translator, "CoreLineSuffixBytes")? as u64)
        .calibration(calibration)
        .special_ranges(special_ranges))
}

fn qube_builder(
    translator: &Translator,
) -> Result<(GeometryBuilder, [usize; 3], u64), IngestError> {
    let axes = translator
        .input_keyword("CoreOrganization")
        .ok_or_else(|| IngestError::missing("AXIS_NAME"))?;
    let axis_names: Vec<String> = axes.texts().map(|t| t.to_ascii_uppercase()).collect();
    let axis_refs: Vec<&str> = axis_names.iter().map(String::as_str).collect();
    let organization = match axis_refs.as_slice() {
        ["SAMPLE", "LINE", "BAND"] => Organization::Bsq,
        ["SAMPLE", "BAND", "LINE"] => Organization::Bil,
        ["BAND", "SAMPLE", "LINE"] => Organization::Bip,
        other => {
            return Err(IngestError::unsupported(format!(
                "qube axis order ({}) is not supported",
                other.join(", ")
            )))
        }
    };

    let items = translator
        .input_keyword("CoreItems")
        .ok_or_else(|| IngestError::missing("CORE_ITEMS"))?;
    let axis_size = |axis: &str| -> Result<usize, IngestError> {
        let index = axis_refs.iter().position(|a| *a == axis).unwrap_or_default();
        items.get_usize(index)
    };
    let (samples, lines, bands) = (axis_size("SAMPLE")?, axis_size("LINE")?, axis_size("BAND")?);

    let item_bytes = translated_usize(translator, "CoreItemBytes")? as u64;
    let pixel_type = PixelType::from_pds(&translator.translate("CorePixelType")?, item_bytes * 8)?;

    let suffix_item_bytes = translated_usize(translator, "SuffixItemSize")? as u64;
    let mut suffix_items = [0usize; 3];
    if let Some(keyword) = translator.input_keyword("AxisSuffixCount") {
        for (i, slot) in suffix_items.iter_mut().enumerate() {
            if i < keyword.len() {
                *slot = keyword.get_usize(i)?;
            }
        }
    }

    // Sideplanes end every line of every band. Backplanes hold one suffix item per sample plus
    // the corner items, and follow the core of each band (BSQ) or each line record (BIL).
    let first_suffix = suffix_items[0] as u64 * suffix_item_bytes;
    let backplane = (samples + suffix_items[0]) as u64 * suffix_item_bytes;
    let second_suffix = suffix_items[1] as u64 * backplane;
    let (suffix, trailer) = match organization {
        Organization::Bsq | Organization::Bil => (first_suffix, second_suffix),
        Organization::Bip => {
            if suffix_items[0] != 0 || suffix_items[1] != 0 {
                return Err(IngestError::unsupported(
                    "band-interleaved-by-pixel qubes with suffix planes are not supported",
                ));
            }
            (0, 0)
        }
    };

    let calibration = band_calibration(translator, bands)?.unwrap_or(Calibration::Scalar {
        base: translated_f64(translator, "CoreBase")?,
        multiplier: translated_f64(translator, "CoreMultiplier")?,
    });
    let special_ranges = label_special_ranges(translator, pixel_type, &calibration);

    let builder = GeometryDescriptor::builder()
        .dimensions(samples, lines, bands)
        .organization(organization)
        .pixel_type(pixel_type)
        .byte_order(byte_order(translator)?)
        .data_suffix_bytes(suffix)
        .data_trailer_bytes(trailer)
        .calibration(calibration)
        .special_ranges(special_ranges);
    Ok((builder, suffix_items, suffix_item_bytes))
}

/// Per-band calibration from `BAND_BIN_BASE` / `BAND_BIN_MULTIPLIER`, when both list every band.
fn band_calibration(
    translator: &Translator,
    bands: usize,
) -> Result<Option<Calibration>, IngestError> {
    let (Some(base), Some(mult)) = (
        translator.input_keyword("BandBase"),
        translator.input_keyword("BandMultiplier"),
    ) else {
        return Ok(None);
    };
    if base.len() != bands || mult.len() != bands {
        debug!(
            "Ignoring band calibration with {} bases and {} multipliers for {bands} bands",
            base.len(),
            mult.len()
        );
        return Ok(None);
    }
    let pairs = base
        .f64_values()?
        .into_iter()
        .zip(mult.f64_values()?)
        .collect();
    Ok(Some(Calibration::PerBand(pairs)))
}

/// Special values declared by the label, as exact ranges in the calibrated domain.
///
/// A value written as a based integer on a float core (`16#FF7FFFFB#`) is a bit pattern. Values
/// that are already float sentinels are decoded by the importer and skipped here.
fn label_special_ranges(
    translator: &Translator,
    pixel_type: PixelType,
    calibration: &Calibration,
) -> SpecialRanges {
    let rules = [
        (SpecialPixel::Null, "CoreNull"),
        (SpecialPixel::Lrs, "CoreLrs"),
        (SpecialPixel::Lis, "CoreLis"),
        (SpecialPixel::His, "CoreHis"),
        (SpecialPixel::Hrs, "CoreHrs"),
    ];
    let mut ranges = SpecialRanges::default();
    for (special, rule) in rules {
        let Some(keyword) = translator.input_keyword(rule) else {
            continue;
        };
        let Some(raw) = raw_special_value(keyword, pixel_type) else {
            continue;
        };
        let value = match calibration {
            Calibration::Scalar { base, multiplier } => multiplier * raw + base,
            Calibration::PerBand(_) => raw,
        };
        let repeated = SpecialPixel::ALL
            .iter()
            .filter_map(|s| ranges.get(*s))
            .any(|r| r.min == value);
        if repeated {
            debug!("{rule} = {value} repeats another special value, ignored");
            continue;
        }
        ranges.set(special, Some(SpecialRange::exact(value)));
    }
    ranges
}

fn raw_special_value(keyword: &Keyword, pixel_type: PixelType) -> Option<f64> {
    let text = keyword.as_str().ok()?;
    if pixel_type == PixelType::F32 && text.contains('#') {
        let bits = u32::try_from(parse_pds_integer(text)?).ok()?;
        if SpecialPixel::of_f32_bits(bits).is_some() {
            return None;
        }
        return Some(f64::from(f32::from_bits(bits)));
    }
    parse_pds_real(text)
}
