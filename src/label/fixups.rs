//! # Textual label repairs
//!
//! Some mission archives ship labels that are not valid PVL. These functions rewrite the label
//! text before it reaches the parser. Each one works on the text up to the `END` line and returns
//! the repaired text; repairs that change the meaning of the label also return the warnings a
//! driver should record.

use camino::Utf8Path;
use log::warn;

/// Galileo SSI: close every `/*` comment left open on its line.
pub fn close_open_comments(text: &str) -> String {
    map_lines(text, |line| {
        match line.find("/*") {
            Some(open) if !line[open..].contains("*/") => format!("{} */", line.trim_end()),
            _ => line.to_string(),
        }
    })
}

/// Voyager: turn a `/*` comment left open on its line into a `#` comment.
pub fn hash_open_comments(text: &str) -> String {
    map_lines(text, |line| match line.find("/*") {
        Some(open) if !line.contains("*/") => {
            format!("{}# {}", &line[..open], &line[open + 2..])
        }
        _ => line.to_string(),
    })
}

/// VIRTIS: add the commas missing from the multi-line `SOFTWARE_VERSION_ID` and
/// `SPICE_FILE_NAME` sequences.
pub fn virtis_commas(text: &str) -> String {
    let mut within_spice = false;
    map_lines(text, |line| {
        if line.contains("SOFTWARE_VERSION_ID") {
            format!("{line},")
        } else if line.contains("SPICE_FILE_NAME") || within_spice {
            if line.contains(')') || line.contains("NULL") {
                within_spice = false;
                line.to_string()
            } else {
                within_spice = true;
                format!("{line},")
            }
        } else {
            line.to_string()
        }
    })
}

/// Camera selection used when a Voyager label has an empty `INSTRUMENT_NAME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoyagerCamera {
    #[default]
    Automatic,
    Narrow,
    Wide,
}

/// Voyager label repairs.
///
/// Arguments
/// -----------------
/// * `text`: label text, up to and including `END`.
/// * `file`: the product path; its base name replaces a corrupted `IMAGE_ID`.
/// * `camera`: value for an empty `INSTRUMENT_NAME`.
///
/// Return
/// ----------
/// * The repaired text and one warning message per repair.
pub fn voyager_label_repairs(
    text: &str,
    file: &Utf8Path,
    camera: VoyagerCamera,
) -> (String, Vec<String>) {
    let mut warnings = Vec::new();
    let base_name = file.file_stem().unwrap_or_default().to_string();

    let repaired = map_lines(text, |line| {
        let trimmed = line.trim();
        if trimmed == "INSTRUMENT_NAME" || trimmed == "INSTRUMENT_NAME =" {
            let value = match camera {
                VoyagerCamera::Automatic => {
                    warnings.push(format!(
                        "The INSTRUMENT_NAME for [{file}] is empty. The InstrumentId will be set \
                         to [Unknown] and the labels will not translate; select NAC or WAC to \
                         translate them."
                    ));
                    "Unknown"
                }
                VoyagerCamera::Narrow => "NARROW_ANGLE_CAMERA",
                VoyagerCamera::Wide => "WIDE_ANGLE_CAMERA",
            };
            return format!("INSTRUMENT_NAME                  = {value}");
        }
        if trimmed.starts_with("IMAGE_ID") && !line.is_ascii() {
            warnings.push(format!(
                "The IMAGE_ID for [{file}] is corrupted. The ProductId will be set to \
                 [{base_name}]."
            ));
            return format!("IMAGE_ID                         = {base_name}");
        }
        line.to_string()
    });

    for warning in &warnings {
        warn!("{warning}");
    }
    (repaired, warnings)
}

/// Apply `f` to each line up to and including `END`; the tail is dropped.
fn map_lines<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len() + 64);
    for line in text.lines() {
        let is_end = line.trim().eq_ignore_ascii_case("END");
        out.push_str(&f(line));
        out.push('\n');
        if is_end {
            break;
        }
    }
    out
}

/// Lossy text of a label byte buffer, for the textual repairs above.
pub fn label_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod test_fixups {
    use super::*;
    use crate::label::parse_label;

    #[test]
    fn test_close_open_comments() {
        let text = "/* SSI header\nTARGET_NAME = IO\nEND\n";
        let fixed = close_open_comments(text);
        assert_eq!(fixed, "/* SSI header */\nTARGET_NAME = IO\nEND\n");
        assert!(parse_label(fixed.as_bytes()).is_ok());
    }

    #[test]
    fn test_hash_open_comments() {
        let fixed = hash_open_comments("  /* FILE FORMAT\nA = 1 /* kept */\nEND\nbinary");
        assert_eq!(fixed, "  #  FILE FORMAT\nA = 1 /* kept */\nEND\n");
    }

    #[test]
    fn test_virtis_commas() {
        let text = "SOFTWARE_VERSION_ID = (\"EGSE_SOFT_7.0\"\n\"V1.0\")\n\
                    SPICE_FILE_NAME = (\"A.BSP\"\n\"B.TSC\"\n\"C.TLS\")\nEND\n";
        let fixed = virtis_commas(text);
        let label = parse_label(fixed.as_bytes()).unwrap();
        assert_eq!(label.keyword("SOFTWARE_VERSION_ID").unwrap().len(), 2);
        assert_eq!(label.keyword("SPICE_FILE_NAME").unwrap().len(), 3);
    }

    #[test]
    fn test_voyager_repairs() {
        let text = "IMAGE_ID = \u{fffd}\u{fffd}\nINSTRUMENT_NAME\nEND\n";
        let (fixed, warnings) = voyager_label_repairs(
            text,
            Utf8Path::new("/data/c1234567.imq"),
            VoyagerCamera::Automatic,
        );
        assert_eq!(warnings.len(), 2);
        let label = parse_label(fixed.as_bytes()).unwrap();
        assert_eq!(label.keyword("IMAGE_ID").unwrap().as_str().unwrap(), "c1234567");
        assert_eq!(label.keyword("INSTRUMENT_NAME").unwrap().as_str().unwrap(), "Unknown");

        let (fixed, warnings) =
            voyager_label_repairs("INSTRUMENT_NAME\nEND\n", Utf8Path::new("x.img"), VoyagerCamera::Wide);
        assert!(warnings.is_empty());
        assert!(fixed.contains("WIDE_ANGLE_CAMERA"));
    }
}
