//! # Serial and observation numbers
//!
//! ## Overview
//!
//! A serial number identifies one image across tools: the `/`-joined values of a mission-specific
//! ordered list of cube label keywords, e.g. `MRO/CTX/0901234567:123`. The lists live in
//! `serial_numbers.pvl`, one object per mission whose groups are translation rules applied to the
//! cube label. The mission is found from the `SpacecraftName` of the `Instrument` group.
//!
//! An observation number groups the images taken at the same time by several detectors; it is
//! composed the same way, with the rules flagged `ClockCount` cut at their fractional separator.
//!
//! [`SerialNumberList`] maps serial numbers to the cube files they come from.

pub mod list;

use camino::Utf8Path;
use itertools::Itertools;

use crate::cube::CUBE_OBJECT;
use crate::drivers::identity::{name_matches, normalize};
use crate::ingest_errors::IngestError;
use crate::label::PvlContainer;
use crate::translation::{TranslationLibrary, TranslationTable, Translator};

pub use list::{SerialEntry, SerialNumberList};

pub const SERIAL_FILE: &str = "serial_numbers.pvl";

/// Serial number of an image no mission rule applies to.
pub const UNKNOWN: &str = "Unknown";

const CLOCK_COUNT_FLAG: &str = "ClockCount";

/// Serial number rules of one mission.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionRules {
    pub mission: String,
    /// Normalized spacecraft names (or name prefixes) of the mission.
    spacecraft: Vec<String>,
    table: TranslationTable,
    /// Rules whose values are clock counts.
    clock_rules: Vec<String>,
}

impl MissionRules {
    fn from_object(object: &PvlContainer) -> Result<Self, IngestError> {
        let spacecraft = object
            .require("SpacecraftName")?
            .texts()
            .map(normalize)
            .collect();
        let clock_rules = object
            .groups()
            .filter(|g| g.has_keyword(CLOCK_COUNT_FLAG))
            .map(|g| g.name.clone())
            .collect();
        Ok(MissionRules {
            mission: object.name.clone(),
            spacecraft,
            table: TranslationTable::from_label(&object.name, object)?,
            clock_rules,
        })
    }

    pub fn matches(&self, spacecraft: &str) -> bool {
        let spacecraft = normalize(spacecraft);
        self.spacecraft.iter().any(|key| name_matches(&spacecraft, key))
    }

    fn compose(&self, label: &PvlContainer, observation: bool) -> Result<String, IngestError> {
        let translator = Translator::new(label, &self.table);
        let values = self
            .table
            .rules()
            .iter()
            .map(|rule| {
                let value = translator.translate(&rule.name)?;
                let is_clock = self.clock_rules.iter().any(|c| c == &rule.name);
                Ok(if observation && is_clock {
                    truncate_clock(&value).to_string()
                } else {
                    value
                })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;
        Ok(values.iter().join("/"))
    }
}

/// Clock count up to its first `.` or `:`.
pub fn truncate_clock(count: &str) -> &str {
    count.split(['.', ':']).next().unwrap_or(count)
}

/// Composes serial and observation numbers from cube labels.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialNumberGenerator {
    missions: Vec<MissionRules>,
}

impl SerialNumberGenerator {
    pub fn new(library: &TranslationLibrary) -> Result<Self, IngestError> {
        let text = library.text(SERIAL_FILE)?;
        let label = crate::label::parse_label(text.as_bytes())?;
        let missions = label
            .objects()
            .map(MissionRules::from_object)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SerialNumberGenerator { missions })
    }

    pub fn builtin() -> Result<Self, IngestError> {
        Self::new(&TranslationLibrary::builtin())
    }

    /// Rules of the mission of the cube `label`.
    pub fn mission(&self, label: &PvlContainer) -> Result<&MissionRules, IngestError> {
        let spacecraft = label
            .path(&[CUBE_OBJECT, "Instrument"])
            .and_then(|g| g.keyword("SpacecraftName"))
            .and_then(|k| k.as_str().ok())
            .unwrap_or(UNKNOWN);
        self.missions
            .iter()
            .find(|m| m.matches(spacecraft))
            .ok_or_else(|| IngestError::NoSerialMapping {
                mission: spacecraft.to_string(),
            })
    }

    pub fn serial_number(&self, label: &PvlContainer) -> Result<String, IngestError> {
        self.mission(label)?.compose(label, false)
    }

    pub fn observation_number(&self, label: &PvlContainer) -> Result<String, IngestError> {
        self.mission(label)?.compose(label, true)
    }

    /// Serial number of `label`, or the file name of `path` when none can be composed.
    pub fn serial_number_or_filename(&self, label: &PvlContainer, path: &Utf8Path) -> String {
        self.serial_number(label)
            .unwrap_or_else(|_| path.file_name().unwrap_or(UNKNOWN).to_string())
    }
}

#[cfg(test)]
mod test_serial {
    use super::*;
    use crate::label::Label;

    fn cube_label(instrument: &str) -> Label {
        format!("Object = IsisCube\nGroup = Instrument\n{instrument}\nEnd_Group\nEnd_Object\nEnd\n")
            .parse()
            .unwrap()
    }

    #[test]
    fn test_every_mission_parses() {
        let generator = SerialNumberGenerator::builtin().unwrap();
        assert!(generator.missions.len() >= 8);
        assert!(generator.missions.iter().all(|m| !m.table.rules().is_empty()));
    }

    #[test]
    fn test_ctx_serial_and_observation() {
        let generator = SerialNumberGenerator::builtin().unwrap();
        let label = cube_label(
            "SpacecraftName = MARS_RECONNAISSANCE_ORBITER\n\
             InstrumentId = CTX\n\
             SpacecraftClockCount = \"0901234567:123\"",
        );
        assert_eq!(generator.serial_number(&label).unwrap(), "MRO/CTX/0901234567:123");
        assert_eq!(generator.observation_number(&label).unwrap(), "MRO/CTX/0901234567");
    }

    #[test]
    fn test_voyager_camera_names() {
        let generator = SerialNumberGenerator::builtin().unwrap();
        let label = cube_label(
            "SpacecraftName = VOYAGER_2\n\
             InstrumentId = WIDE_ANGLE_CAMERA\n\
             SpacecraftClockCount = 1636845",
        );
        assert_eq!(generator.serial_number(&label).unwrap(), "VOYAGER_2/ISSWA/1636845");
    }

    #[test]
    fn test_unknown_mission() {
        let generator = SerialNumberGenerator::builtin().unwrap();
        let label = cube_label("SpacecraftName = MARINER_10");
        assert_eq!(
            generator.serial_number(&label),
            Err(IngestError::NoSerialMapping {
                mission: "MARINER_10".into()
            })
        );
        assert_eq!(
            generator.serial_number_or_filename(&label, Utf8Path::new("/data/m10.cub")),
            "m10.cub"
        );
    }

    #[test]
    fn test_truncate_clock() {
        assert_eq!(truncate_clock("1/1514302573.000"), "1/1514302573");
        assert_eq!(truncate_clock("0901234567:123"), "0901234567");
        assert_eq!(truncate_clock("1636845"), "1636845");
    }
}
