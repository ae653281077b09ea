//! # Label translation
//!
//! Translation tables map keywords of a PDS input label onto keywords of the output cube label.
//! A table is itself a PVL document with one `Group` per rule:
//!
//! ```text
//! Group = FilterName
//!   Auto
//!   Optional
//!   InputPosition = (IMAGE, BAND_BIN)
//!   InputPosition = ROOT
//!   InputKey      = FILTER_NAME
//!   InputDefault  = CLEAR
//!   OutputName    = FilterName
//!   OutputPosition = (Group, BandBin)
//!   Translation   = (CLR, Clear)
//!   Translation   = (*, *)
//! End_Group
//! ```
//!
//! ## Rule evaluation
//!
//! 1. Every `InputPosition` × `InputKey` alternative is tried in order; the first keyword found
//!    wins. Without `InputPosition` the label root is searched.
//! 2. A found value goes through the `Translation = (from, to)` pairs in order. `*` as `from`
//!    matches anything; `*` as `to` copies the input. No matching pair is an
//!    [`IngestError::NoTranslation`]. A rule without pairs copies its input.
//! 3. Nothing found: `InputDefault` (translated), else `OutputDefault` (verbatim), else
//!    [`IngestError::MissingKeyword`], unless the rule is `Optional`.
//! 4. [`Translator::auto`] writes each `Auto` rule into the output label at `OutputPosition`,
//!    replacing any keyword with the same name, so translating twice changes nothing.
//!
//! Units travel with values. `Multivalued` rules translate every element of the input keyword;
//! the others take its first element, or the one requested with [`Translator::translate_index`].

pub mod library;

use crate::ingest_errors::IngestError;
use crate::label::{
    parse_label, ContainerKind, Keyword, PvlContainer, PvlValue, ValueForm, ValueStyle,
};

pub use library::TranslationLibrary;

/// One `Group` of a translation table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationRule {
    pub name: String,
    /// Alternative container paths; empty means the label root only.
    pub input_positions: Vec<Vec<String>>,
    /// Alternative keyword names, tried in order inside every position.
    pub input_keys: Vec<String>,
    pub input_default: Option<String>,
    pub output_default: Option<String>,
    pub output_name: String,
    pub output_position: Vec<(ContainerKind, String)>,
    /// `(from, to)` pairs.
    pub translations: Vec<(String, String)>,
    pub auto: bool,
    pub optional: bool,
    pub multivalued: bool,
}

impl TranslationRule {
    fn from_group(group: &PvlContainer) -> Result<Self, IngestError> {
        let flag = |name: &str| group.has_keyword(name);
        let first = |name: &str| -> Result<Option<String>, IngestError> {
            group
                .keyword(name)
                .map(|k| k.as_str().map(str::to_string))
                .transpose()
        };

        let input_positions = group
            .keywords_named("InputPosition")
            .map(|k| {
                k.texts()
                    .filter(|t| !t.eq_ignore_ascii_case("ROOT"))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let input_keys = group
            .keywords_named("InputKey")
            .flat_map(|k| k.texts().map(str::to_string))
            .collect();

        let output_name = first("OutputName")?
            .ok_or_else(|| IngestError::missing(format!("{}.OutputName", group.name)))?;

        let output_position = match group.keyword("OutputPosition") {
            None => Vec::new(),
            Some(k) => parse_output_position(k)?,
        };

        let translations = group
            .keywords_named("Translation")
            .map(|k| Ok((k.get_str(0)?.to_string(), k.get_str(1)?.to_string())))
            .collect::<Result<Vec<_>, IngestError>>()?;

        Ok(TranslationRule {
            name: group.name.clone(),
            input_positions,
            input_keys,
            input_default: first("InputDefault")?,
            output_default: first("OutputDefault")?,
            output_name,
            output_position,
            translations,
            auto: flag("Auto"),
            optional: flag("Optional"),
            multivalued: flag("Multivalued"),
        })
    }

    /// Keyword name reported when a required rule finds nothing.
    fn missing_name(&self) -> &str {
        self.input_keys
            .first()
            .map(String::as_str)
            .unwrap_or(&self.name)
    }

    fn output_path(&self) -> Vec<(ContainerKind, &str)> {
        self.output_position
            .iter()
            .map(|(kind, name)| (*kind, name.as_str()))
            .collect()
    }
}

fn parse_output_position(keyword: &Keyword) -> Result<Vec<(ContainerKind, String)>, IngestError> {
    let texts: Vec<&str> = keyword.texts().collect();
    if texts.len() % 2 != 0 {
        return Err(IngestError::InvalidValue {
            keyword: keyword.name.clone(),
            value: texts.join(", "),
            reason: "expected (kind, name) pairs".into(),
        });
    }
    texts
        .chunks(2)
        .map(|pair| {
            let kind = if pair[0].eq_ignore_ascii_case("Object") {
                ContainerKind::Object
            } else if pair[0].eq_ignore_ascii_case("Group") {
                ContainerKind::Group
            } else {
                return Err(IngestError::InvalidValue {
                    keyword: keyword.name.clone(),
                    value: pair[0].to_string(),
                    reason: "container kind must be Object or Group".into(),
                });
            };
            Ok((kind, pair[1].to_string()))
        })
        .collect()
}

/// A parsed translation table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationTable {
    pub name: String,
    rules: Vec<TranslationRule>,
}

impl TranslationTable {
    /// Parse a table from its PVL text.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: table name used in diagnostics (usually the file name).
    /// * `text`: PVL text with one `Group` per rule.
    pub fn parse(name: &str, text: &str) -> Result<Self, IngestError> {
        let label = parse_label(text.as_bytes())?;
        Self::from_label(name, &label)
    }

    pub fn from_label(name: &str, label: &PvlContainer) -> Result<Self, IngestError> {
        let rules = label
            .groups()
            .map(TranslationRule::from_group)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TranslationTable {
            name: name.to_string(),
            rules,
        })
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&TranslationRule> {
        self.rules.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Append the rules of `other`; rules with an existing name replace the old ones.
    pub fn merge(&mut self, other: TranslationTable) {
        for rule in other.rules {
            match self
                .rules
                .iter_mut()
                .find(|r| r.name.eq_ignore_ascii_case(&rule.name))
            {
                Some(slot) => *slot = rule,
                None => self.rules.push(rule),
            }
        }
    }
}

/// Applies a [`TranslationTable`] to one input label.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    input: &'a PvlContainer,
    table: &'a TranslationTable,
}

impl<'a> Translator<'a> {
    pub fn new(input: &'a PvlContainer, table: &'a TranslationTable) -> Self {
        Translator { input, table }
    }

    fn rule(&self, name: &str) -> Result<&'a TranslationRule, IngestError> {
        self.table
            .rule(name)
            .ok_or_else(|| IngestError::InvalidValue {
                keyword: name.to_string(),
                value: self.table.name.clone(),
                reason: "no such translation rule".into(),
            })
    }

    fn find_input(&self, rule: &TranslationRule) -> Option<&'a Keyword> {
        let root: [Vec<String>; 1] = [Vec::new()];
        let positions: &[Vec<String>] = if rule.input_positions.is_empty() {
            &root
        } else {
            &rule.input_positions
        };
        positions
            .iter()
            .filter_map(|path| self.input.path(path.as_slice()))
            .find_map(|container| {
                rule.input_keys
                    .iter()
                    .filter_map(|key| container.keyword(key))
                    .find(|k| !k.is_empty())
            })
    }

    fn translate_value(&self, rule: &TranslationRule, raw: &str) -> Result<String, IngestError> {
        if rule.translations.is_empty() {
            return Ok(raw.to_string());
        }
        let raw_trimmed = raw.trim();
        rule.translations
            .iter()
            .find(|(from, _)| from == "*" || from.trim().eq_ignore_ascii_case(raw_trimmed))
            .map(|(_, to)| if to == "*" { raw.to_string() } else { to.clone() })
            .ok_or_else(|| IngestError::NoTranslation {
                rule: rule.name.clone(),
                value: raw.to_string(),
            })
    }

    fn translated(&self, rule: &TranslationRule, value: &PvlValue) -> Result<PvlValue, IngestError> {
        Ok(PvlValue {
            text: self.translate_value(rule, &value.text)?,
            units: value.units.clone(),
            style: ValueStyle::Bare,
        })
    }

    fn default_value(&self, rule: &TranslationRule) -> Result<Option<String>, IngestError> {
        if let Some(default) = &rule.input_default {
            return self.translate_value(rule, default).map(Some);
        }
        Ok(rule.output_default.clone())
    }

    /// True when the input keyword of rule `name` is present in the input label.
    pub fn input_has_keyword(&self, name: &str) -> bool {
        self.table
            .rule(name)
            .and_then(|rule| self.find_input(rule))
            .is_some()
    }

    /// The input keyword rule `name` reads, if present.
    pub fn input_keyword(&self, name: &str) -> Option<&'a Keyword> {
        self.table.rule(name).and_then(|rule| self.find_input(rule))
    }

    /// Translated first value of rule `name`.
    pub fn translate(&self, name: &str) -> Result<String, IngestError> {
        self.translate_index(name, 0)
    }

    /// Translated value `index` of rule `name`.
    ///
    /// Return
    /// ----------
    /// * The translated text, the default when the input is absent, or an error: `MissingKeyword`
    ///   when nothing applies (even for optional rules), `NoTranslation` when the dictionary has no
    ///   entry, `InvalidValue` when `index` is past the last value.
    pub fn translate_index(&self, name: &str, index: usize) -> Result<String, IngestError> {
        let rule = self.rule(name)?;
        match self.find_input(rule) {
            Some(input) => {
                let raw = input.get_str(index)?;
                self.translate_value(rule, raw)
            }
            None => self
                .default_value(rule)?
                .ok_or_else(|| IngestError::missing(rule.missing_name())),
        }
    }

    /// Output keyword of `rule`, `None` for an optional rule that found nothing.
    pub fn output_keyword(&self, rule: &TranslationRule) -> Result<Option<Keyword>, IngestError> {
        let Some(input) = self.find_input(rule) else {
            return match self.default_value(rule)? {
                Some(value) => Ok(Some(Keyword::new(rule.output_name.clone(), value))),
                None if rule.optional => Ok(None),
                None => Err(IngestError::missing(rule.missing_name())),
            };
        };

        let mut keyword = Keyword::flag(rule.output_name.clone());
        if rule.multivalued {
            for value in &input.values {
                keyword.values.push(self.translated(rule, value)?);
            }
            keyword.form = input.form;
        } else {
            let first = input.value(0).ok_or_else(|| IngestError::missing(&input.name))?;
            keyword.values.push(self.translated(rule, first)?);
            keyword.form = ValueForm::Scalar;
        }
        Ok(Some(keyword))
    }

    /// Apply every `Auto` rule to `output`.
    pub fn auto(&self, output: &mut PvlContainer) -> Result<(), IngestError> {
        for rule in self.table.rules().iter().filter(|r| r.auto) {
            if let Some(keyword) = self.output_keyword(rule)? {
                output.path_or_create(&rule.output_path()).set_keyword(keyword);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_translation {
    use super::*;
    use crate::label::Label;

    const TABLE: &str = r#"
Group = InstrumentId
  Auto
  InputKey       = INSTRUMENT_ID
  OutputName     = InstrumentId
  OutputPosition = (Group, Instrument)
  Translation    = (*, *)
End_Group

Group = FilterName
  Auto
  Multivalued
  InputPosition  = (IMAGE, BAND_BIN)
  InputPosition  = ROOT
  InputKey       = FILTER_NAME
  InputKey       = FILTER
  OutputName     = FilterName
  OutputPosition = (Group, BandBin)
  Translation    = (CLR, Clear)
  Translation    = (RED, Red)
End_Group

Group = Summing
  Auto
  InputKey       = SPATIAL_SUMMING
  InputDefault   = 1
  OutputName     = Summing
  OutputPosition = (Group, Instrument)
End_Group

Group = Target
  Auto
  Optional
  InputKey       = TARGET_NAME
  OutputName     = TargetName
  OutputPosition = (Group, Instrument)
End_Group

Group = Exposure
  InputKey       = EXPOSURE_DURATION
  OutputName     = ExposureDuration
  OutputPosition = (Object, IsisCube, Group, Instrument)
End_Group

Group = Required
  Auto
  InputKey       = START_TIME
  OutputName     = StartTime
  OutputPosition = (Group, Instrument)
End_Group
End
"#;

    fn table() -> TranslationTable {
        TranslationTable::parse("test.trn", TABLE).unwrap()
    }

    fn input() -> Label {
        "INSTRUMENT_ID = CTX\n\
         START_TIME = 2006-11-08T04:49:13\n\
         EXPOSURE_DURATION = 1.877 <MS>\n\
         FILTER = (CLR, RED)\n\
         END\n"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_rule_parsing() {
        let table = table();
        let filter = table.rule("filtername").unwrap();
        assert!(filter.auto && filter.multivalued && !filter.optional);
        assert_eq!(
            filter.input_positions,
            vec![vec!["IMAGE".to_string(), "BAND_BIN".to_string()], vec![]]
        );
        assert_eq!(filter.input_keys, vec!["FILTER_NAME", "FILTER"]);
        let exposure = table.rule("Exposure").unwrap();
        assert_eq!(
            exposure.output_position,
            vec![
                (ContainerKind::Object, "IsisCube".to_string()),
                (ContainerKind::Group, "Instrument".to_string())
            ]
        );
    }

    #[test]
    fn test_translate_and_defaults() {
        let table = table();
        let input = input();
        let translator = Translator::new(&input, &table);
        assert_eq!(translator.translate("InstrumentId").unwrap(), "CTX");
        assert_eq!(translator.translate_index("FilterName", 1).unwrap(), "Red");
        assert_eq!(translator.translate("Summing").unwrap(), "1");
        assert!(!translator.input_has_keyword("Summing"));
        assert!(translator.input_has_keyword("FilterName"));
        assert_eq!(
            translator.input_keyword("Exposure").unwrap().units(0),
            Some("MS")
        );
        assert_eq!(
            translator.translate("Target"),
            Err(IngestError::missing("TARGET_NAME"))
        );
        assert!(translator.translate_index("FilterName", 5).is_err());
    }

    #[test]
    fn test_no_translation() {
        let table = table();
        let input: Label = "FILTER = BLUE\nSTART_TIME = X\nINSTRUMENT_ID = Y\nEND\n".parse().unwrap();
        let translator = Translator::new(&input, &table);
        assert_eq!(
            translator.translate("FilterName"),
            Err(IngestError::NoTranslation {
                rule: "FilterName".into(),
                value: "BLUE".into()
            })
        );
    }

    #[test]
    fn test_auto_is_idempotent() {
        let table = table();
        let input = input();
        let translator = Translator::new(&input, &table);
        let mut output = Label::default();
        translator.auto(&mut output).unwrap();
        let first = output.to_string();
        translator.auto(&mut output).unwrap();
        assert_eq!(output.to_string(), first);

        let inst = output.find_group("Instrument").unwrap();
        assert_eq!(inst.keyword("InstrumentId").unwrap().as_str().unwrap(), "CTX");
        assert_eq!(inst.keyword("Summing").unwrap().as_str().unwrap(), "1");
        assert!(!inst.has_keyword("TargetName"));
        assert!(!inst.has_keyword("ExposureDuration"));
        let filters = output.find_group("BandBin").unwrap().keyword("FilterName").unwrap();
        assert_eq!(filters.texts().collect::<Vec<_>>(), vec!["Clear", "Red"]);
    }

    #[test]
    fn test_auto_missing_required() {
        let table = table();
        let input: Label = "INSTRUMENT_ID = CTX\nEND\n".parse().unwrap();
        let mut output = Label::default();
        let err = Translator::new(&input, &table).auto(&mut output).unwrap_err();
        assert_eq!(err, IngestError::missing("FILTER_NAME"));
    }

    #[test]
    fn test_units_are_carried() {
        let table = table();
        let input = input();
        let translator = Translator::new(&input, &table);
        let kw = translator
            .output_keyword(table.rule("Exposure").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(kw.name, "ExposureDuration");
        assert_eq!(kw.units(0), Some("MS"));
    }
}
