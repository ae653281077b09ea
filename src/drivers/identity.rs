//! Product identity sniffed from raw label text.
//!
//! Identity is read with regular expressions rather than the PVL parser so that products whose
//! labels need repairs before they parse (Galileo, VIRTIS, Voyager) can still be routed to the
//! driver that repairs them.

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

static IDENTITY_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?mi)^[ \t]*(MISSION_ID|MISSION_NAME|SPACECRAFT_NAME|SPACECRAFT_ID|INSTRUMENT_HOST_NAME|INSTRUMENT_HOST_ID|INSTRUMENT_ID|INSTRUMENT_NAME|PROCESSING_LEVEL_ID|PRODUCT_TYPE|DATA_SET_ID)[ \t]*=[ \t]*(?:"([^"]*)"|'([^']*)'|([^\s/]+))"#,
    )
    .expect("identity pattern is valid")
});

/// Uppercase, with `_` and `-` read as spaces and runs of spaces collapsed.
pub fn normalize(text: &str) -> String {
    text.to_ascii_uppercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `candidate` is `key` or starts with `key` followed by a space.
pub(crate) fn name_matches(candidate: &str, key: &str) -> bool {
    candidate == key
        || candidate
            .strip_prefix(key)
            .is_some_and(|rest| rest.starts_with(' '))
}

/// One `(mission, instrument, level)` tuple a driver accepts. `None` matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKey {
    pub mission: &'static str,
    pub instrument: Option<&'static str>,
    pub level: Option<&'static str>,
}

impl IdentityKey {
    pub const fn new(
        mission: &'static str,
        instrument: Option<&'static str>,
        level: Option<&'static str>,
    ) -> Self {
        IdentityKey {
            mission,
            instrument,
            level,
        }
    }
}

/// How well a product matches an [`IdentityKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyMatch {
    None,
    /// Mission and instrument match, the processing level does not.
    MissionInstrument,
    Full,
}

/// Normalized identity keywords of a label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIdentity {
    pub missions: SmallVec<[String; 4]>,
    pub instruments: SmallVec<[String; 2]>,
    /// Tokens of `PROCESSING_LEVEL_ID`, `PRODUCT_TYPE` and `DATA_SET_ID`.
    pub levels: Vec<String>,
}

impl ProductIdentity {
    /// Collect the identity keywords of the label text `text`, up to its `END` line.
    pub fn sniff(text: &str) -> Self {
        let mut identity = ProductIdentity::default();
        for capture in IDENTITY_KEYWORD.captures_iter(text) {
            let value = capture
                .get(2)
                .or_else(|| capture.get(3))
                .or_else(|| capture.get(4))
                .map(|m| normalize(m.as_str()))
                .unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            match capture[1].to_ascii_uppercase().as_str() {
                "INSTRUMENT_ID" | "INSTRUMENT_NAME" => push_unique(&mut identity.instruments, value),
                "PROCESSING_LEVEL_ID" | "PRODUCT_TYPE" | "DATA_SET_ID" => {
                    for token in value.split([' ', '.']).filter(|t| !t.is_empty()) {
                        if !identity.levels.iter().any(|l| l == token) {
                            identity.levels.push(token.to_string());
                        }
                    }
                }
                _ => push_unique(&mut identity.missions, value),
            }
        }
        identity
    }

    pub fn mission(&self) -> &str {
        self.missions.first().map(String::as_str).unwrap_or("UNKNOWN")
    }

    pub fn instrument(&self) -> &str {
        self.instruments.first().map(String::as_str).unwrap_or("UNKNOWN")
    }

    /// `(mission, instrument, level)` as shown in diagnostics.
    pub fn describe(&self) -> String {
        format!(
            "({}, {}, {})",
            self.mission(),
            self.instrument(),
            self.levels.first().map(String::as_str).unwrap_or("*")
        )
    }

    pub fn matches(&self, key: &IdentityKey) -> KeyMatch {
        let mission = normalize(key.mission);
        if !self.missions.iter().any(|m| name_matches(m, &mission)) {
            return KeyMatch::None;
        }
        if let Some(instrument) = key.instrument {
            let instrument = normalize(instrument);
            if !self.instruments.iter().any(|i| name_matches(i, &instrument)) {
                return KeyMatch::None;
            }
        }
        match key.level {
            Some(level) if !self.levels.iter().any(|l| *l == normalize(level)) => {
                KeyMatch::MissionInstrument
            }
            _ => KeyMatch::Full,
        }
    }
}

fn push_unique<A: smallvec::Array<Item = String>>(list: &mut SmallVec<A>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
