//! # Built-in translation data
//!
//! Translation tables and the small data files the drivers need (filter tables, target radii,
//! housekeeping layouts, reseau templates) ship under `translations/` and are embedded in the
//! binary. A [`TranslationLibrary`] resolves a file name against an optional override directory
//! first, then against the embedded copies.

use std::borrow::Cow;

use ahash::AHashMap;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;

use super::TranslationTable;
use crate::ingest_errors::IngestError;

macro_rules! builtin {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../../translations/", $name)))),*]
    };
}

static BUILTIN_FILES: &[(&str, &str)] = builtin![
    "pds_archive.trn",
    "pds_bandbin.trn",
    "pds_instrument.trn",
    "pds_image.trn",
    "pds_qube.trn",
    "pds_projection.trn",
    "isis2_instrument.trn",
    "isis2_bandbin.trn",
    "apollo.trn",
    "ctx.trn",
    "hirise_rdr.trn",
    "galileo_ssi.trn",
    "marci.trn",
    "virtis.trn",
    "voyager.trn",
    "voyager_wa_bandbin.trn",
    "voyager_na_bandbin.trn",
    "near_msi.trn",
    "kaguya_mi.trn",
    "vims.trn",
    "serial_numbers.pvl",
    "target_radii.csv",
    "marci_filters.csv",
    "virtis_housekeeping.csv",
    "voyager_reseaus.pvl",
];

static BUILTIN_INDEX: Lazy<AHashMap<&'static str, &'static str>> =
    Lazy::new(|| BUILTIN_FILES.iter().copied().collect());

/// Resolves translation tables and data files by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationLibrary {
    override_dir: Option<Utf8PathBuf>,
}

impl TranslationLibrary {
    /// The embedded files only.
    pub fn builtin() -> Self {
        TranslationLibrary { override_dir: None }
    }

    /// Files found in `dir` take precedence over the embedded ones.
    pub fn with_override_dir(dir: impl Into<Utf8PathBuf>) -> Self {
        TranslationLibrary {
            override_dir: Some(dir.into()),
        }
    }

    pub fn override_dir(&self) -> Option<&Utf8Path> {
        self.override_dir.as_deref()
    }

    /// Names of the embedded files.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_FILES.iter().map(|(name, _)| *name)
    }

    /// Text of the data file `name`.
    ///
    /// Return
    /// ----------
    /// * The override file when one exists, else the embedded copy, else
    ///   [`IngestError::DataFileNotFound`].
    pub fn text(&self, name: &str) -> Result<Cow<'static, str>, IngestError> {
        if let Some(dir) = &self.override_dir {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!("Using translation override {candidate}");
                return Ok(Cow::Owned(std::fs::read_to_string(&candidate)?));
            }
        }
        BUILTIN_INDEX
            .get(name)
            .map(|text| Cow::Borrowed(*text))
            .ok_or_else(|| IngestError::DataFileNotFound(name.to_string()))
    }

    /// Parse the translation table `name`.
    pub fn table(&self, name: &str) -> Result<TranslationTable, IngestError> {
        let text = self.text(name)?;
        TranslationTable::parse(name, &text)
    }

    /// Deserialize the rows of the CSV data file `name` (first line is the header).
    pub fn records<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, IngestError> {
        let text = self.text(name)?;
        let mut csv_reader = csv::Reader::from_reader(text.as_bytes());
        csv_reader
            .deserialize::<T>()
            .map(|row| {
                row.map_err(|e| IngestError::BadTable {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test_library {
    use super::*;

    #[test]
    fn test_every_builtin_table_parses() {
        let library = TranslationLibrary::builtin();
        for name in TranslationLibrary::builtin_names().filter(|n| n.ends_with(".trn")) {
            let table = library.table(name).unwrap();
            assert!(!table.rules().is_empty(), "{name} has no rules");
        }
    }

    #[test]
    fn test_every_builtin_pvl_parses() {
        let library = TranslationLibrary::builtin();
        for name in TranslationLibrary::builtin_names().filter(|n| n.ends_with(".pvl")) {
            let text = library.text(name).unwrap();
            let label = crate::label::parse_label(text.as_bytes())
                .unwrap_or_else(|e| panic!("{name}: {e}"));
            assert!(
                label.objects().next().is_some() || label.keywords().next().is_some(),
                "{name} is empty"
            );
        }
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(
            path.join("ctx.trn"),
            "Group = Only\n  OutputName = Only\nEnd_Group\nEnd\n",
        )
        .unwrap();
        let library = TranslationLibrary::with_override_dir(path.clone());
        let table = library.table("ctx.trn").unwrap();
        assert_eq!(table.rules().len(), 1);
        assert!(library.table("pds_archive.trn").is_ok());
    }

    #[test]
    fn test_unknown_file() {
        assert_eq!(
            TranslationLibrary::builtin().text("nope.trn"),
            Err(IngestError::DataFileNotFound("nope.trn".into()))
        );
    }
}
