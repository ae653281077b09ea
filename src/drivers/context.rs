//! Shared steps of every driver.
//!
//! A [`DriverContext`] carries the input path, the configuration, the translation library and the
//! external collaborators through one ingest, and implements the steps drivers have in common:
//! reading (and repairing) the label, deriving the geometry with the user overrides, streaming the
//! pixels, importing the embedded tables, translating label groups and finishing the outputs.

use std::fs::File;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use tempfile::TempDir;

use crate::config::IngestConfig;
use crate::cube::CubeSink;
use crate::decompress::Decompressor;
use crate::geometry::pds_geometry::{derive_geometry, ImageObject, PdsGeometry};
use crate::geometry::SpecialPixel;
use crate::import::{ImportOptions, ImportSummary, LayoutPolicy, PixelImporter};
use crate::ingest_errors::IngestError;
use crate::label::fixups::label_text;
use crate::label::{parse_label, read_label_bytes, ContainerKind, Keyword, Label, PvlContainer};
use crate::spice::SpiceClock;
use crate::table::{import_tables, Table, TableDiagnostic};
use crate::translation::{TranslationLibrary, Translator};

use super::outputs::{OutputRole, OutputSet};

/// State of one ingest, handed to the driver.
pub struct DriverContext<'a> {
    /// Path the user gave.
    pub source: Utf8PathBuf,
    /// Path the label is read from; a scratch file after decompression.
    pub input: Utf8PathBuf,
    pub config: &'a IngestConfig,
    pub library: &'a TranslationLibrary,
    spice: Option<&'a dyn SpiceClock>,
    decompressor: Option<&'a dyn Decompressor>,
    pub diagnostics: Vec<TableDiagnostic>,
    pub warnings: Vec<String>,
    scratch: Option<TempDir>,
}

impl<'a> DriverContext<'a> {
    pub fn new(
        source: impl Into<Utf8PathBuf>,
        config: &'a IngestConfig,
        library: &'a TranslationLibrary,
    ) -> Self {
        let source = source.into();
        DriverContext {
            input: source.clone(),
            source,
            config,
            library,
            spice: None,
            decompressor: None,
            diagnostics: Vec::new(),
            warnings: Vec::new(),
            scratch: None,
        }
    }

    pub fn with_spice(mut self, spice: Option<&'a dyn SpiceClock>) -> Self {
        self.spice = spice;
        self
    }

    pub fn with_decompressor(mut self, decompressor: Option<&'a dyn Decompressor>) -> Self {
        self.decompressor = decompressor;
        self
    }

    /// The SPICE collaborator, or a `Collaborator` error naming `purpose`.
    pub fn spice(&self, purpose: &str) -> Result<&'a dyn SpiceClock, IngestError> {
        self.spice.ok_or_else(|| {
            IngestError::Collaborator(format!("a SPICE clock is required to {purpose}"))
        })
    }

    pub fn has_spice(&self) -> bool {
        self.spice.is_some()
    }

    pub fn decompressor(&self) -> Result<&'a dyn Decompressor, IngestError> {
        self.decompressor.ok_or_else(|| {
            IngestError::Collaborator(format!("no decompressor configured for [{}]", self.source))
        })
    }

    /// Log a warning and keep it for the ingest report.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Directory for intermediate files, removed when the context is dropped.
    pub fn scratch_dir(&mut self) -> Result<Utf8PathBuf, IngestError> {
        if self.scratch.is_none() {
            self.scratch = Some(tempfile::tempdir()?);
        }
        let dir = self
            .scratch
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .unwrap_or_default();
        Utf8PathBuf::from_path_buf(dir)
            .map_err(|p| IngestError::Utf8PathError(p.display().to_string()))
    }

    /// Parse the label of [`DriverContext::input`].
    pub fn read_label(&self) -> Result<Label, IngestError> {
        Label::from_file(&self.input)
    }

    /// Parse the label of [`DriverContext::input`] after a textual repair.
    pub fn read_label_with<F>(&self, repair: F) -> Result<Label, IngestError>
    where
        F: FnOnce(&str) -> String,
    {
        let bytes = read_label_bytes(File::open(&self.input)?)?;
        let repaired = repair(&label_text(&bytes));
        parse_label(repaired.as_bytes())
    }

    /// Geometry of the first of `allowed` in `label`, with the configured overrides applied.
    pub fn pds_geometry(
        &self,
        label: &Label,
        allowed: &[ImageObject],
    ) -> Result<PdsGeometry, IngestError> {
        let mut pds = derive_geometry(label, &self.input, allowed, self.library)?;
        let overrides = &self.config.special_ranges;
        let (prefix, suffix) = (self.config.prefix_bytes, self.config.suffix_bytes);
        if overrides.is_empty() && prefix.is_none() && suffix.is_none() {
            return Ok(pds);
        }

        let mut builder = pds.geometry.to_builder();
        let mut ranges = *pds.geometry.special_ranges();
        for special in SpecialPixel::ALL {
            if let Some(range) = overrides.get(special) {
                debug!("{} range overridden by [{}, {})", special.name(), range.min, range.max);
                ranges.set(special, Some(range));
            }
        }
        builder = builder.special_ranges(ranges);
        if let Some(bytes) = prefix {
            builder = builder.data_prefix_bytes(bytes);
        }
        if let Some(bytes) = suffix {
            builder = builder.data_suffix_bytes(bytes);
        }
        pds.geometry = builder.build()?;
        Ok(pds)
    }

    /// Layout policy of a located pixel object.
    pub fn layout(pds: &PdsGeometry) -> LayoutPolicy {
        if pds.data.detached {
            LayoutPolicy::DetachedPds
        } else {
            LayoutPolicy::AttachedPds
        }
    }

    /// Stream the pixels of `pds` into `sink`, which must already be created.
    ///
    /// Tables produced by the reader itself are written to `sink` and left out of the summary.
    pub fn import_pixels(
        &self,
        pds: &PdsGeometry,
        policy: LayoutPolicy,
        options: ImportOptions,
        sink: &mut dyn CubeSink,
    ) -> Result<ImportSummary, IngestError> {
        let mut summary = PixelImporter::new(&pds.geometry, policy)
            .with_options(options.with_progress(self.config.show_progress))
            .with_cancel(self.config.cancel.clone())
            .import_file(&pds.data.file, sink)?;
        for table in std::mem::take(&mut summary.tables) {
            sink.write_table(table)?;
        }
        debug!(
            "Imported {} lines, {} bytes from [{}]",
            summary.lines_written, summary.bytes_consumed, pds.data.file
        );
        Ok(summary)
    }

    /// Create the primary output at the size of `pds` and stream the pixels into it.
    pub fn import_primary(
        &self,
        pds: &PdsGeometry,
        options: ImportOptions,
        outputs: &mut dyn OutputSet,
    ) -> Result<ImportSummary, IngestError> {
        let g = &pds.geometry;
        let sink = outputs.create(
            OutputRole::Primary,
            g.samples(),
            g.lines(),
            g.bands(),
            g.output_pixel_type(),
        )?;
        self.import_pixels(pds, Self::layout(pds), options, sink)
    }

    /// Import the embedded tables of `label`, recording the ones that fail.
    pub fn import_tables(&mut self, label: &Label) -> Vec<Table> {
        let import = import_tables(label, &self.input);
        self.diagnostics.extend(import.diagnostics);
        import.tables
    }

    /// Import the embedded tables of `label` into `sink`.
    pub fn write_tables(&mut self, label: &Label, sink: &mut dyn CubeSink) -> Result<(), IngestError> {
        for table in self.import_tables(label) {
            sink.write_table(table)?;
        }
        Ok(())
    }

    /// Apply the `Auto` rules of the tables `names` to `input`, writing into `output`.
    pub fn translate_into(
        &self,
        input: &PvlContainer,
        names: &[&str],
        output: &mut PvlContainer,
    ) -> Result<(), IngestError> {
        for name in names {
            let table = self.library.table(name)?;
            Translator::new(input, &table).auto(output)?;
        }
        Ok(())
    }

    /// Translate `label` with the tables `names` into a fresh container.
    pub fn translate(&self, label: &PvlContainer, names: &[&str]) -> Result<PvlContainer, IngestError> {
        let mut output = PvlContainer::root();
        self.translate_into(label, names, &mut output)?;
        Ok(output)
    }

    /// Finish an output: groups, original label and table diagnostics.
    pub fn finish(
        &self,
        label: &Label,
        groups: &PvlContainer,
        sink: &mut dyn CubeSink,
    ) -> Result<(), IngestError> {
        put_groups(groups, sink)?;
        if self.config.keep_original_label {
            sink.write_original_label(label)?;
        }
        if !self.diagnostics.is_empty() {
            sink.put_group(diagnostics_group(&self.diagnostics))?;
        }
        Ok(())
    }

    /// [`DriverContext::finish`] for every output created so far.
    pub fn finish_all(
        &self,
        label: &Label,
        groups: &PvlContainer,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError> {
        for role in outputs.roles() {
            self.finish(label, groups, outputs.sink(role)?)?;
        }
        Ok(())
    }
}

/// Put every group of `groups` into `sink`; groups nested in an `IsisCube` object count too.
pub fn put_groups(groups: &PvlContainer, sink: &mut dyn CubeSink) -> Result<(), IngestError> {
    for container in groups.containers() {
        match container.kind {
            ContainerKind::Group => sink.put_group(container.clone())?,
            ContainerKind::Object | ContainerKind::Root => {
                for group in container.groups() {
                    sink.put_group(group.clone())?;
                }
            }
        }
    }
    Ok(())
}

/// `Diagnostics` group listing the tables that were skipped.
pub fn diagnostics_group(diagnostics: &[TableDiagnostic]) -> PvlContainer {
    let mut group = PvlContainer::new_group("Diagnostics");
    for diagnostic in diagnostics {
        group.add_keyword(Keyword::sequence(
            "SkippedTable",
            [
                diagnostic.pointer.clone(),
                diagnostic.error.kind().to_string(),
                diagnostic.error.to_string(),
            ],
        ));
    }
    group
}

/// Group `name` of `groups`, created when missing.
pub fn group_mut<'c>(groups: &'c mut PvlContainer, name: &str) -> &'c mut PvlContainer {
    groups.path_or_create(&[(ContainerKind::Group, name)])
}

/// Text of keyword `name` in group `group` of `groups`.
pub fn group_value<'c>(groups: &'c PvlContainer, group: &str, name: &str) -> Option<&'c str> {
    groups
        .find_group(group)
        .and_then(|g| g.keyword(name))
        .and_then(|k| k.as_str().ok())
}

/// Path of the directory holding `path`.
pub fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    path.parent().unwrap_or(Utf8Path::new("."))
}
