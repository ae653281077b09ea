//! # Ingest: the entry point
//!
//! This module defines [`Ingest`], the façade that wires together
//!
//! 1. the **configuration** ([`IngestConfig`]) and the translation tables it selects,
//! 2. the **driver registry** ([`DriverRegistry`]) that picks the mission pipeline of a product,
//! 3. the optional **collaborators**: a [`SpiceClock`] and a [`Decompressor`].
//!
//! One [`Ingest`] can convert any number of products; each call builds a fresh
//! [`DriverContext`], so nothing leaks from one product to the next.
//!
//! ## Typical usage
//!
//! ```rust, no_run
//! use camino::Utf8Path;
//! use pds2cube::config::IngestConfigBuilder;
//! use pds2cube::ingest::Ingest;
//!
//! let config = IngestConfigBuilder::new().build().unwrap();
//! let report = Ingest::new(config)
//!     .run(Utf8Path::new("P01_001234_1234_XI_12N123W.IMG"), Utf8Path::new("ctx.cub"))
//!     .unwrap();
//! println!("{} wrote {:?}", report.driver, report.outputs);
//! ```
//!
//! ## Failures
//!
//! Any error aborts the ingest. With [`Ingest::run`] nothing is left on disk: the output files are
//! only persisted once every output has been written.

use camino::{Utf8Path, Utf8PathBuf};
use log::info;

use crate::config::IngestConfig;
use crate::decompress::Decompressor;
use crate::drivers::{Driver, DriverContext, DriverRegistry, FileOutputs, OutputSet};
use crate::ingest_errors::IngestError;
use crate::spice::SpiceClock;
use crate::table::TableDiagnostic;
use crate::translation::TranslationLibrary;

/// Outcome of a successful ingest.
#[derive(Debug, PartialEq)]
pub struct IngestReport {
    /// Name of the driver that ran.
    pub driver: &'static str,
    /// Cubes written, primary first.
    pub outputs: Vec<Utf8PathBuf>,
    /// Embedded tables that were skipped.
    pub diagnostics: Vec<TableDiagnostic>,
    /// Label repairs and other recoverable oddities.
    pub warnings: Vec<String>,
}

/// Converts PDS products into cubes.
pub struct Ingest {
    config: IngestConfig,
    library: TranslationLibrary,
    registry: DriverRegistry,
    spice: Option<Box<dyn SpiceClock>>,
    decompressor: Option<Box<dyn Decompressor>>,
}

impl std::fmt::Debug for Ingest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingest")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("spice", &self.spice.is_some())
            .field("decompressor", &self.decompressor.is_some())
            .finish()
    }
}

impl Ingest {
    /// Construct an [`Ingest`] without collaborators.
    ///
    /// Arguments
    /// -----------------
    /// * `config`: options of every ingest run through this instance.
    ///
    /// Return
    /// ----------
    /// * The façade. Drivers that need SPICE or a decompressor fail with `Collaborator` until one
    ///   is attached with [`Ingest::with_spice`] or [`Ingest::with_decompressor`].
    pub fn new(config: IngestConfig) -> Self {
        Ingest {
            library: config.library(),
            config,
            registry: DriverRegistry::new(),
            spice: None,
            decompressor: None,
        }
    }

    pub fn with_spice(mut self, spice: impl SpiceClock + 'static) -> Self {
        self.spice = Some(Box::new(spice));
        self
    }

    pub fn with_decompressor(mut self, decompressor: impl Decompressor + 'static) -> Self {
        self.decompressor = Some(Box::new(decompressor));
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Convert the product whose label is at `from` into the cube `to` (and its siblings for
    /// drivers with several outputs).
    ///
    /// Arguments
    /// -----------------
    /// * `from`: the PDS label, attached or detached.
    /// * `to`: path of the primary output cube.
    ///
    /// Return
    /// ----------
    /// * The [`IngestReport`], or the first error. On error no output file exists.
    pub fn run(&self, from: &Utf8Path, to: &Utf8Path) -> Result<IngestReport, IngestError> {
        let mut outputs = FileOutputs::new(to);
        let mut report = self.run_into(from, &mut outputs)?;
        report.outputs = outputs.close_all()?;
        Ok(report)
    }

    /// [`Ingest::run`] into caller-provided outputs, which are left open.
    pub fn run_into(
        &self,
        from: &Utf8Path,
        outputs: &mut dyn OutputSet,
    ) -> Result<IngestReport, IngestError> {
        let driver = self.registry.resolve(from, self.config.driver.as_deref())?;
        self.run_driver(driver, from, outputs)
    }

    /// Run `driver` on `from`, skipping detection.
    pub fn run_driver(
        &self,
        driver: &dyn Driver,
        from: &Utf8Path,
        outputs: &mut dyn OutputSet,
    ) -> Result<IngestReport, IngestError> {
        let mut ctx = DriverContext::new(from, &self.config, &self.library)
            .with_spice(self.spice.as_deref())
            .with_decompressor(self.decompressor.as_deref());
        let label = driver.read_label(&mut ctx)?;
        driver.ingest(&mut ctx, &label, outputs)?;

        let outputs = outputs
            .roles()
            .into_iter()
            .map(|role| outputs.path(role))
            .collect::<Vec<_>>();
        info!(
            "{} ingested [{from}] into {} cube(s), {} table diagnostic(s)",
            driver.name(),
            outputs.len(),
            ctx.diagnostics.len()
        );
        Ok(IngestReport {
            driver: driver.name(),
            outputs,
            diagnostics: std::mem::take(&mut ctx.diagnostics),
            warnings: std::mem::take(&mut ctx.warnings),
        })
    }
}

#[cfg(test)]
mod test_ingest {
    use super::*;
    use crate::config::IngestConfigBuilder;
    use crate::drivers::MemoryOutputs;

    #[test]
    fn test_unknown_forced_driver() {
        let config = IngestConfigBuilder::new().driver("mariner").build().unwrap();
        let mut outputs = MemoryOutputs::new("out.cub");
        let err = Ingest::new(config)
            .run_into(Utf8Path::new("missing.img"), &mut outputs)
            .unwrap_err();
        assert_eq!(err.kind(), "WrongProduct");
        assert!(outputs.roles().is_empty());
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let to = Utf8PathBuf::from_path_buf(dir.path().join("out.cub")).unwrap();
        let err = Ingest::new(IngestConfig::default())
            .run(Utf8Path::new("/nonexistent/product.img"), &to)
            .unwrap_err();
        assert_eq!(err.kind(), "IoError");
        assert!(!to.exists());
    }
}
