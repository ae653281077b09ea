//! Decompressor collaborator.
//!
//! Compressed products (Voyager `.IMQ`) are expanded to a scratch file before their label is read.
//! [`ExternalDecompressor`] runs a program as `program [args…] INPUT OUTPUT`.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use crate::ingest_errors::IngestError;

/// Expands a compressed product into `output`.
pub trait Decompressor {
    fn decompress(&self, input: &Utf8Path, output: &Utf8Path) -> Result<(), IngestError>;
}

/// A decompressor run as a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDecompressor {
    program: Utf8PathBuf,
    args: Vec<String>,
}

impl ExternalDecompressor {
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        ExternalDecompressor {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the input and output paths.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Utf8Path {
        &self.program
    }
}

impl Decompressor for ExternalDecompressor {
    fn decompress(&self, input: &Utf8Path, output: &Utf8Path) -> Result<(), IngestError> {
        debug!("Running {} {:?} {input} {output}", self.program, self.args);
        let status = Command::new(self.program.as_std_path())
            .args(&self.args)
            .arg(input.as_std_path())
            .arg(output.as_std_path())
            .status()
            .map_err(|e| IngestError::Collaborator(format!("cannot run {}: {e}", self.program)))?;
        if !status.success() {
            return Err(IngestError::Collaborator(format!(
                "unable to decompress [{input}]: {} exited with {status}",
                self.program
            )));
        }
        if !output.is_file() {
            return Err(IngestError::Collaborator(format!(
                "{} did not produce [{output}]",
                self.program
            )));
        }
        Ok(())
    }
}
