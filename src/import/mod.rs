//! # Pixel-stream import
//!
//! Walks a raw byte stream described by a frozen [`GeometryDescriptor`] and hands normalized lines
//! to a [`CubeSink`].
//!
//! ## Overview
//!
//! - [`PixelImporter`]: the band/line loop for BSQ, BIL and BIP streams.
//! - [`LayoutPolicy`]: where the stream comes from and which reader walks it.
//! - [`ImportOptions`] / [`SideBuffers`]: optional capture of the non-pixel byte runs
//!   (file header, data headers and trailers, line prefixes and suffixes).
//! - [`CancelToken`]: cooperative cancellation.
//! - [`sample_codec`]: raw sample decoding.
//! - [`vims`]: the Cassini VIMS reader with sideplanes.
//!
//! ## Per-sample processing
//!
//! ```text
//! raw ──► DN lookup ──► multiplier·dn + base ──► special ranges ──► sink
//! ```
//!
//! Samples that decode to a sentinel (float sentinel bit patterns) skip the last three steps.
//!
//! ## Example
//!
//! ```rust
//! use pds2cube::cube::{CubeSink, MemoryCube};
//! use pds2cube::geometry::{GeometryDescriptor, PixelType};
//! use pds2cube::import::{LayoutPolicy, PixelImporter};
//! use camino::Utf8Path;
//!
//! let geometry = GeometryDescriptor::builder()
//!     .dimensions(2, 2, 1)
//!     .pixel_type(PixelType::U8)
//!     .build()
//!     .unwrap();
//! let mut cube = MemoryCube::new();
//! cube.create(Utf8Path::new("a.cub"), 2, 2, 1, geometry.output_pixel_type()).unwrap();
//! let summary = PixelImporter::new(&geometry, LayoutPolicy::RawWithHeader)
//!     .import(&[1u8, 2, 3, 4][..], &mut cube)
//!     .unwrap();
//! assert_eq!(summary.bytes_consumed, 4);
//! assert_eq!(cube.get(1, 1, 0), 4.0);
//! ```

pub(crate) mod progress;
pub mod sample_codec;
pub mod vims;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camino::Utf8Path;
use log::debug;

use crate::cube::CubeSink;
use crate::geometry::special_pixel::is_special;
use crate::geometry::{DnRemap, GeometryDescriptor, Organization, SpecialRanges};
use crate::ingest_errors::IngestError;
use crate::table::Table;
use progress::LineProgress;
use sample_codec::decode_samples;

/// How the pixel stream is laid out and located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutPolicy {
    /// Pixels follow the label in the same file.
    #[default]
    AttachedPds,
    /// Pixels live in a file named by the label pointer.
    DetachedPds,
    /// Cassini VIMS BIL qube: one sideplane per band line, backplanes after every line record.
    VimsBilWithSideplanes {
        sideplane_items: usize,
        backplane_items: usize,
    },
    /// Caller-supplied geometry; the file header bytes are skipped as given.
    RawWithHeader,
}

/// Which non-pixel byte runs to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportOptions {
    pub save_file_header: bool,
    pub save_data_headers: bool,
    pub save_data_trailers: bool,
    pub save_prefixes: bool,
    pub save_suffixes: bool,
    pub show_progress: bool,
}

impl ImportOptions {
    pub fn with_prefixes(mut self, v: bool) -> Self {
        self.save_prefixes = v;
        self
    }

    pub fn with_suffixes(mut self, v: bool) -> Self {
        self.save_suffixes = v;
        self
    }

    pub fn with_file_header(mut self, v: bool) -> Self {
        self.save_file_header = v;
        self
    }

    pub fn with_data_headers(mut self, v: bool) -> Self {
        self.save_data_headers = v;
        self
    }

    pub fn with_data_trailers(mut self, v: bool) -> Self {
        self.save_data_trailers = v;
        self
    }

    pub fn with_progress(mut self, v: bool) -> Self {
        self.show_progress = v;
        self
    }
}

/// Byte runs captured during an import.
///
/// Runs are indexed in cube order, whatever the stream order was:
///
/// | run | BSQ | BIL | BIP |
/// |-----|-----|-----|-----|
/// | `data_headers`, `data_trailers` | band | line | line |
/// | `prefixes` | `band·lines + line` | `band·lines + line` | line |
/// | `suffixes` | `band·lines + line` | `band·lines + line` | `band·lines + line` |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideBuffers {
    pub file_header: Vec<u8>,
    pub data_headers: Vec<Vec<u8>>,
    pub data_trailers: Vec<Vec<u8>>,
    pub prefixes: Vec<Vec<u8>>,
    pub suffixes: Vec<Vec<u8>>,
}

impl SideBuffers {
    fn sized(geometry: &GeometryDescriptor, options: &ImportOptions) -> Self {
        let (lines, bands) = (geometry.lines(), geometry.bands());
        let records = match geometry.organization() {
            Organization::Bsq => bands,
            Organization::Bil | Organization::Bip => lines,
        };
        let prefixes = match geometry.organization() {
            Organization::Bip => lines,
            _ => lines * bands,
        };
        let keep = |flag: bool, n: usize| if flag { vec![Vec::new(); n] } else { Vec::new() };
        SideBuffers {
            file_header: Vec::new(),
            data_headers: keep(options.save_data_headers, records),
            data_trailers: keep(options.save_data_trailers, records),
            prefixes: keep(options.save_prefixes, prefixes),
            suffixes: keep(options.save_suffixes, lines * bands),
        }
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What an import read and produced besides the pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub bytes_consumed: u64,
    pub lines_written: usize,
    pub side: SideBuffers,
    /// Tables produced by the reader itself (VIMS sideplanes).
    pub tables: Vec<Table>,
}

/// Read-only byte source that counts what it consumed.
pub(crate) struct ByteCursor<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> ByteCursor<R> {
    pub(crate) fn new(inner: R) -> Self {
        ByteCursor { inner, offset: 0 }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), IngestError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += filled as u64;
        if filled < buf.len() {
            return Err(IngestError::TruncatedPixelStream {
                offset: self.offset,
                expected_bytes: (buf.len() - filled) as u64,
            });
        }
        Ok(())
    }

    /// Consume `n` bytes, keeping them when `keep` is set.
    pub(crate) fn take(&mut self, n: u64, keep: bool) -> Result<Vec<u8>, IngestError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if keep {
            let mut buf = vec![0u8; n as usize];
            self.read_exact(&mut buf)?;
            return Ok(buf);
        }
        let skipped = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        self.offset += skipped;
        if skipped < n {
            return Err(IngestError::TruncatedPixelStream {
                offset: self.offset,
                expected_bytes: n - skipped,
            });
        }
        Ok(Vec::new())
    }
}

/// Maps decoded raw samples to internal values for one band.
pub(crate) struct SampleMapper<'a> {
    remap: Option<&'a DnRemap>,
    ranges: &'a SpecialRanges,
    base: f64,
    multiplier: f64,
}

impl<'a> SampleMapper<'a> {
    pub(crate) fn new(geometry: &'a GeometryDescriptor, band: usize) -> Self {
        let (base, multiplier) = geometry.calibration().for_band(band);
        SampleMapper {
            remap: geometry.dn_remap(),
            ranges: geometry.special_ranges(),
            base,
            multiplier,
        }
    }

    #[inline]
    pub(crate) fn map(&self, raw: f64) -> f64 {
        if is_special(raw) {
            return raw;
        }
        let dn = match self.remap {
            Some(table) => table.apply(raw),
            None => raw,
        };
        if is_special(dn) {
            return dn;
        }
        self.ranges.classify(self.multiplier * dn + self.base)
    }

    pub(crate) fn map_line(&self, line: &mut [f64]) {
        for v in line.iter_mut() {
            *v = self.map(*v);
        }
    }
}

/// The band/line loop of a pixel import.
pub struct PixelImporter<'a> {
    geometry: &'a GeometryDescriptor,
    policy: LayoutPolicy,
    options: ImportOptions,
    cancel: CancelToken,
}

impl<'a> PixelImporter<'a> {
    pub fn new(geometry: &'a GeometryDescriptor, policy: LayoutPolicy) -> Self {
        PixelImporter {
            geometry,
            policy,
            options: ImportOptions::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn geometry(&self) -> &GeometryDescriptor {
        self.geometry
    }

    /// Open `path` and import it.
    pub fn import_file<S: CubeSink + ?Sized>(
        &self,
        path: &Utf8Path,
        sink: &mut S,
    ) -> Result<ImportSummary, IngestError> {
        debug!("Importing pixels from {path} ({:?})", self.policy);
        let file = File::open(path)
            .map_err(|_| IngestError::DataFileNotFound(path.to_string()))?;
        self.import(BufReader::new(file), sink)
    }

    /// Import the stream `source`, positioned at its first byte (before the file header).
    ///
    /// Arguments
    /// -----------------
    /// * `source`: the raw stream; only read sequentially.
    /// * `sink`: a created cube of at least `samples × lines × bands`.
    ///
    /// Return
    /// ----------
    /// * The bytes consumed, the captured side buffers and any reader tables, or
    ///   `TruncatedPixelStream` on a short read and `Cancelled` when the token fires.
    pub fn import<R: Read, S: CubeSink + ?Sized>(
        &self,
        source: R,
        sink: &mut S,
    ) -> Result<ImportSummary, IngestError> {
        let mut cursor = ByteCursor::new(source);
        let mut summary = ImportSummary {
            side: SideBuffers::sized(self.geometry, &self.options),
            ..Default::default()
        };
        summary.side.file_header =
            cursor.take(self.geometry.file_header_bytes(), self.options.save_file_header)?;

        match self.policy {
            LayoutPolicy::VimsBilWithSideplanes {
                sideplane_items,
                backplane_items,
            } => {
                summary.tables = vims::read_vims_bil(
                    self.geometry,
                    sideplane_items,
                    backplane_items,
                    &mut cursor,
                    sink,
                    &self.cancel,
                )?;
                summary.lines_written = self.geometry.lines() * self.geometry.bands();
            }
            _ => match self.geometry.organization() {
                Organization::Bsq => self.walk_bsq(&mut cursor, sink, &mut summary)?,
                Organization::Bil => self.walk_bil(&mut cursor, sink, &mut summary)?,
                Organization::Bip => self.walk_bip(&mut cursor, sink, &mut summary)?,
            },
        }
        summary.bytes_consumed = cursor.offset();
        debug!(
            "Imported {} lines, {} bytes consumed",
            summary.lines_written, summary.bytes_consumed
        );
        Ok(summary)
    }

    fn walk_bsq<R: Read, S: CubeSink + ?Sized>(
        &self,
        cursor: &mut ByteCursor<R>,
        sink: &mut S,
        summary: &mut ImportSummary,
    ) -> Result<(), IngestError> {
        let g = self.geometry;
        let o = &self.options;
        let (samples, lines) = (g.samples(), g.lines());
        let mut raw = vec![0u8; g.pixel_line_bytes() as usize];
        let mut line_buf = vec![0.0; samples];
        let progress = LineProgress::new((lines * g.bands()) as u64, o.show_progress);

        for band in 0..g.bands() {
            if self.cancel.is_cancelled() {
                return Err(IngestError::Cancelled { band, line: 0 });
            }
            let mapper = SampleMapper::new(g, band);
            let header = cursor.take(g.data_header_bytes(), o.save_data_headers)?;
            store(&mut summary.side.data_headers, band, header);
            for line in 0..lines {
                let index = band * lines + line;
                let prefix = cursor.take(g.data_prefix_bytes(), o.save_prefixes)?;
                store(&mut summary.side.prefixes, index, prefix);
                cursor.read_exact(&mut raw)?;
                decode_samples(&raw, g.pixel_type(), g.byte_order(), &mut line_buf);
                mapper.map_line(&mut line_buf);
                sink.write_line(&line_buf, line, band)?;
                summary.lines_written += 1;
                let suffix = cursor.take(g.data_suffix_bytes(), o.save_suffixes)?;
                store(&mut summary.side.suffixes, index, suffix);
                progress.inc();
            }
            let trailer = cursor.take(g.data_trailer_bytes(), o.save_data_trailers)?;
            store(&mut summary.side.data_trailers, band, trailer);
        }
        progress.finish();
        Ok(())
    }

    fn walk_bil<R: Read, S: CubeSink + ?Sized>(
        &self,
        cursor: &mut ByteCursor<R>,
        sink: &mut S,
        summary: &mut ImportSummary,
    ) -> Result<(), IngestError> {
        let g = self.geometry;
        let o = &self.options;
        let (samples, lines, bands) = (g.samples(), g.lines(), g.bands());
        let mut raw = vec![0u8; g.pixel_line_bytes() as usize];
        let mut line_buf = vec![0.0; samples];
        let mappers: Vec<SampleMapper> = (0..bands).map(|b| SampleMapper::new(g, b)).collect();
        let progress = LineProgress::new(lines as u64, o.show_progress);

        for line in 0..lines {
            if self.cancel.is_cancelled() {
                return Err(IngestError::Cancelled { band: 0, line });
            }
            let header = cursor.take(g.data_header_bytes(), o.save_data_headers)?;
            store(&mut summary.side.data_headers, line, header);
            for (band, mapper) in mappers.iter().enumerate() {
                let index = band * lines + line;
                let prefix = cursor.take(g.data_prefix_bytes(), o.save_prefixes)?;
                store(&mut summary.side.prefixes, index, prefix);
                cursor.read_exact(&mut raw)?;
                decode_samples(&raw, g.pixel_type(), g.byte_order(), &mut line_buf);
                mapper.map_line(&mut line_buf);
                sink.write_line(&line_buf, line, band)?;
                summary.lines_written += 1;
                let suffix = cursor.take(g.data_suffix_bytes(), o.save_suffixes)?;
                store(&mut summary.side.suffixes, index, suffix);
            }
            let trailer = cursor.take(g.data_trailer_bytes(), o.save_data_trailers)?;
            store(&mut summary.side.data_trailers, line, trailer);
            progress.inc();
        }
        progress.finish();
        Ok(())
    }

    fn walk_bip<R: Read, S: CubeSink + ?Sized>(
        &self,
        cursor: &mut ByteCursor<R>,
        sink: &mut S,
        summary: &mut ImportSummary,
    ) -> Result<(), IngestError> {
        let g = self.geometry;
        let o = &self.options;
        let (samples, lines, bands) = (g.samples(), g.lines(), g.bands());
        let mut raw = vec![0u8; g.pixel_line_bytes() as usize * bands];
        let mut pixels = vec![0.0; samples * bands];
        let mut line_buf = vec![0.0; samples];
        let mappers: Vec<SampleMapper> = (0..bands).map(|b| SampleMapper::new(g, b)).collect();
        let progress = LineProgress::new(lines as u64, o.show_progress);

        for line in 0..lines {
            if self.cancel.is_cancelled() {
                return Err(IngestError::Cancelled { band: 0, line });
            }
            let header = cursor.take(g.data_header_bytes(), o.save_data_headers)?;
            store(&mut summary.side.data_headers, line, header);
            let prefix = cursor.take(g.data_prefix_bytes(), o.save_prefixes)?;
            store(&mut summary.side.prefixes, line, prefix);
            cursor.read_exact(&mut raw)?;
            decode_samples(&raw, g.pixel_type(), g.byte_order(), &mut pixels);
            for (band, mapper) in mappers.iter().enumerate() {
                for (sample, slot) in line_buf.iter_mut().enumerate() {
                    *slot = mapper.map(pixels[sample * bands + band]);
                }
                sink.write_line(&line_buf, line, band)?;
                summary.lines_written += 1;
            }
            for band in 0..bands {
                let suffix = cursor.take(g.data_suffix_bytes(), o.save_suffixes)?;
                store(&mut summary.side.suffixes, band * lines + line, suffix);
            }
            let trailer = cursor.take(g.data_trailer_bytes(), o.save_data_trailers)?;
            store(&mut summary.side.data_trailers, line, trailer);
            progress.inc();
        }
        progress.finish();
        Ok(())
    }
}

/// Put a captured run in its slot; runs that are not kept have no slots.
fn store(slots: &mut [Vec<u8>], index: usize, bytes: Vec<u8>) {
    if let Some(slot) = slots.get_mut(index) {
        *slot = bytes;
    }
}
