//! # Control network check
//!
//! ## Overview
//!
//! [`CnetCheck::run`] walks a [`ControlNet`] against the [`SerialNumberList`] of the cubes it is
//! supposed to tie together and reports:
//!
//! * **islands**: sets of cubes connected to each other by control points but not to the rest
//!   (found by a depth-first search over the cubes sharing a point with at least two valid
//!   measures);
//! * **single measure**: cubes holding the only valid measure of a point;
//! * **duplicate measures**: points measured twice on the same cube;
//! * **no control**: listed cubes no measure refers to;
//! * **no cube**: serial numbers of the network missing from the list;
//! * **single cube**: cubes measured exactly once in the whole network;
//! * **low coverage**: cubes whose measures span a convex hull smaller than `tolerance` times the
//!   image area.
//!
//! The report renders as a `Results` group, a text summary and one delimited file per
//! non-empty finding.

use std::collections::{BTreeMap, BTreeSet};

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Area, ConvexHull, MultiPoint, Point};
use log::{debug, info};

use super::ControlNet;
use crate::cube::{CubeCache, CubeInfo, CubeOpener};
use crate::ingest_errors::IngestError;
use crate::label::{Keyword, PvlContainer};
use crate::serial::SerialNumberList;

/// Default share of the image a cube's measures must span.
pub const DEFAULT_TOLERANCE: f64 = 0.0;

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Cube handles that know their size.
pub trait CubeExtent {
    /// `(samples, lines)`.
    fn extent(&self) -> (usize, usize);
}

impl CubeExtent for CubeInfo {
    fn extent(&self) -> (usize, usize) {
        (self.samples, self.lines)
    }
}

/// Options of a check.
#[derive(Debug, Clone, PartialEq)]
pub struct CnetCheck {
    /// Skip ignored points and measures.
    pub ignore: bool,
    /// Coverage ratio under which a cube is reported; 0 disables the coverage check.
    pub tolerance: f64,
    /// Field delimiter of the report files.
    pub delimiter: u8,
}

impl Default for CnetCheck {
    fn default() -> Self {
        CnetCheck {
            ignore: true,
            tolerance: DEFAULT_TOLERANCE,
            delimiter: b',',
        }
    }
}

/// Findings of one check, keyed by serial number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CnetCheckReport {
    pub network_id: String,
    pub islands: Vec<BTreeSet<String>>,
    /// Serial → ids of the points it is the only valid measure of.
    pub single_measure: BTreeMap<String, BTreeSet<String>>,
    /// Serial → ids of the points measuring it more than once.
    pub duplicates: BTreeMap<String, BTreeSet<String>>,
    /// Listed serials without measures.
    pub no_control: Vec<String>,
    /// Serial → valid measure count, for network serials missing from the list.
    pub no_cube: BTreeMap<String, usize>,
    pub single_cube: BTreeSet<String>,
    /// Serial → coverage ratio of the cubes under the tolerance.
    pub low_coverage: BTreeMap<String, f64>,
    /// Listed serial → cube file, for the report files.
    files: BTreeMap<String, Utf8PathBuf>,
}

impl CnetCheck {
    pub fn new(tolerance: f64) -> Self {
        CnetCheck {
            tolerance,
            ..Self::default()
        }
    }

    /// Check `net` against the cubes of `serials`, opening them through `cache` for the coverage
    /// check.
    pub fn run<O>(
        &self,
        net: &ControlNet,
        serials: &SerialNumberList,
        cache: &mut CubeCache<O>,
    ) -> Result<CnetCheckReport, IngestError>
    where
        O: CubeOpener,
        O::Handle: CubeExtent,
    {
        let mut report = CnetCheckReport {
            network_id: net.network_id.clone(),
            files: serials
                .iter()
                .map(|e| (e.serial.clone(), e.path.clone()))
                .collect(),
            ..CnetCheckReport::default()
        };
        let mut measure_count: BTreeMap<&str, usize> = BTreeMap::new();
        let mut positions: BTreeMap<&str, Vec<Point<f64>>> = BTreeMap::new();
        let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for point in &net.points {
            if self.ignore && point.ignore {
                continue;
            }
            let measures = point
                .measures
                .iter()
                .filter(|m| !(self.ignore && m.ignore))
                .collect::<Vec<_>>();

            if let [only] = measures.as_slice() {
                report
                    .single_measure
                    .entry(only.serial.clone())
                    .or_default()
                    .insert(point.id.clone());
                *measure_count.entry(&only.serial).or_default() += 1;
                continue;
            }

            let mut seen = BTreeSet::new();
            for measure in &measures {
                let serial = measure.serial.as_str();
                *measure_count.entry(serial).or_default() += 1;
                positions
                    .entry(serial)
                    .or_default()
                    .push(Point::new(measure.sample, measure.line));
                if !seen.insert(serial) {
                    report
                        .duplicates
                        .entry(serial.to_string())
                        .or_default()
                        .insert(point.id.clone());
                }
                let neighbours = adjacency.entry(serial).or_default();
                neighbours.extend(measures.iter().map(|m| m.serial.as_str()).filter(|s| *s != serial));
            }
        }

        report.islands = find_islands(&adjacency);
        report.no_control = serials
            .iter()
            .filter(|e| !positions.contains_key(e.serial.as_str()))
            .map(|e| e.serial.clone())
            .collect();
        report.no_cube = positions
            .iter()
            .filter(|(serial, _)| !serials.has_serial_number(serial))
            .map(|(serial, p)| (serial.to_string(), p.len()))
            .collect();
        report.single_cube = measure_count
            .iter()
            .filter(|(_, count)| **count == 1)
            .map(|(serial, _)| serial.to_string())
            .collect();

        if self.tolerance > 0.0 {
            for entry in serials.iter() {
                let points = positions.get(entry.serial.as_str()).cloned().unwrap_or_default();
                let (samples, lines) = cache.open(&entry.path)?.extent();
                let ratio = coverage(points, samples, lines);
                debug!("{} covers {:.4} of its image", entry.serial, ratio);
                if ratio < self.tolerance {
                    report.low_coverage.insert(entry.serial.clone(), ratio);
                }
            }
        }

        info!(
            "Checked control network [{}]: {} points, {} islands",
            net.network_id,
            net.len(),
            report.islands.len()
        );
        Ok(report)
    }
}

/// Share of a `samples × lines` image covered by the convex hull of `points`.
pub fn coverage(points: Vec<Point<f64>>, samples: usize, lines: usize) -> f64 {
    let image_area = (samples * lines) as f64;
    if points.len() < 3 || image_area == 0.0 {
        return 0.0;
    }
    MultiPoint::new(points).convex_hull().unsigned_area() / image_area
}

/// Connected components of `adjacency`, found depth first from the smallest unvisited serial.
fn find_islands(adjacency: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<BTreeSet<String>> {
    let mut unvisited: BTreeSet<&str> = adjacency.keys().copied().collect();
    let mut islands = Vec::new();
    while let Some(&start) = unvisited.iter().next() {
        let mut island = BTreeSet::new();
        let mut stack = vec![start];
        unvisited.remove(start);
        while let Some(serial) = stack.pop() {
            island.insert(serial.to_string());
            for &next in adjacency.get(serial).into_iter().flatten() {
                if unvisited.remove(next) {
                    stack.push(next);
                }
            }
        }
        islands.push(island);
    }
    islands
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

impl CnetCheckReport {
    /// Cube file of `serial`, or an empty string when it is not listed.
    pub fn file_name(&self, serial: &str) -> &str {
        self.files.get(serial).map(|p| p.as_str()).unwrap_or("")
    }

    fn listed_rows<'a>(&self, serials: impl Iterator<Item = &'a String>) -> Vec<Vec<String>> {
        serials
            .map(|s| vec![self.file_name(s).to_string(), s.clone()])
            .collect()
    }

    /// Counts of every finding, `Islands` always present.
    pub fn results_group(&self) -> PvlContainer {
        let mut results = PvlContainer::new_group("Results");
        results.add_keyword(Keyword::new("Islands", self.islands.len().to_string()));
        let counts = [
            ("SingleMeasure", self.single_measure.len()),
            ("DuplicateMeasures", self.duplicates.len()),
            ("LowCoverage", self.low_coverage.len()),
            ("NoControl", self.no_control.len()),
            ("NoCube", self.no_cube.len()),
            ("SingleCube", self.single_cube.len()),
        ];
        for (name, count) in counts.into_iter().filter(|(_, c)| *c > 0) {
            results.add_keyword(Keyword::new(name, count.to_string()));
        }
        results
    }

    /// Human-readable summary, one ruled paragraph per finding.
    pub fn summary(&self, prefix: &str) -> String {
        let mut text = vec![RULE.to_string()];
        match self.islands.len() {
            0 => text.push(format!(
                "There are no control points in the provided Control Network [{}]",
                self.network_id
            )),
            1 => text.push("The cubes are fully connected by the Control Network.".into()),
            n => {
                text.push("The cubes are NOT fully connected by the Control Network.".into());
                text.push(format!("There are {n} disjoint sets of cubes."));
            }
        }
        let mut section = |lines: Vec<String>| {
            text.push(RULE.to_string());
            text.extend(lines);
        };
        if !self.single_measure.is_empty() {
            let n = self.single_measure.len();
            let cubes = if n == 1 {
                "is 1 cube".to_string()
            } else {
                format!("are {n} cubes")
            };
            section(vec![
                format!("There {cubes} in Control Points with only a single Control Measure."),
                format!("The serial numbers of these measures are listed in [{prefix}SinglePointCubes.txt]"),
            ]);
        }
        if !self.duplicates.is_empty() {
            section(vec![
                format!(
                    "{} measured more than once by the same Control Point.",
                    plural(self.duplicates.len(), "cube is", "cubes are")
                ),
                format!("These serial numbers are listed in [{prefix}DuplicateMeasures.txt]"),
            ]);
        }
        if !self.low_coverage.is_empty() {
            section(vec![
                format!(
                    "{} low coverage.",
                    plural(self.low_coverage.len(), "cube has", "cubes have")
                ),
                format!("These cubes are listed in [{prefix}LowCoverage.txt]"),
            ]);
        }
        if !self.no_control.is_empty() {
            section(vec![
                format!(
                    "{} in the input list not in the Control Network [{}].",
                    plural(self.no_control.len(), "cube is", "cubes are"),
                    self.network_id
                ),
                format!("These cubes are listed in [{prefix}NoControl.txt]"),
            ]);
        }
        if !self.no_cube.is_empty() {
            section(vec![
                format!(
                    "There are {} in the Control Net [{}] which do not exist in the input list.",
                    plural(self.no_cube.len(), "serial number", "serial numbers"),
                    self.network_id
                ),
                format!("These serial numbers are listed in [{prefix}NoCube.txt]"),
            ]);
        }
        if !self.single_cube.is_empty() {
            section(vec![
                format!(
                    "There are {} in the Control Net [{}] which only exist in one Control Measure.",
                    plural(self.single_cube.len(), "serial number", "serial numbers"),
                    self.network_id
                ),
                format!("These serial numbers are listed in [{prefix}SingleCube.txt]"),
            ]);
        }
        text.push(RULE.to_string());
        text.join("\n") + "\n"
    }

    /// Write one delimited file per non-empty finding, named after `prefix` (a path prefix such as
    /// `out/run1_`).
    ///
    /// Island files only list cubes of the input list and are skipped when an island has none.
    ///
    /// Return
    /// ----------
    /// * The paths written, in writing order.
    pub fn write_files(&self, prefix: &str, delimiter: u8) -> Result<Vec<Utf8PathBuf>, IngestError> {
        let mut written = Vec::new();
        for (i, island) in self.islands.iter().enumerate() {
            let rows = island
                .iter()
                .filter(|s| self.files.contains_key(s.as_str()))
                .map(|s| vec![self.file_name(s).to_string(), s.clone()])
                .collect::<Vec<_>>();
            if !rows.is_empty() {
                written.push(write_rows(&format!("{prefix}Island.{}", i + 1), delimiter, rows)?);
            }
        }

        let with_points = |map: &BTreeMap<String, BTreeSet<String>>| {
            map.iter()
                .map(|(serial, points)| {
                    let mut row = vec![self.file_name(serial).to_string(), serial.clone()];
                    row.extend(points.iter().cloned());
                    row
                })
                .collect::<Vec<_>>()
        };

        let files = [
            ("SinglePointCubes.txt", with_points(&self.single_measure)),
            ("DuplicateMeasures.txt", with_points(&self.duplicates)),
            (
                "LowCoverage.txt",
                self.low_coverage
                    .iter()
                    .map(|(s, r)| vec![self.file_name(s).to_string(), s.clone(), format!("{r:.6}")])
                    .collect(),
            ),
            ("NoControl.txt", self.listed_rows(self.no_control.iter())),
            (
                "NoCube.txt",
                self.no_cube
                    .iter()
                    .map(|(s, n)| vec![s.clone(), format!("(Valid Measures: {n})")])
                    .collect(),
            ),
            ("SingleCube.txt", self.listed_rows(self.single_cube.iter())),
        ];
        for (name, rows) in files {
            if !rows.is_empty() {
                written.push(write_rows(&format!("{prefix}{name}"), delimiter, rows)?);
            }
        }
        Ok(written)
    }
}

fn write_rows(path: &str, delimiter: u8, rows: Vec<Vec<String>>) -> Result<Utf8PathBuf, IngestError> {
    let path = Utf8Path::new(path).to_path_buf();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_path(&path)
        .map_err(csv_error)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush()?;
    debug!("Wrote {path}");
    Ok(path)
}

fn csv_error(error: csv::Error) -> IngestError {
    match error.into_kind() {
        csv::ErrorKind::Io(e) => IngestError::IoError(e),
        other => IngestError::BadControlNet(format!("{other:?}")),
    }
}
