//! # Control networks
//!
//! ## Overview
//!
//! A control network ties images together through control points: each point holds one measure
//! (an image serial number and a sample/line position) per image it was found in. Networks are
//! read from their PVL form:
//!
//! ```text
//! Object = ControlNetwork
//!   NetworkId = Example
//!   Object = ControlPoint
//!     PointId = P001
//!     Group = ControlMeasure
//!       SerialNumber = MRO/CTX/0901234567:123
//!       Sample       = 100.5
//!       Line         = 200.0
//!     End_Group
//!   End_Object
//! End_Object
//! End
//! ```
//!
//! [`check`] runs the sanity pass over a network and the cubes it refers to.

pub mod check;

use camino::Utf8Path;

use crate::ingest_errors::IngestError;
use crate::label::{Label, PvlContainer};

pub use check::{CnetCheck, CnetCheckReport};

/// One image position of a control point.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMeasure {
    pub serial: String,
    pub sample: f64,
    pub line: f64,
    pub ignore: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint {
    pub id: String,
    pub ignore: bool,
    pub measures: Vec<ControlMeasure>,
}

impl ControlPoint {
    /// Measures that are not ignored.
    pub fn valid_measures(&self) -> impl Iterator<Item = &ControlMeasure> {
        self.measures.iter().filter(|m| !m.ignore)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlNet {
    pub network_id: String,
    pub points: Vec<ControlPoint>,
}

fn flag(container: &PvlContainer, name: &str) -> bool {
    container
        .keyword(name)
        .and_then(|k| k.as_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("TRUE") || v.eq_ignore_ascii_case("YES"))
}

fn bad(message: impl Into<String>) -> IngestError {
    IngestError::BadControlNet(message.into())
}

fn coordinate(group: &PvlContainer, name: &str, point: &str) -> Result<f64, IngestError> {
    match group.keyword(name) {
        Some(keyword) => keyword
            .as_f64()
            .map_err(|e| bad(format!("point [{point}]: {e}"))),
        None => Ok(0.0),
    }
}

impl ControlNet {
    pub fn from_file(path: &Utf8Path) -> Result<Self, IngestError> {
        let text = std::fs::read(path)?;
        let label = crate::label::parse_label(&text)
            .map_err(|e| bad(format!("[{path}] is not a PVL control network: {e}")))?;
        Self::from_label(&label)
    }

    pub fn from_label(label: &Label) -> Result<Self, IngestError> {
        let network = label
            .find_object("ControlNetwork")
            .ok_or_else(|| bad("no ControlNetwork object"))?;
        let network_id = network
            .keyword("NetworkId")
            .and_then(|k| k.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut points = Vec::new();
        for object in network.objects().filter(|o| o.is_named("ControlPoint")) {
            let id = object
                .keyword("PointId")
                .and_then(|k| k.as_str().ok())
                .ok_or_else(|| bad(format!("control point {} has no PointId", points.len() + 1)))?
                .to_string();
            let measures = object
                .groups()
                .filter(|g| g.is_named("ControlMeasure"))
                .map(|group| {
                    let serial = group
                        .keyword("SerialNumber")
                        .and_then(|k| k.as_str().ok())
                        .ok_or_else(|| bad(format!("point [{id}] has a measure without SerialNumber")))?
                        .to_string();
                    Ok(ControlMeasure {
                        serial,
                        sample: coordinate(group, "Sample", &id)?,
                        line: coordinate(group, "Line", &id)?,
                        ignore: flag(group, "Ignore"),
                    })
                })
                .collect::<Result<Vec<_>, IngestError>>()?;
            points.push(ControlPoint {
                ignore: flag(object, "Ignore"),
                id,
                measures,
            });
        }
        Ok(ControlNet { network_id, points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
