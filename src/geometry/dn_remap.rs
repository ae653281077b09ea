//! # DN lookup tables
//!
//! Some instruments downlink companded 8-bit data (CTX, MARCI, HiRISE). A [`DnRemap`] maps each
//! raw value back to the instrument DN before calibration. The table is indexed by the raw value,
//! so it carries one entry per possible input value (256 for 8-bit data, 65536 for 16-bit data).

use crate::constants::NULL8;
use crate::ingest_errors::IngestError;

/// A monotonic non-decreasing lookup table from raw DN to instrument DN.
#[derive(Debug, Clone, PartialEq)]
pub struct DnRemap {
    table: Vec<f64>,
}

impl DnRemap {
    /// Wrap `table`, rejecting an empty, non-finite or decreasing one.
    pub fn new(table: Vec<f64>) -> Result<Self, IngestError> {
        if table.is_empty() {
            return Err(IngestError::InvalidGeometry("empty DN lookup table".into()));
        }
        if let Some(i) = table.iter().position(|v| !v.is_finite()) {
            return Err(IngestError::InvalidGeometry(format!(
                "DN lookup table entry {i} is not finite"
            )));
        }
        if let Some(i) = table.windows(2).position(|w| w[1] < w[0]) {
            return Err(IngestError::InvalidGeometry(format!(
                "DN lookup table decreases between entries {i} and {}",
                i + 1
            )));
        }
        Ok(DnRemap { table })
    }

    /// Inverse of the onboard square-root companding: `table[e] = round(e² · max / 255²)`.
    ///
    /// Arguments
    /// -----------------
    /// * `max`: instrument DN that the encoded value 255 expands to (4095 for 12-bit cameras).
    pub fn sqrt_inverse(max: f64) -> Self {
        let scale = max / (255.0 * 255.0);
        let table = (0..=255u32)
            .map(|e| (f64::from(e * e) * scale).round())
            .collect();
        DnRemap { table }
    }

    /// Parse a table from text: one value per line or per comma, `#` starts a comment.
    pub fn from_text(text: &str) -> Result<Self, IngestError> {
        let mut table = Vec::new();
        for line in text.lines() {
            let data = line.split('#').next().unwrap_or_default();
            for field in data.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                let value = field.parse::<f64>().map_err(|_| IngestError::InvalidValue {
                    keyword: "DnRemap".into(),
                    value: field.to_string(),
                    reason: "not a number".into(),
                })?;
                table.push(value);
            }
        }
        Self::new(table)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &[f64] {
        &self.table
    }

    /// Look up `raw`; a value outside the table becomes NULL.
    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        if raw < 0.0 || raw.fract() != 0.0 {
            return NULL8;
        }
        self.table.get(raw as usize).copied().unwrap_or(NULL8)
    }
}
