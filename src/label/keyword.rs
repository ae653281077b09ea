//! # PVL keywords and values
//!
//! A [`Keyword`] is a name plus an ordered list of [`PvlValue`]s. Every value keeps its original
//! surface text; numeric interpretation only happens through the typed accessors
//! ([`Keyword::as_i64`], [`Keyword::get_f64`], ...), which report an
//! [`IngestError::InvalidValue`] naming the keyword when the text does not coerce.
//!
//! Value forms
//! -----------------
//! * [`ValueForm::Scalar`] – `KEY = value`
//! * [`ValueForm::Sequence`] – `KEY = (a, b, c)`
//! * [`ValueForm::Set`] – `KEY = {a, b}`
//!
//! Equality ignores the quoting style and the comments: `"MARS"` and `MARS` are the same value,
//! which is what makes `parse(emit(label)) == label` hold for programmatically built labels.

use std::fmt;

use smallvec::smallvec;

use crate::constants::ValueList;
use crate::ingest_errors::IngestError;

/// Surface style of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueStyle {
    /// Unquoted token.
    #[default]
    Bare,
    /// Quoted in the source (single or double quotes).
    Quoted,
    /// Nested sequence kept verbatim, e.g. `(1, 2)` inside `((1, 2), (3, 4))`.
    Nested,
}

/// How the values of a keyword were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueForm {
    #[default]
    Scalar,
    Sequence,
    Set,
}

/// One value of a keyword with its optional units.
#[derive(Debug, Clone, Default)]
pub struct PvlValue {
    pub text: String,
    pub units: Option<String>,
    pub style: ValueStyle,
}

impl PvlValue {
    pub fn new(text: impl Into<String>) -> Self {
        PvlValue {
            text: text.into(),
            units: None,
            style: ValueStyle::Bare,
        }
    }

    pub fn with_units(text: impl Into<String>, units: impl Into<String>) -> Self {
        PvlValue {
            text: text.into(),
            units: Some(units.into()),
            style: ValueStyle::Bare,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        PvlValue {
            text: text.into(),
            units: None,
            style: ValueStyle::Quoted,
        }
    }
}

impl PartialEq for PvlValue {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && match (&self.units, &other.units) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl From<&str> for PvlValue {
    fn from(text: &str) -> Self {
        PvlValue::new(text)
    }
}

impl From<String> for PvlValue {
    fn from(text: String) -> Self {
        PvlValue::new(text)
    }
}

impl fmt::Display for PvlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.style {
            ValueStyle::Nested => f.write_str(&self.text)?,
            ValueStyle::Quoted => write_quoted(f, &self.text)?,
            ValueStyle::Bare if needs_quotes(&self.text) => write_quoted(f, &self.text)?,
            ValueStyle::Bare => f.write_str(&self.text)?,
        }
        if let Some(units) = &self.units {
            write!(f, " <{units}>")?;
        }
        Ok(())
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if text.contains('"') {
        write!(f, "'{text}'")
    } else {
        write!(f, "\"{text}\"")
    }
}

/// True when a bare token could not be read back as the same single value.
pub(crate) fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.contains("/*")
        || text.chars().any(|c| {
            c.is_whitespace()
                || matches!(c, ',' | '(' | ')' | '{' | '}' | '<' | '>' | '=' | '"' | '\'' | '#')
        })
}

/// A named, ordered, possibly repeated PVL keyword.
#[derive(Debug, Clone, Default)]
pub struct Keyword {
    pub name: String,
    pub values: ValueList<PvlValue>,
    pub form: ValueForm,
    pub comments: Vec<String>,
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.form == other.form
            && self.values == other.values
    }
}

impl Keyword {
    /// A keyword with no value (a flag such as `Auto` in a translation table).
    pub fn flag(name: impl Into<String>) -> Self {
        Keyword {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn new(name: impl Into<String>, value: impl Into<PvlValue>) -> Self {
        Keyword {
            name: name.into(),
            values: smallvec![value.into()],
            form: ValueForm::Scalar,
            comments: Vec::new(),
        }
    }

    pub fn with_units(
        name: impl Into<String>,
        value: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Keyword::new(name, PvlValue::with_units(value, units))
    }

    /// Build a sequence keyword `NAME = (v1, v2, ...)`.
    pub fn sequence<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PvlValue>,
    {
        Keyword {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            form: ValueForm::Sequence,
            comments: Vec::new(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append a value, turning a scalar keyword into a sequence.
    pub fn push(&mut self, value: impl Into<PvlValue>) {
        self.values.push(value.into());
        if self.values.len() > 1 {
            self.form = ValueForm::Sequence;
        }
    }

    /// Replace every value by `value`, keeping the keyword name.
    pub fn set_value(&mut self, value: impl Into<PvlValue>) {
        self.values = smallvec![value.into()];
        self.form = ValueForm::Scalar;
    }

    /// Set the units of every value.
    pub fn set_units(&mut self, units: &str) {
        for value in self.values.iter_mut() {
            value.units = Some(units.to_string());
        }
    }

    pub fn value(&self, index: usize) -> Option<&PvlValue> {
        self.values.get(index)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.text.as_str())
    }

    pub fn units(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.units.as_deref())
    }

    /// Text of the value at `index`.
    ///
    /// Return
    /// ----------
    /// * The raw value text, or [`IngestError::InvalidValue`] if the keyword has fewer values.
    pub fn get_str(&self, index: usize) -> Result<&str, IngestError> {
        self.values
            .get(index)
            .map(|v| v.text.as_str())
            .ok_or_else(|| self.invalid("", &format!("no value at index {index}")))
    }

    pub fn as_str(&self) -> Result<&str, IngestError> {
        self.get_str(0)
    }

    pub fn get_i64(&self, index: usize) -> Result<i64, IngestError> {
        let text = self.get_str(index)?;
        parse_pds_integer(text).ok_or_else(|| self.invalid(text, "not an integer"))
    }

    pub fn as_i64(&self) -> Result<i64, IngestError> {
        self.get_i64(0)
    }

    pub fn get_f64(&self, index: usize) -> Result<f64, IngestError> {
        let text = self.get_str(index)?;
        parse_pds_real(text).ok_or_else(|| self.invalid(text, "not a real number"))
    }

    pub fn as_f64(&self) -> Result<f64, IngestError> {
        self.get_f64(0)
    }

    /// Non-negative integer at `index`, used for sizes and counts.
    pub fn get_usize(&self, index: usize) -> Result<usize, IngestError> {
        let value = self.get_i64(index)?;
        usize::try_from(value).map_err(|_| self.invalid(&value.to_string(), "negative count"))
    }

    pub fn as_usize(&self) -> Result<usize, IngestError> {
        self.get_usize(0)
    }

    /// All values as reals.
    pub fn f64_values(&self) -> Result<Vec<f64>, IngestError> {
        (0..self.len()).map(|i| self.get_f64(i)).collect()
    }

    /// True when the keyword has no value or its single value is a PDS null marker.
    pub fn is_null(&self) -> bool {
        match self.values.as_slice() {
            [] => true,
            [single] => {
                let t = single.text.trim();
                t.is_empty()
                    || t.eq_ignore_ascii_case("NULL")
                    || t.eq_ignore_ascii_case("N/A")
                    || t.eq_ignore_ascii_case("UNK")
            }
            _ => false,
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> IngestError {
        IngestError::InvalidValue {
            keyword: self.name.clone(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parse a PDS integer, including based integers such as `16#FF#` and `2#1010#`.
pub fn parse_pds_integer(text: &str) -> Option<i64> {
    let t = text.trim();
    if let Some((radix, rest)) = t.split_once('#') {
        let (sign, radix) = match radix.strip_prefix('-') {
            Some(r) => (-1, r),
            None => (1, radix.trim_start_matches('+')),
        };
        let radix: u32 = radix.parse().ok()?;
        let digits = rest.strip_suffix('#')?;
        return i64::from_str_radix(digits, radix).ok().map(|v| sign * v);
    }
    t.trim_start_matches('+').parse().ok()
}

/// Parse a PDS real; integers and based integers are accepted too.
pub fn parse_pds_real(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.contains('#') {
        return parse_pds_integer(t).map(|v| v as f64);
    }
    t.trim_start_matches('+').parse().ok()
}
