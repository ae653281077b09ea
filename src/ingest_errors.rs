use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Bad label at line {line}, byte {byte}: expected {expected}, got {got}")]
    BadLabel {
        line: usize,
        byte: usize,
        expected: String,
        got: String,
    },

    #[error("Wrong product: expected {expected}, got {got}")]
    WrongProduct { expected: String, got: String },

    #[error("Unsupported product: {reason}")]
    UnsupportedProduct { reason: String },

    #[error("Pixel stream truncated at byte offset {offset}: expected {expected_bytes} more bytes")]
    TruncatedPixelStream { offset: u64, expected_bytes: u64 },

    #[error("Table stream truncated at byte offset {offset}: expected {expected_bytes} more bytes")]
    TruncatedTable { offset: u64, expected_bytes: u64 },

    #[error("Missing keyword: {name}")]
    MissingKeyword { name: String },

    #[error("No translation for value [{value}] of rule [{rule}]")]
    NoTranslation { rule: String, value: String },

    #[error("Bad table [{name}]: {reason}")]
    BadTable { name: String, reason: String },

    #[error("No serial number mapping for mission [{mission}]")]
    NoSerialMapping { mission: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid value [{value}] for keyword [{keyword}]: {reason}")]
    InvalidValue {
        keyword: String,
        value: String,
        reason: String,
    },

    #[error("Unable to find data file [{0}]")]
    DataFileNotFound(String),

    #[error("Ingest cancelled at band {band}, line {line}")]
    Cancelled { band: usize, line: usize },

    #[error("External collaborator failure: {0}")]
    Collaborator(String),

    #[error("Bad control network: {0}")]
    BadControlNet(String),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestError {
    /// Short, stable name of the error kind, used in one-line diagnostics.
    pub fn kind(&self) -> &'static str {
        use IngestError::*;
        match self {
            BadLabel { .. } => "BadLabel",
            WrongProduct { .. } => "WrongProduct",
            UnsupportedProduct { .. } => "UnsupportedProduct",
            TruncatedPixelStream { .. } => "TruncatedPixelStream",
            TruncatedTable { .. } => "TruncatedTable",
            MissingKeyword { .. } => "MissingKeyword",
            NoTranslation { .. } => "NoTranslation",
            BadTable { .. } => "BadTable",
            NoSerialMapping { .. } => "NoSerialMapping",
            InvalidGeometry(_) => "InvalidGeometry",
            InvalidValue { .. } => "InvalidValue",
            DataFileNotFound(_) => "DataFileNotFound",
            Cancelled { .. } => "Cancelled",
            Collaborator(_) => "Collaborator",
            BadControlNet(_) => "BadControlNet",
            Utf8PathError(_) => "Utf8PathError",
            IoError(_) => "IoError",
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        IngestError::UnsupportedProduct {
            reason: reason.into(),
        }
    }

    pub(crate) fn wrong_product(expected: impl Into<String>, got: impl Into<String>) -> Self {
        IngestError::WrongProduct {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub(crate) fn missing(name: impl Into<String>) -> Self {
        IngestError::MissingKeyword { name: name.into() }
    }
}

impl PartialEq for IngestError {
    fn eq(&self, other: &Self) -> bool {
        use IngestError::*;
        match (self, other) {
            (
                BadLabel {
                    line: l1,
                    byte: b1,
                    expected: e1,
                    got: g1,
                },
                BadLabel {
                    line: l2,
                    byte: b2,
                    expected: e2,
                    got: g2,
                },
            ) => l1 == l2 && b1 == b2 && e1 == e2 && g1 == g2,
            (
                WrongProduct {
                    expected: e1,
                    got: g1,
                },
                WrongProduct {
                    expected: e2,
                    got: g2,
                },
            ) => e1 == e2 && g1 == g2,
            (UnsupportedProduct { reason: a }, UnsupportedProduct { reason: b }) => a == b,
            (
                TruncatedPixelStream {
                    offset: o1,
                    expected_bytes: e1,
                },
                TruncatedPixelStream {
                    offset: o2,
                    expected_bytes: e2,
                },
            ) => o1 == o2 && e1 == e2,
            (
                TruncatedTable {
                    offset: o1,
                    expected_bytes: e1,
                },
                TruncatedTable {
                    offset: o2,
                    expected_bytes: e2,
                },
            ) => o1 == o2 && e1 == e2,
            (MissingKeyword { name: a }, MissingKeyword { name: b }) => a == b,
            (
                NoTranslation {
                    rule: r1,
                    value: v1,
                },
                NoTranslation {
                    rule: r2,
                    value: v2,
                },
            ) => r1 == r2 && v1 == v2,
            (BadTable { name: n1, reason: r1 }, BadTable { name: n2, reason: r2 }) => {
                n1 == n2 && r1 == r2
            }
            (NoSerialMapping { mission: a }, NoSerialMapping { mission: b }) => a == b,
            (InvalidGeometry(a), InvalidGeometry(b)) => a == b,
            (
                InvalidValue {
                    keyword: k1,
                    value: v1,
                    ..
                },
                InvalidValue {
                    keyword: k2,
                    value: v2,
                    ..
                },
            ) => k1 == k2 && v1 == v2,
            (DataFileNotFound(a), DataFileNotFound(b)) => a == b,
            (Cancelled { band: b1, line: l1 }, Cancelled { band: b2, line: l2 }) => {
                b1 == b2 && l1 == l2
            }
            (Collaborator(a), Collaborator(b)) => a == b,
            (BadControlNet(a), BadControlNet(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,

            // I/O errors are not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,

            _ => false,
        }
    }
}
