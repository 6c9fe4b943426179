use thiserror::Error;

use crate::constants::BinIndex;

#[derive(Error, Debug)]
pub enum BinningError {
    #[error("Invalid number of grid rows: {0} (must be greater than 0)")]
    InvalidGridRows(usize),

    #[error("Unknown planetary grid type: {0}")]
    UnknownGridType(String),

    #[error("Invalid binning configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown variable referenced by an aggregator: {0}")]
    UnknownVariable(String),

    #[error("Unknown output feature referenced by a cell processor: {0}")]
    UnknownFeature(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("End date '{end}' before start date '{start}'")]
    InvalidDateRange { start: String, end: String },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Spatial bins out of order: index {current} received after {previous}")]
    BinOrderViolation { previous: BinIndex, current: BinIndex },

    #[error("Spatial bin {found} handed over with bin group {expected}")]
    MismatchedBinGroup { expected: BinIndex, found: BinIndex },

    #[error("Feature vector of bin {index} has length {found}, expected {expected}")]
    FeatureLengthMismatch {
        index: BinIndex,
        expected: usize,
        found: usize,
    },

    #[error("Corrupt bin record: {0}")]
    CorruptRecord(String),

    #[error("Temporal bin position {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Binning cancelled")]
    Cancelled,
}

impl PartialEq for BinningError {
    fn eq(&self, other: &Self) -> bool {
        use BinningError::*;
        match (self, other) {
            (InvalidGridRows(a), InvalidGridRows(b)) => a == b,
            (UnknownGridType(a), UnknownGridType(b)) => a == b,
            (InvalidConfiguration(a), InvalidConfiguration(b)) => a == b,
            (UnknownVariable(a), UnknownVariable(b)) => a == b,
            (UnknownFeature(a), UnknownFeature(b)) => a == b,
            (InvalidDate(a), InvalidDate(b)) => a == b,
            (
                InvalidDateRange { start: s1, end: e1 },
                InvalidDateRange { start: s2, end: e2 },
            ) => s1 == s2 && e1 == e2,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (JsonError(_), JsonError(_)) => true,

            (
                BinOrderViolation {
                    previous: p1,
                    current: c1,
                },
                BinOrderViolation {
                    previous: p2,
                    current: c2,
                },
            ) => p1 == p2 && c1 == c2,
            (
                MismatchedBinGroup {
                    expected: e1,
                    found: f1,
                },
                MismatchedBinGroup {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,
            (
                FeatureLengthMismatch {
                    index: i1,
                    expected: e1,
                    found: f1,
                },
                FeatureLengthMismatch {
                    index: i2,
                    expected: e2,
                    found: f2,
                },
            ) => i1 == i2 && e1 == e2 && f1 == f2,
            (CorruptRecord(a), CorruptRecord(b)) => a == b,
            (IndexOutOfBounds { index: i1, len: l1 }, IndexOutOfBounds { index: i2, len: l2 }) => {
                i1 == i2 && l1 == l2
            }

            (Cancelled, Cancelled) => true,

            _ => false,
        }
    }
}
