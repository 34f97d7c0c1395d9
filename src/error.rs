//! Error types for the temperature-analysis crate.
//!
//! Only structural problems are errors. Too little overlap, empty cells and sparse coverage are
//! handled by the documented fallbacks and never show up here.
use thiserror::Error;

/// Error type for the crate.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A minimum overlap of zero was requested, every combine needs at least one shared month.
    #[error("Minimum overlap must be at least 1.")]
    ZeroOverlap,

    /// A month outside of 1 to 12.
    #[error("Invalid month {month} in year {year}.")]
    InvalidMonth {
        /// The year of the bad key.
        year: i32,
        /// The month number that was rejected.
        month: u32,
    },

    /// Records for a station showed up again after its group was already closed.
    #[error("Records for station {0} are not contiguous in the input.")]
    UngroupedStation(String),

    /// Only all-land or all-ocean selections are supported for a cell.
    #[error("Land weight {weight} for cell {cell} is not 0 or 1.")]
    PartialLandMask {
        /// Label of the offending cell.
        cell: String,
        /// The weight that was supplied.
        weight: f64,
    },

    /// The cell stream ended before a box received all of its cells.
    #[error("Box {index} expected {expected} cells but only {found} were supplied.")]
    TruncatedBox {
        /// Index of the box in the grid.
        index: usize,
        /// Number of cells every box must have.
        expected: usize,
        /// Number of cells actually found.
        found: usize,
    },

    /// The box stream ended before a band received all of its boxes.
    #[error("Band {index} expected {expected} boxes but only {found} were supplied.")]
    TruncatedBand {
        /// Index of the band, 0 is the northern polar band.
        index: usize,
        /// Number of boxes in the band.
        expected: usize,
        /// Number of boxes actually found.
        found: usize,
    },

    /// Fewer bands or zones than the fixed zone table needs.
    #[error("Expected {expected} {what} but only {found} were supplied.")]
    MissingInputs {
        /// What was being counted, e.g. "bands" or "zones".
        what: &'static str,
        /// The number the zone table needs.
        expected: usize,
        /// Number actually found.
        found: usize,
    },

    /// More input than the fixed partition has room for.
    #[error("Too many {what} supplied, expected {expected}.")]
    TooManyInputs {
        /// What was being counted, e.g. "cells" or "boxes".
        what: &'static str,
        /// The number the partition has room for.
        expected: usize,
    },

    /// A parameters file could not be parsed.
    #[error("Error parsing parameters: {0}")]
    Config(#[from] toml::de::Error),
}

/// Shorthand for results.
pub type Result<T> = ::std::result::Result<T, AnalysisError>;
