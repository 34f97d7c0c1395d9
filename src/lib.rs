#![warn(missing_docs)]
//! Functions and data types for building surface temperature anomaly records from monthly
//! station series.
//!
//! The analysis runs as a pipeline of stages:
//!
//!  1. Duplicate records of a station are merged ([`StationMerger`]), with hand corrections
//!     ([`CorrectionTable`]) applied between the passes.
//!  2. Station records are gridded onto the cells of an equal-area grid ([`Gridder`]).
//!  3. Cells are combined into boxes, boxes into latitude bands and bands into zones, and annual
//!     means are taken ([`ZonalAggregator`]).
//!
//! Every stage builds its records with the same weighted, bias corrected [`combine`] and turns
//! them into anomalies with [`anomalize`]. [`Analysis`] runs the whole thing.
//!
//! Logging goes through the `log` crate, install a logger in the application to see it.

//
// API
//
pub use crate::analysis::Analysis;
pub use crate::anomaly::{annual_and_seasonal, anomalize, AnnualAnomalies, ReferencePeriod};
pub use crate::combine::{combine, merge_with_bias, IncomingWeight, MonthCounts};
pub use crate::config::Parameters;
pub use crate::corrections::{Correction, CorrectionTable};
pub use crate::error::{AnalysisError, Result};
pub use crate::gridder::{CellRecord, Gridder};
pub use crate::keys::{AlternateGlobal, LandMask, SourceRank};
pub use crate::merger::StationMerger;
pub use crate::record::{RecordSummary, SourceTable, Station, StationRecord};
pub use crate::series::{MonthKey, Series, Weights};
pub use crate::zonal::{BoxRecord, CellPair, ZonalAggregator, ZonalSummary, Zone, ZoneRecord};

pub mod anomaly;
pub mod grid;
pub mod merger;
pub mod utility;
pub mod zonal;

//
// Internal use only
//
mod analysis;
mod combine;
mod config;
mod corrections;
mod error;
mod gridder;
mod keys;
mod record;
mod series;

#[cfg(test)]
mod test_data;
