//! Enums used as keys for setting options in functions.
use crate::{
    error::{AnalysisError, Result},
    grid::Extent,
};
use serde::Deserialize;
use strum_macros::{EnumIter, EnumString};

/// Data source of a station record, used to pick the seed when merging duplicates.
///
/// Ranks order from worst to best, so `SourceRank::Mcdw` is the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumString)]
pub enum SourceRank {
    /// No source information.
    #[strum(serialize = "UNKNOWN")]
    Unknown,
    /// Summary of the day.
    #[strum(serialize = "SUMOFDAY")]
    SumOfDay,
    /// US Historical Climate Network.
    #[strum(serialize = "USHCN2")]
    Ushcn2,
    /// Monthly Climatic Data for the World.
    #[strum(serialize = "MCDW")]
    Mcdw,
}

impl Default for SourceRank {
    fn default() -> Self {
        SourceRank::Unknown
    }
}

/// Which of the two series for a cell is used when building boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandMask {
    /// Use the series gridded from land stations.
    Land,
    /// Use the ocean series.
    Ocean,
}

impl LandMask {
    /// Convert a land weight into a mask. Only 1 (land) and 0 (ocean) are supported, blending
    /// the two is not.
    pub fn from_weight(weight: f64, cell: &Extent) -> Result<Self> {
        if weight == 1.0 {
            Ok(LandMask::Land)
        } else if weight == 0.0 {
            Ok(LandMask::Ocean)
        } else {
            Err(AnalysisError::PartialLandMask {
                cell: cell.to_string(),
                weight,
            })
        }
    }
}

/// How the global mean is produced in the annual summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlternateGlobal {
    /// Keep the global zone from the hierarchical combination.
    Hierarchical,
    /// Blend zones 24N-90N, 24S-24N (twice) and 90S-24S.
    Tropics,
    /// Blend zones 24N-90N, Equ-24N, 24S-Equ and 90S-24S.
    Bands,
}

impl Default for AlternateGlobal {
    fn default() -> Self {
        AlternateGlobal::Bands
    }
}
