//! Data type and methods for running the whole analysis and keeping what each stage produced.
use crate::{
    config::Parameters,
    corrections::CorrectionTable,
    error::{AnalysisError, Result},
    grid::EqualAreaGrid,
    gridder::{CellRecord, Gridder},
    merger::StationMerger,
    record::{SourceTable, StationRecord},
    zonal::{BoxRecord, CellPair, ZonalAggregator, ZonalSummary},
};
use log::info;

/// Convenient package for running the analysis from station records to zonal means.
///
/// Set up the collaborators with the builder methods, then call [`run`](Analysis::run). The
/// output of every stage is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    params: Parameters,
    sources: SourceTable,
    corrections: CorrectionTable,

    // Optional inputs for step 5, matched to the land cells by position.
    ocean: Option<Vec<CellRecord>>,
    land_weights: Option<Vec<f64>>,

    // Results
    stations: Vec<StationRecord>,
    cells: Vec<CellRecord>,
    boxes: Vec<BoxRecord>,
    summary: Option<ZonalSummary>,
}

impl Analysis {
    /// Create a new `Analysis`.
    pub fn new(params: Parameters) -> Self {
        Analysis {
            params,
            ..Analysis::default()
        }
    }

    /// Set the table of record sources used when merging duplicates.
    pub fn with_sources(self, sources: SourceTable) -> Self {
        Analysis { sources, ..self }
    }

    /// Set the hand corrections applied while merging.
    pub fn with_corrections(self, corrections: CorrectionTable) -> Self {
        Analysis {
            corrections,
            ..self
        }
    }

    /// Set the ocean cells, one per land cell in grid order. Cells past the end of the ocean
    /// data have no ocean record.
    pub fn with_ocean<T>(self, ocean: T) -> Self
    where
        Option<Vec<CellRecord>>: From<T>,
    {
        let ocean = Option::from(ocean);
        Analysis { ocean, ..self }
    }

    /// Set the land weight for each cell, 1 for land and 0 for ocean. Without them the choice is
    /// made from the data.
    pub fn with_land_weights<T>(self, land_weights: T) -> Self
    where
        Option<Vec<f64>>: From<T>,
    {
        let land_weights = Option::from(land_weights);
        Analysis {
            land_weights,
            ..self
        }
    }

    /// Run every stage on `records`, which must have the records of each station together.
    pub fn run<I>(self, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = StationRecord>,
    {
        let merger = StationMerger::new(&self.params, self.sources.clone());

        let merged = merger.combine_records(records.into_iter().map(Ok));
        let merged = self.corrections.adjust_pieces(merged);
        let merged = merger.combine_pieces(merged);
        let stations: Vec<StationRecord> = self.corrections.finish(merged).collect::<Result<_>>()?;
        info!("{} station records after merging", stations.len());

        let grid = EqualAreaGrid::new();
        let gridder = Gridder::new(&self.params);
        #[cfg(feature = "parallel")]
        let cells = gridder.grid_par(&stations, &grid)?;
        #[cfg(not(feature = "parallel"))]
        let cells: Vec<CellRecord> = gridder.grid(&stations, &grid).collect::<Result<_>>()?;
        info!(
            "{} of {} cells have data",
            cells.iter().filter(|c| c.stations > 0).count(),
            cells.len()
        );

        let pairs = self.pair_cells(&cells)?;
        let aggregator = ZonalAggregator::new(&self.params);
        let boxes = aggregator.boxes(pairs, &grid)?;
        let bands = aggregator.bands(&boxes)?;
        let zones = aggregator.zones(bands)?;
        let summary = aggregator.summarize(zones)?;

        Ok(Analysis {
            stations,
            cells,
            boxes,
            summary: Some(summary),
            ..self
        })
    }

    /// Pair each land cell with its ocean cell and land weight.
    ///
    /// The pairs are built lazily, so only the cells of the box being combined are copied at
    /// any one time.
    fn pair_cells<'a>(
        &'a self,
        cells: &'a [CellRecord],
    ) -> Result<impl Iterator<Item = CellPair> + 'a> {
        if let Some(ref ocean) = self.ocean {
            if ocean.len() > cells.len() {
                return Err(AnalysisError::TooManyInputs {
                    what: "ocean cells",
                    expected: cells.len(),
                });
            }
        }
        if let Some(ref weights) = self.land_weights {
            if weights.len() > cells.len() {
                return Err(AnalysisError::TooManyInputs {
                    what: "land weights",
                    expected: cells.len(),
                });
            }
        }

        let pairs = cells.iter().enumerate().map(move |(i, land)| {
            let ocean = self
                .ocean
                .as_ref()
                .and_then(|ocean| ocean.get(i).cloned())
                .unwrap_or_else(|| CellRecord::empty(land.extent));
            let land_weight = self
                .land_weights
                .as_ref()
                .and_then(|weights| weights.get(i).copied());

            CellPair {
                land: land.clone(),
                ocean,
                land_weight,
            }
        });

        Ok(pairs)
    }

    /// The parameters in use.
    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Station records after merging and corrections.
    #[inline]
    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    /// The land cells in grid order.
    #[inline]
    pub fn cells(&self) -> &[CellRecord] {
        &self.cells
    }

    /// The boxes in grid order.
    #[inline]
    pub fn boxes(&self) -> &[BoxRecord] {
        &self.boxes
    }

    /// The zonal means, `None` until the analysis has been run.
    #[inline]
    pub fn summary(&self) -> Option<&ZonalSummary> {
        self.summary.as_ref()
    }
}
