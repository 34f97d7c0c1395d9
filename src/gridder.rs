//! Combining station records onto the cells of a grid.
//!
//! Every station within the gridding radius of a cell's centre contributes to it, weighted by
//! its distance from the centre. Stations are considered longest record first so the longest
//! record seeds the cell.
use crate::{
    anomaly::{anomalize, ReferencePeriod},
    combine::combine,
    config::Parameters,
    error::Result,
    grid::{arc_degrees, incircle, Extent, Partition, Region},
    record::StationRecord,
    series::{Series, Weights},
};
use log::{debug, info};
use optional::{none, some, Optioned};

/// The combined anomaly series of a single cell.
#[derive(Debug, Clone)]
pub struct CellRecord {
    /// Where the cell is.
    pub extent: Extent,
    /// Monthly anomalies.
    pub series: Series,
    /// Summed station weights behind each month.
    pub weights: Weights,
    /// Number of stations that contributed.
    pub stations: usize,
    /// Number of station months considered, including those of the seed station.
    pub station_months: usize,
    /// Distance (km) from the centre to the nearest contributing station, missing for an empty
    /// cell.
    pub distance: Optioned<f64>,
}

impl CellRecord {
    /// A cell with no data.
    pub fn empty(extent: Extent) -> Self {
        CellRecord {
            extent,
            series: Series::new(),
            weights: Weights::new(),
            stations: 0,
            station_months: 0,
            distance: none(),
        }
    }

    /// Number of valid months.
    #[inline]
    pub fn good_count(&self) -> usize {
        self.series.valid_count()
    }
}

/// Grids station records.
#[derive(Debug, Clone, Copy)]
pub struct Gridder {
    radius: f64,
    arc: f64,
    min_overlap: usize,
    reference: ReferencePeriod,
}

impl Gridder {
    /// Create a gridder from the gridding parameters.
    pub fn new(params: &Parameters) -> Self {
        Gridder {
            radius: params.gridding_radius,
            arc: params.gridding_arc(),
            min_overlap: params.gridding_min_overlap,
            reference: params.gridding_reference_period,
        }
    }

    /// Grid `stations` onto every cell of `partition`, producing cells in partition order.
    ///
    /// Regions are gridded one at a time as the iterator is advanced.
    pub fn grid<'g, P>(
        &'g self,
        stations: &'g [StationRecord],
        partition: &P,
    ) -> impl Iterator<Item = Result<CellRecord>> + 'g
    where
        P: Partition + ?Sized,
    {
        partition
            .regions()
            .into_iter()
            .flat_map(move |region| match self.grid_region(stations, &region) {
                Ok(cells) => cells.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            })
    }

    /// Grid regions in parallel. The cells come back in the same order as from
    /// [`grid`](Gridder::grid).
    #[cfg(feature = "parallel")]
    pub fn grid_par<P>(
        &self,
        stations: &[StationRecord],
        partition: &P,
    ) -> Result<Vec<CellRecord>>
    where
        P: Partition + ?Sized,
    {
        use rayon::prelude::*;

        let regions = partition.regions();
        let cells: Vec<Vec<CellRecord>> = regions
            .par_iter()
            .map(|region| self.grid_region(stations, region))
            .collect::<Result<_>>()?;

        Ok(cells.into_iter().flatten().collect())
    }

    /// Grid the cells of one region.
    pub fn grid_region(
        &self,
        stations: &[StationRecord],
        region: &Region,
    ) -> Result<Vec<CellRecord>> {
        let area = region.extent.search_area(arc_degrees(self.arc));

        let mut candidates: Vec<&StationRecord> = stations
            .iter()
            .filter(|rec| {
                let (lat, lon) = rec.station().location();
                area.contains(lat, lon)
            })
            .collect();
        // Longest first, ties to the smallest uid.
        candidates.sort_by(|a, b| {
            b.good_count()
                .cmp(&a.good_count())
                .then_with(|| a.uid().cmp(b.uid()))
        });

        let mut cells = Vec::with_capacity(region.cells.len());
        let mut empty = 0;
        for extent in &region.cells {
            let cell = self.grid_cell(&candidates, *extent)?;
            if cell.stations == 0 {
                empty += 1;
            }
            cells.push(cell);
        }

        let ext = &region.extent;
        info!(
            "Region ({:+03.0}/{:+03.0} S/N {:+04.0}/{:+04.0} W/E): {} empty cell{}.",
            ext.south,
            ext.north,
            ext.west,
            ext.east,
            empty,
            if empty == 1 { "" } else { "s" }
        );

        Ok(cells)
    }

    fn grid_cell(&self, candidates: &[&StationRecord], extent: Extent) -> Result<CellRecord> {
        let centre = extent.centre();
        let contributors: Vec<(&StationRecord, f64)> = candidates
            .iter()
            .filter_map(|rec| {
                incircle(self.arc, centre, rec.station().location()).map(|wt| (*rec, wt))
            })
            .collect();

        let (&(seed, seed_wt), rest) = match contributors.split_first() {
            Some(split) => split,
            None => return Ok(CellRecord::empty(extent)),
        };

        let mut series = seed.series().clone();
        let mut weights = Weights::uniform(&series, seed_wt);
        let mut stations = 1;
        let mut station_months = seed.good_count();
        let mut max_weight = seed_wt;
        let mut contributed = vec![(seed.uid(), seed_wt)];

        for &(rec, wt) in rest {
            let months =
                combine(&mut series, &mut weights, rec.series(), wt, self.min_overlap)?.total();
            station_months += months;
            if months == 0 {
                contributed.push((rec.uid(), 0.0));
                continue;
            }
            stations += 1;
            contributed.push((rec.uid(), wt));
            max_weight = max_weight.max(wt);
        }

        debug!("{} stations {:?}", extent, contributed);

        Ok(CellRecord {
            extent,
            series: anomalize(&series, Some(self.reference)),
            weights,
            stations,
            station_months,
            distance: some(self.radius * (1.0 - max_weight)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        grid::EqualAreaGrid,
        test_data::station_record_at,
        utility::test_tools::*,
    };

    struct OneBox(Extent);

    impl Partition for OneBox {
        fn regions(&self) -> Vec<Region> {
            vec![Region {
                extent: self.0,
                cells: vec![self.0],
            }]
        }
    }

    fn params(min_overlap: usize) -> Parameters {
        Parameters {
            gridding_min_overlap: min_overlap,
            ..Parameters::default()
        }
    }

    #[test]
    fn test_empty_cell() {
        let gridder = Gridder::new(&Parameters::default());
        let part = OneBox(Extent::new(0.0, 10.0, 0.0, 10.0));
        let far = station_record_at("10000000000", (60.0, 100.0), 1950, 1990, 0.0);

        let cells: Vec<CellRecord> = gridder
            .grid(&[far], &part)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].stations, 0);
        assert_eq!(cells[0].station_months, 0);
        assert!(cells[0].series.is_empty());
        assert!(cells[0].distance.is_none());
    }

    #[test]
    fn test_longest_station_seeds_cell() {
        let gridder = Gridder::new(&params(20));
        let extent = Extent::new(0.0, 10.0, 0.0, 10.0);
        let (lat, lon) = extent.centre();

        let short = station_record_at("20000000000", (lat, lon), 1960, 1970, 0.0);
        let long = station_record_at("30000000000", (lat + 1.0, lon), 1950, 1990, 0.0);

        let cells = gridder
            .grid_region(
                &[short.clone(), long.clone()],
                &Region {
                    extent,
                    cells: vec![extent],
                },
            )
            .unwrap();
        let cell = &cells[0];

        // The short record only overlaps 11 years, fewer than the 20 needed, so it does not
        // contribute but its months are still counted.
        assert_eq!(cell.stations, 1);
        assert_eq!(cell.station_months, long.good_count());
        let wt = incircle(gridder.arc, (lat, lon), (lat + 1.0, lon)).unwrap();
        let expected = gridder.radius * (1.0 - wt);
        assert!(approx_equal(cell.distance.unpack(), expected, 1.0e-9));
    }

    #[test]
    fn test_cells_in_partition_order() {
        let gridder = Gridder::new(&Parameters::default());
        let grid = EqualAreaGrid::new();
        let regions = grid.regions();
        let first = regions[0].cells[0].centre();
        let last = regions[79].cells[99].centre();

        let stations = vec![
            station_record_at("40000000000", first, 1950, 1990, 0.0),
            station_record_at("50000000000", last, 1950, 1990, 0.0),
        ];

        let cells: Vec<CellRecord> = gridder
            .grid(&stations, &grid)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(cells.len(), 8000);
        assert_eq!(cells[0].stations, 1);
        assert!(approx_equal(cells[0].distance.unpack(), 0.0, 1.0e-6));
        assert_eq!(cells[7999].stations, 1);
        assert_eq!(cells[4000].stations, 0);
    }
}
