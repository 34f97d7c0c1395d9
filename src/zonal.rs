//! Combining cells into boxes, boxes into latitude bands and bands into zones.
//!
//! Every level uses the same recipe: sort the children longest first, seed with the longest and
//! fold in the others with [`combine`], then convert to anomalies. The top level also offers
//! alternate estimates of the global and hemispheric means built from fixed blends of zones.
use crate::{
    anomaly::{anomalize, annual_means},
    combine::combine,
    config::Parameters,
    error::{AnalysisError, Result},
    grid::{Extent, Partition, BAND_BOXES, BOX_COUNT},
    gridder::CellRecord,
    keys::{AlternateGlobal, LandMask},
    series::{Series, Weights},
    utility::longest_first,
};
use log::{debug, info};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// The land and ocean records for one cell.
#[derive(Debug, Clone)]
pub struct CellPair {
    /// Gridded from land stations.
    pub land: CellRecord,
    /// From an ocean dataset, an empty record if there is none.
    pub ocean: CellRecord,
    /// Externally supplied land weight, 1 for land and 0 for ocean. If absent the choice is made
    /// by [`choose_mask`].
    pub land_weight: Option<f64>,
}

impl CellPair {
    /// A cell with only land data.
    pub fn land_only(land: CellRecord) -> Self {
        CellPair {
            ocean: CellRecord::empty(land.extent),
            land,
            land_weight: None,
        }
    }

    /// Which of the two records to use.
    pub fn mask(&self, params: &Parameters) -> Result<LandMask> {
        match self.land_weight {
            Some(weight) => LandMask::from_weight(weight, &self.land.extent),
            None => Ok(choose_mask(params, &self.land, &self.ocean)),
        }
    }

    fn selected(&self, mask: LandMask) -> &CellRecord {
        match mask {
            LandMask::Land => &self.land,
            LandMask::Ocean => &self.ocean,
        }
    }
}

/// Pick land or ocean for a cell. Land is used if the ocean record is short, or if there is a
/// land station close to the centre of the cell.
pub fn choose_mask(params: &Parameters, land: &CellRecord, ocean: &CellRecord) -> LandMask {
    let near_land = land
        .distance
        .into_option()
        .map(|d| d < params.subbox_land_range)
        .unwrap_or(false);

    if ocean.good_count() < params.subbox_min_valid || near_land {
        LandMask::Land
    } else {
        LandMask::Ocean
    }
}

/// The combined series of a box.
#[derive(Debug, Clone)]
pub struct BoxRecord {
    /// Where the box is.
    pub extent: Extent,
    /// Monthly anomalies.
    pub series: Series,
    /// Number of cells behind each month.
    pub weights: Weights,
    /// Sum of the station counts of the cells in the box.
    pub stations: usize,
    /// Number of valid months.
    pub good_count: usize,
}

/// The 8 latitude bands of the grid followed by the 6 compound zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[allow(missing_docs)]
pub enum Zone {
    Arctic,
    NorthernMidLatitudes,
    NorthernSubtropics,
    NorthernTropics,
    SouthernTropics,
    SouthernSubtropics,
    SouthernMidLatitudes,
    Antarctic,
    NorthernExtratropics,
    Tropics,
    SouthernExtratropics,
    NorthernHemisphere,
    SouthernHemisphere,
    Global,
}

/// Number of zones, bands included.
pub const ZONE_COUNT: usize = 14;

impl Zone {
    /// Position in the output, 0 to 13. The bands come first, north to south.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The zone at position `index`.
    pub fn from_index(index: usize) -> Option<Zone> {
        Zone::iter().nth(index)
    }

    /// Latitude range as text.
    pub fn title(self) -> &'static str {
        use Zone::*;

        match self {
            Arctic => "64N-90N",
            NorthernMidLatitudes => "44N-64N",
            NorthernSubtropics => "24N-44N",
            NorthernTropics => "EQU-24N",
            SouthernTropics => "24S-EQU",
            SouthernSubtropics => "44S-24S",
            SouthernMidLatitudes => "64S-44S",
            Antarctic => "90S-64S",
            NorthernExtratropics => "24N-90N",
            Tropics => "24S-24N",
            SouthernExtratropics => "90S-24S",
            NorthernHemisphere => "NORTHERN HEMISPHERE",
            SouthernHemisphere => "SOUTHERN HEMISPHERE",
            Global => "GLOBAL",
        }
    }

    /// Indexes of the bands making up the zone.
    pub fn bands(self) -> &'static [usize] {
        use Zone::*;

        match self {
            Arctic => &[0],
            NorthernMidLatitudes => &[1],
            NorthernSubtropics => &[2],
            NorthernTropics => &[3],
            SouthernTropics => &[4],
            SouthernSubtropics => &[5],
            SouthernMidLatitudes => &[6],
            Antarctic => &[7],
            NorthernExtratropics => &[0, 1, 2],
            Tropics => &[3, 4],
            SouthernExtratropics => &[5, 6, 7],
            NorthernHemisphere => &[0, 1, 2, 3],
            SouthernHemisphere => &[4, 5, 6, 7],
            Global => &[0, 1, 2, 3, 4, 5, 6, 7],
        }
    }

    /// True for the 8 basic bands.
    #[inline]
    pub fn is_band(self) -> bool {
        self.index() < BAND_BOXES.len()
    }
}

/// The combined series of a band or zone.
#[derive(Debug, Clone)]
pub struct ZoneRecord {
    /// Which zone.
    pub zone: Zone,
    /// Monthly anomalies.
    pub series: Series,
    /// Summed weights behind each month.
    pub weights: Weights,
}

impl ZoneRecord {
    fn empty(zone: Zone) -> Self {
        ZoneRecord {
            zone,
            series: Series::new(),
            weights: Weights::new(),
        }
    }

    /// Number of valid months.
    #[inline]
    pub fn good_count(&self) -> usize {
        self.series.valid_count()
    }
}

/// Monthly series and annual means of all 14 zones.
#[derive(Debug, Clone)]
pub struct ZonalSummary {
    zones: Vec<ZoneRecord>,
    annual: Vec<BTreeMap<i32, f64>>,
}

impl ZonalSummary {
    /// The monthly record of a zone.
    #[inline]
    pub fn zone(&self, zone: Zone) -> &ZoneRecord {
        &self.zones[zone.index()]
    }

    /// Annual means of a zone.
    #[inline]
    pub fn annual(&self, zone: Zone) -> &BTreeMap<i32, f64> {
        &self.annual[zone.index()]
    }

    /// All zone records in zone order.
    #[inline]
    pub fn zones(&self) -> &[ZoneRecord] {
        &self.zones
    }
}

/// Zones and weights for the alternate global mean. The weights are 10 times the area of
/// each zone, hence the rescale by 0.1.
const ALT_GLOBAL_WEIGHTS: [f64; 4] = [3.0, 2.0, 2.0, 3.0];
const ALT_GLOBAL_TROPICS: [Zone; 4] = [
    Zone::NorthernExtratropics,
    Zone::Tropics,
    Zone::Tropics,
    Zone::SouthernExtratropics,
];
const ALT_GLOBAL_BANDS: [Zone; 4] = [
    Zone::NorthernExtratropics,
    Zone::NorthernTropics,
    Zone::SouthernTropics,
    Zone::SouthernExtratropics,
];

/// Builds boxes, bands, zones and the annual summary.
#[derive(Debug, Clone)]
pub struct ZonalAggregator {
    params: Parameters,
}

impl ZonalAggregator {
    /// Create a new aggregator.
    pub fn new(params: &Parameters) -> Self {
        ZonalAggregator {
            params: params.clone(),
        }
    }

    /// Combine cells into boxes. `cells` must hold, in order, exactly the cells of every region
    /// of `partition`.
    pub fn boxes<I, P>(&self, cells: I, partition: &P) -> Result<Vec<BoxRecord>>
    where
        I: IntoIterator<Item = CellPair>,
        P: Partition + ?Sized,
    {
        let regions = partition.regions();
        let expected_total: usize = regions.iter().map(|r| r.cells.len()).sum();

        let mut cells = cells.into_iter();
        let mut boxes = Vec::with_capacity(regions.len());
        for (index, region) in regions.iter().enumerate() {
            let expected = region.cells.len();
            let chunk: Vec<CellPair> = cells.by_ref().take(expected).collect();
            if chunk.len() < expected {
                return Err(AnalysisError::TruncatedBox {
                    index,
                    expected,
                    found: chunk.len(),
                });
            }
            boxes.push(self.combine_box(region.extent, &chunk)?);
        }

        if cells.next().is_some() {
            return Err(AnalysisError::TooManyInputs {
                what: "cells",
                expected: expected_total,
            });
        }

        Ok(boxes)
    }

    /// Combine the cells of a single box.
    pub fn combine_box(&self, extent: Extent, cells: &[CellPair]) -> Result<BoxRecord> {
        let selected = cells
            .iter()
            .map(|pair| pair.mask(&self.params).map(|mask| pair.selected(mask)))
            .collect::<Result<Vec<&CellRecord>>>()?;

        let stations = selected.iter().map(|cell| cell.stations).sum();
        let lengths: Vec<usize> = selected.iter().map(|cell| cell.good_count()).collect();
        let order = longest_first(&lengths);

        let (series, weights) = match order.split_first() {
            Some((&seed, rest)) => {
                let mut series = selected[seed].series.clone();
                let mut weights = Weights::uniform(&series, 1.0);
                for &i in rest {
                    if lengths[i] >= self.params.subbox_min_valid {
                        combine(
                            &mut series,
                            &mut weights,
                            &selected[i].series,
                            1.0,
                            self.params.box_min_overlap,
                        )?;
                    }
                }
                (anomalize(&series, Some(self.params.subbox_reference_period)), weights)
            }
            None => (Series::new(), Weights::new()),
        };

        let good_count = series.valid_count();
        debug!("box {} months {} stations {}", extent, good_count, stations);

        Ok(BoxRecord {
            extent,
            series,
            weights,
            stations,
            good_count,
        })
    }

    /// Combine the 80 boxes of the equal-area grid into the 8 latitude bands.
    pub fn bands(&self, boxes: &[BoxRecord]) -> Result<Vec<ZoneRecord>> {
        let mut bands = Vec::with_capacity(BAND_BOXES.len());
        let mut start = 0;
        for (index, (zone, &count)) in Zone::iter().zip(BAND_BOXES.iter()).enumerate() {
            let available = boxes.len().saturating_sub(start);
            if available < count {
                return Err(AnalysisError::TruncatedBand {
                    index,
                    expected: count,
                    found: available,
                });
            }

            bands.push(self.combine_band(zone, &boxes[start..start + count])?);
            start += count;
        }

        if boxes.len() > BOX_COUNT {
            return Err(AnalysisError::TooManyInputs {
                what: "boxes",
                expected: BOX_COUNT,
            });
        }

        Ok(bands)
    }

    fn combine_band(&self, zone: Zone, boxes: &[BoxRecord]) -> Result<ZoneRecord> {
        let lengths: Vec<usize> = boxes.iter().map(|b| b.good_count).collect();
        if lengths.iter().sum::<usize>() == 0 {
            info!("band {} has no data", zone.title());
            return Ok(ZoneRecord::empty(zone));
        }

        let order = longest_first(&lengths);
        let mut series = boxes[order[0]].series.clone();
        let mut weights = boxes[order[0]].weights.clone();
        for &i in &order[1..] {
            // Sorted, so everything after the first empty box is empty too.
            if lengths[i] == 0 {
                break;
            }
            combine(
                &mut series,
                &mut weights,
                &boxes[i].series,
                &boxes[i].weights,
                self.params.box_min_overlap,
            )?;
        }

        Ok(ZoneRecord {
            zone,
            series: anomalize(&series, Some(self.params.box_reference_period)),
            weights,
        })
    }

    /// Add the 6 compound zones to the 8 bands, giving all 14 zones in zone order.
    ///
    /// A compound zone is seeded with its longest band and the others are added longest first.
    /// A zone without any data comes out empty.
    pub fn zones(&self, bands: Vec<ZoneRecord>) -> Result<Vec<ZoneRecord>> {
        check_count("bands", bands.len(), BAND_BOXES.len())?;

        let lengths: Vec<usize> = bands.iter().map(|b| b.good_count()).collect();
        let order = longest_first(&lengths);

        let mut zones = bands;
        for index in BAND_BOXES.len()..ZONE_COUNT {
            let zone = match Zone::from_index(index) {
                Some(zone) => zone,
                None => break,
            };
            let members: Vec<usize> = order
                .iter()
                .copied()
                .filter(|b| zone.bands().contains(b))
                .collect();

            let record = match members.split_first() {
                Some((&seed, rest)) if lengths[seed] > 0 => {
                    let mut series = zones[seed].series.clone();
                    let mut weights = zones[seed].weights.clone();
                    for &b in rest {
                        let (band_series, band_weights) = (&zones[b].series, &zones[b].weights);
                        combine(
                            &mut series,
                            &mut weights,
                            band_series,
                            band_weights,
                            self.params.box_min_overlap,
                        )?;
                    }
                    ZoneRecord {
                        zone,
                        series: anomalize(&series, Some(self.params.box_reference_period)),
                        weights,
                    }
                }
                _ => {
                    info!("no data for zone {}", zone.title());
                    ZoneRecord::empty(zone)
                }
            };
            zones.push(record);
        }

        Ok(zones)
    }

    /// Annual means of every zone, and the alternate global and hemispheric means if they are
    /// enabled. The alternates replace the hierarchical series and annual means of the zones
    /// they stand for, the weights are kept.
    ///
    /// `zones` must hold all 14 zones in zone order.
    pub fn summarize(&self, zones: Vec<ZoneRecord>) -> Result<ZonalSummary> {
        check_count("zones", zones.len(), ZONE_COUNT)?;

        let mut zones = zones;
        let mut annual: Vec<BTreeMap<i32, f64>> = zones
            .iter()
            .map(|z| annual_means(&z.series, self.params.zone_annual_min_months))
            .collect();

        let blend = match self.params.alternate_global {
            AlternateGlobal::Hierarchical => None,
            AlternateGlobal::Tropics => Some(ALT_GLOBAL_TROPICS),
            AlternateGlobal::Bands => Some(ALT_GLOBAL_BANDS),
        };

        if let Some(members) = blend {
            let parts: Vec<(&BTreeMap<i32, f64>, f64)> = members
                .iter()
                .zip(ALT_GLOBAL_WEIGHTS.iter())
                .map(|(z, &w)| (&annual[z.index()], 0.1 * w))
                .collect();
            let annual_global = blend_annual(&parts);

            let parts: Vec<(&Series, f64)> = members
                .iter()
                .zip(ALT_GLOBAL_WEIGHTS.iter())
                .map(|(z, &w)| (&zones[z.index()].series, 0.1 * w))
                .collect();
            let monthly_global = blend_monthly(&parts);

            let global = Zone::Global.index();
            annual[global] = annual_global;
            zones[global].series = monthly_global;
        }

        if self.params.alternate_hemispheres {
            let hemispheres = [
                (Zone::NorthernHemisphere, Zone::NorthernTropics, Zone::NorthernExtratropics),
                (Zone::SouthernHemisphere, Zone::SouthernTropics, Zone::SouthernExtratropics),
            ];
            for &(hemisphere, tropics, extratropics) in &hemispheres {
                let (h, t, x) = (hemisphere.index(), tropics.index(), extratropics.index());
                let annual_hem = blend_annual(&[(&annual[t], 0.4), (&annual[x], 0.6)]);
                let monthly_hem =
                    blend_monthly(&[(&zones[t].series, 0.4), (&zones[x].series, 0.6)]);

                annual[h] = annual_hem;
                zones[h].series = monthly_hem;
            }
        }

        Ok(ZonalSummary { zones, annual })
    }
}

fn check_count(what: &'static str, found: usize, expected: usize) -> Result<()> {
    if found < expected {
        Err(AnalysisError::MissingInputs {
            what,
            expected,
            found,
        })
    } else if found > expected {
        Err(AnalysisError::TooManyInputs { what, expected })
    } else {
        Ok(())
    }
}

/// Weighted sum over the years present in every part.
fn blend_annual(parts: &[(&BTreeMap<i32, f64>, f64)]) -> BTreeMap<i32, f64> {
    let first = match parts.first() {
        Some(first) => first,
        None => return BTreeMap::new(),
    };

    first
        .0
        .keys()
        .filter_map(|year| {
            parts
                .iter()
                .map(|(ann, w)| ann.get(year).map(|v| v * w))
                .sum::<Option<f64>>()
                .map(|total| (*year, total))
        })
        .collect()
}

/// Weighted sum over the months valid in every part.
fn blend_monthly(parts: &[(&Series, f64)]) -> Series {
    let first = match parts.first() {
        Some(first) => first,
        None => return Series::new(),
    };

    first
        .0
        .valid()
        .filter_map(|(key, _)| {
            parts
                .iter()
                .map(|(series, w)| series.get(&key).into_option().map(|v| v * w))
                .sum::<Option<f64>>()
                .map(|total| (key, total))
        })
        .collect()
}
