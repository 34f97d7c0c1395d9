//! Numeric parameters controlling each stage of the analysis.
//!
//! They appear here in roughly the order the pipeline uses them. Every field has the value of
//! the reference analysis as its default, and a TOML file only needs to name what it changes.
use crate::{anomaly::ReferencePeriod, error::Result, keys::AlternateGlobal};
use serde::Deserialize;

/// Parameters controlling the analysis.
///
/// # Examples
///
/// ```rust
/// use temperature_analysis::Parameters;
///
/// let params = Parameters::from_toml_str(
///     r#"
///     gridding_radius = 250.0
///     box_reference_period = [1961, 1990]
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(params.gridding_radius, 250.0);
/// assert_eq!(params.box_reference_period.first, 1961);
/// assert_eq!(params.station_combine_min_overlap, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    /// Years of annual anomaly overlap needed to add a duplicate record into a combined station
    /// record.
    pub station_combine_min_overlap: usize,
    /// Years either side of the middle of a potential combination considered when reconciling
    /// record pieces.
    pub station_combine_bucket_radius: i32,
    /// Valid years both pieces need inside the window when reconciling record pieces.
    pub station_combine_min_mid_years: usize,

    /// Years of overlap per calendar month needed to add a station into a cell.
    pub gridding_min_overlap: usize,
    /// Radius in kilometres used to find and weight stations for a cell.
    pub gridding_radius: f64,
    /// Radius of the earth in kilometres, turns the gridding radius into an angle.
    pub earth_radius: f64,
    /// Base period for cell anomalies.
    pub gridding_reference_period: ReferencePeriod,

    /// Cells with fewer valid months are not combined into boxes, and an ocean cell this short
    /// loses to the land cell.
    pub subbox_min_valid: usize,
    /// A land cell whose nearest station is closer than this (km) is preferred over the ocean.
    pub subbox_land_range: f64,
    /// Base period for box anomalies.
    pub subbox_reference_period: ReferencePeriod,

    /// Years of overlap per calendar month needed when combining cells, boxes and bands.
    pub box_min_overlap: usize,
    /// Base period for band and zone anomalies.
    pub box_reference_period: ReferencePeriod,

    /// Valid months needed for a zone's annual mean.
    pub zone_annual_min_months: usize,
    /// Formula used for the global annual and monthly means.
    pub alternate_global: AlternateGlobal,
    /// Blend hemispheres from their tropical and extratropical zones.
    pub alternate_hemispheres: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            station_combine_min_overlap: 4,
            station_combine_bucket_radius: 10,
            station_combine_min_mid_years: 5,

            gridding_min_overlap: 20,
            gridding_radius: 1200.0,
            earth_radius: 6371.0,
            gridding_reference_period: ReferencePeriod::new(1951, 1980),

            subbox_min_valid: 240,
            subbox_land_range: 100.0,
            subbox_reference_period: ReferencePeriod::new(1961, 1990),

            box_min_overlap: 20,
            box_reference_period: ReferencePeriod::new(1951, 1980),

            zone_annual_min_months: 6,
            alternate_global: AlternateGlobal::Bands,
            alternate_hemispheres: true,
        }
    }
}

impl Parameters {
    /// Create the default parameters.
    #[inline]
    pub fn new() -> Self {
        Parameters::default()
    }

    /// Read parameters from TOML, anything not mentioned keeps its default.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// The gridding radius as an angle of arc in radians.
    #[inline]
    pub fn gridding_arc(&self) -> f64 {
        self.gridding_radius / self.earth_radius
    }
}
