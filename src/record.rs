//! Station metadata and station records.
use crate::{
    anomaly::{annual_and_seasonal, AnnualAnomalies},
    keys::SourceRank,
    series::Series,
};
use optional::Optioned;
use std::{collections::HashMap, fmt::Display, str::FromStr};

/// Station information including location data and identification.
///
/// Created once from external metadata and never changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Station {
    id: String,
    lat: f64,
    lon: f64,
    elevation: Optioned<f64>,
    vegetation: Option<String>,
    urbanity: Option<String>,
    brightness: Optioned<f64>,
}

impl Station {
    /// Create a new station at a location, `lat` and `lon` in degrees.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use temperature_analysis::Station;
    ///
    /// let stn = Station::new("42572383000", 34.9, -120.45).with_elevation(100.0);
    /// assert_eq!(stn.id(), "42572383000");
    /// assert_eq!(stn.location(), (34.9, -120.45));
    /// assert_eq!(stn.elevation().unpack(), 100.0);
    /// ```
    pub fn new<S: Into<String>>(id: S, lat: f64, lon: f64) -> Self {
        Station {
            id: id.into(),
            lat,
            lon,
            ..Station::default()
        }
    }

    /// Builder method to add an elevation in meters.
    #[inline]
    pub fn with_elevation<T>(mut self, elevation: T) -> Self
    where
        Optioned<f64>: From<T>,
    {
        self.elevation = Optioned::from(elevation);
        self
    }

    /// Builder method to add the vegetation classifier.
    #[inline]
    pub fn with_vegetation<S>(mut self, vegetation: S) -> Self
    where
        Option<String>: From<S>,
    {
        self.vegetation = Option::from(vegetation);
        self
    }

    /// Builder method to add the population/urbanity classifier.
    #[inline]
    pub fn with_urbanity<S>(mut self, urbanity: S) -> Self
    where
        Option<String>: From<S>,
    {
        self.urbanity = Option::from(urbanity);
        self
    }

    /// Builder method to add the satellite night light brightness.
    #[inline]
    pub fn with_brightness<T>(mut self, brightness: T) -> Self
    where
        Optioned<f64>: From<T>,
    {
        self.brightness = Optioned::from(brightness);
        self
    }

    /// The station identifier shared by all of its records.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latitude and longitude in degrees.
    #[inline]
    pub fn location(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Elevation in meters.
    #[inline]
    pub fn elevation(&self) -> Optioned<f64> {
        self.elevation
    }

    /// Vegetation classifier.
    #[inline]
    pub fn vegetation(&self) -> Option<&str> {
        self.vegetation.as_deref()
    }

    /// Population/urbanity classifier.
    #[inline]
    pub fn urbanity(&self) -> Option<&str> {
        self.urbanity.as_deref()
    }

    /// Night light brightness.
    #[inline]
    pub fn brightness(&self) -> Optioned<f64> {
        self.brightness
    }
}

/// Values derived from a record's series, always in step with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSummary {
    /// Year of the first valid month.
    pub first_year: Option<i32>,
    /// Year of the last valid month.
    pub last_year: Option<i32>,
    /// Number of valid months.
    pub good_count: usize,
    /// Annual mean and annual anomalies.
    pub annual: AnnualAnomalies,
}

impl RecordSummary {
    fn from_series(series: &Series) -> Self {
        RecordSummary {
            first_year: series.first_year(),
            last_year: series.last_year(),
            good_count: series.valid_count(),
            annual: annual_and_seasonal(series),
        }
    }
}

/// A monthly series belonging to one station. A station may have several of these, e.g.
/// duplicates from different sources.
#[derive(Debug, Clone)]
pub struct StationRecord {
    uid: String,
    station: Station,
    source: SourceRank,
    series: Series,
    summary: RecordSummary,
}

impl StationRecord {
    /// Create a new record, `uid` must be unique among all records.
    pub fn new<S: Into<String>>(uid: S, station: Station, series: Series) -> Self {
        let summary = RecordSummary::from_series(&series);
        StationRecord {
            uid: uid.into(),
            station,
            source: SourceRank::default(),
            series,
            summary,
        }
    }

    /// Builder method to set the data source.
    #[inline]
    pub fn with_source(mut self, source: SourceRank) -> Self {
        self.source = source;
        self
    }

    /// Unique identifier of this record.
    #[inline]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The station this record belongs to.
    #[inline]
    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Identifier of the station, shared with all duplicates of this record.
    #[inline]
    pub fn station_id(&self) -> &str {
        self.station.id()
    }

    /// Data source of the record.
    #[inline]
    pub fn source(&self) -> SourceRank {
        self.source
    }

    /// The monthly data.
    #[inline]
    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Replace the monthly data, the summary is recomputed before this returns.
    pub fn set_series(&mut self, series: Series) {
        self.summary = RecordSummary::from_series(&series);
        self.series = series;
    }

    /// Take the monthly data out so it can be edited, then hand it back with
    /// [`set_series`](StationRecord::set_series).
    pub fn take_series(&mut self) -> Series {
        let series = std::mem::take(&mut self.series);
        self.summary = RecordSummary::default();
        series
    }

    /// Derived values.
    #[inline]
    pub fn summary(&self) -> &RecordSummary {
        &self.summary
    }

    /// Number of valid months.
    #[inline]
    pub fn good_count(&self) -> usize {
        self.summary.good_count
    }

    /// Year of the first valid month.
    #[inline]
    pub fn first_year(&self) -> Option<i32> {
        self.summary.first_year
    }

    /// Year of the last valid month.
    #[inline]
    pub fn last_year(&self) -> Option<i32> {
        self.summary.last_year
    }

    /// Number of years with a valid annual anomaly.
    #[inline]
    pub fn annual_good_count(&self) -> usize {
        self.summary.annual.anomalies.len()
    }
}

impl Display for StationRecord {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (self.first_year(), self.last_year()) {
            (Some(first), Some(last)) => {
                write!(formatter, "{} {} {} -- {:?}", self.uid, first, last, self.source)
            }
            _ => write!(formatter, "{} (empty) -- {:?}", self.uid, self.source),
        }
    }
}

/// Maps record identifiers to the source they came from.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    sources: HashMap<String, SourceRank>,
}

impl SourceTable {
    /// An empty table, every record keeps its own source.
    #[inline]
    pub fn new() -> Self {
        SourceTable::default()
    }

    /// Add or replace the source for a record.
    #[inline]
    pub fn insert<S: Into<String>>(&mut self, uid: S, source: SourceRank) {
        self.sources.insert(uid.into(), source);
    }

    /// Add a source given by its tag, e.g. "MCDW". Unknown tags map to `SourceRank::Unknown`.
    pub fn insert_tag<S: Into<String>>(&mut self, uid: S, tag: &str) {
        let rank = SourceRank::from_str(tag.trim()).unwrap_or(SourceRank::Unknown);
        self.insert(uid, rank);
    }

    /// The rank for a record, falling back to the record's own source.
    #[inline]
    pub fn rank(&self, record: &StationRecord) -> SourceRank {
        self.sources
            .get(record.uid())
            .copied()
            .unwrap_or_else(|| record.source())
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
