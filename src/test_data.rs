//! Synthetic station data used in tests.
use crate::{
    record::{Station, StationRecord},
    series::{MonthKey, Series},
};
use std::f64::consts::PI;

/// A smooth annual cycle, coldest in January.
pub fn seasonal_cycle(month_index: usize) -> f64 {
    10.0 - 8.0 * (2.0 * PI * month_index as f64 / 12.0).cos()
}

/// Year to year variation, repeating every 5 years so any 5 consecutive years average to 0.
///
/// Keyed by meteorological year so a whole winter moves together.
pub fn wiggle(met_year: i32) -> f64 {
    0.3 * (met_year * 7).rem_euclid(5) as f64 - 0.6
}

/// The value every synthetic record has for a month, before its offset.
pub fn synthetic_value(key: MonthKey, offset: f64) -> f64 {
    seasonal_cycle(key.month_index()) + wiggle(key.met_year()) + offset
}

/// Complete years `first` through `last` of the synthetic climate.
pub fn synthetic_series(first: i32, last: i32, offset: f64) -> Series {
    (first..=last)
        .flat_map(|year| (1..=12).map(move |month| (year, month)))
        .filter_map(|(year, month)| MonthKey::new(year, month).ok())
        .map(|key| (key, synthetic_value(key, offset)))
        .collect()
}

/// Record number `dup` of a station in northern Algeria.
pub fn station_record(
    station_id: &str,
    dup: usize,
    first: i32,
    last: i32,
    offset: f64,
) -> StationRecord {
    let station = Station::new(station_id, 36.93, 6.95).with_elevation(7.0);
    StationRecord::new(
        format!("{}{}", station_id, dup),
        station,
        synthetic_series(first, last, offset),
    )
}

/// A single record for a station at `location`.
pub fn station_record_at(
    station_id: &str,
    location: (f64, f64),
    first: i32,
    last: i32,
    offset: f64,
) -> StationRecord {
    let station = Station::new(station_id, location.0, location.1);
    StationRecord::new(
        format!("{}0", station_id),
        station,
        synthetic_series(first, last, offset),
    )
}
