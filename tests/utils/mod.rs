#![allow(dead_code)]
use temperature_analysis::{MonthKey, Series, Station, StationRecord};

pub fn approx_equal(val1: f64, val2: f64, eps: f64) -> bool {
    assert!(eps > 0.0);

    (val1 - val2).abs() < eps
}

pub fn key(year: i32, month: u32) -> MonthKey {
    MonthKey::new(year, month).unwrap()
}

/// January values keyed by year.
pub fn januaries(values: &[(i32, f64)]) -> Series {
    values.iter().map(|&(year, val)| (key(year, 1), val)).collect()
}

/// Every month from January of `first` through December of `last`, valued by `f`.
pub fn monthly<F>(first: i32, last: i32, f: F) -> Series
where
    F: Fn(MonthKey) -> f64,
{
    (first..=last)
        .flat_map(|year| (1..=12).map(move |month| key(year, month)))
        .map(|k| (k, f(k)))
        .collect()
}

/// A record with uid `<id>0` for a station at `location`.
pub fn record_at(id: &str, location: (f64, f64), series: Series) -> StationRecord {
    StationRecord::new(
        format!("{}0", id),
        Station::new(id, location.0, location.1),
        series,
    )
}
