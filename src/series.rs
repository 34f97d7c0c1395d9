//! Monthly time series keyed by year and month, and the matching weight maps.
//!
//! Values are stored as `Optioned<f64>`, so a missing month is a distinct state rather than a
//! magic number. Storage is sparse and always enumerated in chronological order.
use crate::error::{AnalysisError, Result};
use chrono::Datelike;
use optional::Optioned;
use std::{collections::BTreeMap, fmt::Display, iter::FromIterator};

/// Key for a single month of a series.
///
/// Keys order chronologically, January of a year sorts before February of the same year and
/// December sorts before January of the next year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    // 1 to 12
    month: u32,
}

impl MonthKey {
    /// Create a new key, `month` runs from 1 (January) to 12 (December).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use temperature_analysis::MonthKey;
    ///
    /// let key = MonthKey::new(1951, 12).unwrap();
    /// assert_eq!(key.met_year(), 1952);
    /// assert!(MonthKey::new(1951, 13).is_err());
    /// ```
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if (1..=12).contains(&month) {
            Ok(MonthKey { year, month })
        } else {
            Err(AnalysisError::InvalidMonth { year, month })
        }
    }

    /// Create a key from a zero based calendar month index, 0 is January.
    #[inline]
    pub(crate) fn from_index(year: i32, index: usize) -> Self {
        debug_assert!(index < 12);
        MonthKey {
            year,
            month: index as u32 + 1,
        }
    }

    /// Key for the month containing a date.
    #[inline]
    pub fn from_date<D: Datelike>(date: &D) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The calendar year.
    #[inline]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The month number, 1 to 12.
    #[inline]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Zero based calendar month, 0 for January through 11 for December.
    #[inline]
    pub fn month_index(&self) -> usize {
        (self.month - 1) as usize
    }

    /// The meteorological year. This is the calendar year except for December, which belongs to
    /// the following year's winter.
    #[inline]
    pub fn met_year(&self) -> i32 {
        if self.month == 12 {
            self.year + 1
        } else {
            self.year
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{:04}-{:02}", self.year, self.month)
    }
}

/// A monthly series of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    data: BTreeMap<MonthKey, Optioned<f64>>,
}

impl Series {
    /// Create an empty series.
    #[inline]
    pub fn new() -> Self {
        Series::default()
    }

    /// Build a series from a dense run of monthly values starting in January of `first_year`.
    ///
    /// Missing entries in `values` are not stored.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use temperature_analysis::{MonthKey, Series};
    /// use optional::{none, some};
    ///
    /// let series = Series::from_linear(1880, &[some(1.0), none(), some(3.0)]);
    /// assert_eq!(series.valid_count(), 2);
    /// assert!(series.get(&MonthKey::new(1880, 2).unwrap()).is_none());
    /// assert_eq!(series.get(&MonthKey::new(1880, 3).unwrap()).unpack(), 3.0);
    /// ```
    pub fn from_linear(first_year: i32, values: &[Optioned<f64>]) -> Self {
        values
            .iter()
            .enumerate()
            .filter_map(|(i, val)| {
                val.into_option().map(|val| {
                    let key = MonthKey::from_index(first_year + (i / 12) as i32, i % 12);
                    (key, val)
                })
            })
            .collect()
    }

    /// Set the value for a month. Passing a missing value marks the month as explicitly missing.
    #[inline]
    pub fn insert<T>(&mut self, key: MonthKey, value: T)
    where
        Optioned<f64>: From<T>,
    {
        self.data.insert(key, Optioned::from(value));
    }

    /// Get the value for a month, missing if there is no such key.
    #[inline]
    pub fn get(&self, key: &MonthKey) -> Optioned<f64> {
        self.data.get(key).copied().unwrap_or_default()
    }

    /// Whether there is a valid value for this month.
    #[inline]
    pub fn is_valid(&self, key: &MonthKey) -> bool {
        self.get(key).is_some()
    }

    /// Remove a month from the series, returning what was stored there.
    #[inline]
    pub fn remove(&mut self, key: &MonthKey) -> Optioned<f64> {
        self.data.remove(key).unwrap_or_default()
    }

    /// Keep only the months for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(MonthKey) -> bool,
    {
        self.data.retain(|key, _| keep(*key));
    }

    /// Replace every valid value with the result of `f`.
    pub fn map_valid<F>(&mut self, mut f: F)
    where
        F: FnMut(MonthKey, f64) -> f64,
    {
        for (key, val) in self.data.iter_mut() {
            if let Some(v) = val.into_option() {
                *val = Optioned::from(f(*key, v));
            }
        }
    }

    /// All stored months in chronological order, including explicitly missing ones.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (MonthKey, Optioned<f64>)> + '_ {
        self.data.iter().map(|(k, v)| (*k, *v))
    }

    /// The valid months in chronological order.
    #[inline]
    pub fn valid(&self) -> impl Iterator<Item = (MonthKey, f64)> + '_ {
        self.data
            .iter()
            .filter_map(|(k, v)| v.into_option().map(|v| (*k, v)))
    }

    /// The valid values for a single calendar month (0 is January), in chronological order.
    #[inline]
    pub fn valid_in_month(&self, month_index: usize) -> impl Iterator<Item = (MonthKey, f64)> + '_ {
        self.valid()
            .filter(move |(k, _)| k.month_index() == month_index)
    }

    /// Number of stored months, valid or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of valid months.
    #[inline]
    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// True if there are no valid values at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.valid().next().is_none()
    }

    /// The year of the first valid value.
    #[inline]
    pub fn first_year(&self) -> Option<i32> {
        self.valid().next().map(|(k, _)| k.year())
    }

    /// The year of the last valid value.
    #[inline]
    pub fn last_year(&self) -> Option<i32> {
        self.data
            .iter()
            .rev()
            .find(|(_, v)| v.is_some())
            .map(|(k, _)| k.year())
    }

    /// Number of valid values for each calendar month, index 0 is January.
    pub fn monthly_valid_counts(&self) -> [usize; 12] {
        let mut counts = [0usize; 12];
        for (key, _) in self.valid() {
            counts[key.month_index()] += 1;
        }
        counts
    }

    /// True if any month of the calendar `year` has valid data.
    pub fn has_data_for_year(&self, year: i32) -> bool {
        self.valid().any(|(k, _)| k.year() == year)
    }

    /// The twelve values for a calendar year, January first.
    pub fn year_values(&self, year: i32) -> [Optioned<f64>; 12] {
        let mut vals = [Optioned::<f64>::default(); 12];
        for (i, val) in vals.iter_mut().enumerate() {
            *val = self.get(&MonthKey::from_index(year, i));
        }
        vals
    }

    /// Flatten to a dense vector starting in January of `begin` and stopping before January of
    /// `limit`.
    pub fn linear(&self, begin: i32, limit: i32) -> Vec<Optioned<f64>> {
        (begin..limit)
            .flat_map(|year| (0..12).map(move |m| MonthKey::from_index(year, m)))
            .map(|key| self.get(&key))
            .collect()
    }
}

impl FromIterator<(MonthKey, f64)> for Series {
    fn from_iter<I: IntoIterator<Item = (MonthKey, f64)>>(iter: I) -> Self {
        Series {
            data: iter
                .into_iter()
                .map(|(k, v)| (k, Optioned::from(v)))
                .collect(),
        }
    }
}

impl Extend<(MonthKey, f64)> for Series {
    fn extend<I: IntoIterator<Item = (MonthKey, f64)>>(&mut self, iter: I) {
        self.data
            .extend(iter.into_iter().map(|(k, v)| (k, Optioned::from(v))));
    }
}

/// Accumulated contribution weight for each month of a series. An absent month has weight 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    data: BTreeMap<MonthKey, f64>,
}

impl Weights {
    /// Create an empty set of weights.
    #[inline]
    pub fn new() -> Self {
        Weights::default()
    }

    /// The same weight for every valid month of `series`.
    pub fn uniform(series: &Series, weight: f64) -> Self {
        Weights {
            data: series.valid().map(|(k, _)| (k, weight)).collect(),
        }
    }

    /// Weight for a month, 0 if absent.
    #[inline]
    pub fn get(&self, key: &MonthKey) -> f64 {
        self.data.get(key).copied().unwrap_or(0.0)
    }

    /// Set the weight for a month.
    #[inline]
    pub fn set(&mut self, key: MonthKey, weight: f64) {
        self.data.insert(key, weight);
    }

    /// All weights in chronological order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (MonthKey, f64)> + '_ {
        self.data.iter().map(|(k, w)| (*k, *w))
    }

    /// Number of months with a stored weight.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no weights are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// First and last calendar years that carry a non-zero weight.
    pub fn year_span(&self) -> Option<(i32, i32)> {
        let mut years = self
            .data
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(k, _)| k.year());
        let first = years.next()?;
        let last = years.last().unwrap_or(first);
        Some((first, last))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use optional::{none, some};

    fn key(year: i32, month: u32) -> MonthKey {
        MonthKey::new(year, month).unwrap()
    }

    #[test]
    fn test_month_key_order() {
        assert!(key(1950, 12) < key(1951, 1));
        assert!(key(1951, 1) < key(1951, 2));
        assert_eq!(key(1950, 12).met_year(), 1951);
        assert_eq!(key(1951, 11).met_year(), 1951);
        assert_eq!(key(1951, 11).to_string(), "1951-11");
        assert!(MonthKey::new(1951, 0).is_err());
    }

    #[test]
    fn test_from_date() {
        let date = chrono::NaiveDate::from_ymd_opt(1987, 6, 30).unwrap();
        assert_eq!(MonthKey::from_date(&date), key(1987, 6));
    }

    #[test]
    fn test_missing_values_are_not_valid() {
        let mut series = Series::new();
        series.insert(key(1900, 1), 1.5);
        series.insert(key(1900, 2), none::<f64>());
        series.insert(key(1900, 3), some(2.5));

        assert_eq!(series.len(), 3);
        assert_eq!(series.valid_count(), 2);
        assert!(!series.is_valid(&key(1900, 2)));
        assert!(series.get(&key(1850, 1)).is_none());

        let vals: Vec<f64> = series.valid().map(|(_, v)| v).collect();
        assert_eq!(vals, vec![1.5, 2.5]);
    }

    #[test]
    fn test_years_and_counts() {
        let series: Series = vec![
            (key(1901, 3), 1.0),
            (key(1899, 1), 2.0),
            (key(1900, 1), 3.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(series.first_year(), Some(1899));
        assert_eq!(series.last_year(), Some(1901));
        let counts = series.monthly_valid_counts();
        assert_eq!(counts[0], 2);
        assert_eq!(counts[2], 1);
        assert!(series.has_data_for_year(1900));
        assert!(!series.has_data_for_year(1902));

        assert!(Series::new().first_year().is_none());
        assert!(Series::new().is_empty());
    }

    #[test]
    fn test_linear_round_trip() {
        let vals = vec![some(1.0), none(), some(3.0), some(4.0)];
        let series = Series::from_linear(1950, &vals);
        let back = series.linear(1950, 1951);
        assert_eq!(back.len(), 12);
        let head: Vec<Option<f64>> = back[..4].iter().map(|v| v.into_option()).collect();
        assert_eq!(head, vec![Some(1.0), None, Some(3.0), Some(4.0)]);
        assert!(back[4..].iter().all(|v| v.is_none()));

        let year = series.year_values(1950);
        assert_eq!(year[3].unpack(), 4.0);
    }

    #[test]
    fn test_retain_and_map() {
        let mut series = Series::from_linear(1950, &[some(1.0); 24]);
        series.retain(|k| k.year() != 1950);
        assert_eq!(series.valid_count(), 12);
        series.map_valid(|_, v| v + 0.5);
        assert!(series.valid().all(|(_, v)| (v - 1.5).abs() < 1.0e-12));
    }

    #[test]
    fn test_weights() {
        let series = Series::from_linear(1950, &[some(1.0); 14]);
        let mut weights = Weights::uniform(&series, 0.5);
        assert_eq!(weights.len(), 14);
        assert_eq!(weights.get(&key(1950, 1)), 0.5);
        assert_eq!(weights.get(&key(1949, 1)), 0.0);
        assert_eq!(weights.year_span(), Some((1950, 1951)));

        weights.set(key(1960, 1), 0.0);
        assert_eq!(weights.year_span(), Some((1950, 1951)));
        assert!(Weights::new().year_span().is_none());
    }
}
