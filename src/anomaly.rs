//! Monthly anomalies, and the seasonal route from monthly to annual values.
use crate::{
    series::{MonthKey, Series},
    utility::valid_mean,
};
use itertools::Itertools;
use optional::Optioned;
use std::collections::BTreeMap;

/// An inclusive span of years used as the climatological base for anomalies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(from = "(i32, i32)")]
pub struct ReferencePeriod {
    /// First year of the period.
    pub first: i32,
    /// Last year of the period, inclusive.
    pub last: i32,
}

impl ReferencePeriod {
    /// Create a new reference period.
    #[inline]
    pub fn new(first: i32, last: i32) -> Self {
        ReferencePeriod { first, last }
    }

    /// Whether `year` falls inside the period.
    #[inline]
    pub fn contains(&self, year: i32) -> bool {
        year >= self.first && year <= self.last
    }
}

impl From<(i32, i32)> for ReferencePeriod {
    fn from((first, last): (i32, i32)) -> Self {
        ReferencePeriod { first, last }
    }
}

/// The calendar months making up each season, December belongs to the following year's winter.
pub const SEASONS: [[usize; 3]; 4] = [[11, 0, 1], [2, 3, 4], [5, 6, 7], [8, 9, 10]];

/// Climatological means and the resulting anomalies of a monthly series.
#[derive(Debug, Clone, Default)]
pub struct MonthlyAnomalies {
    /// Mean for each calendar month, missing for a month with no data at all.
    pub means: [Optioned<f64>; 12],
    /// The series with each calendar month's mean removed.
    pub anomalies: Series,
}

/// Calculate monthly anomalies by subtracting from every valid value the mean for its calendar
/// month.
///
/// The mean for a calendar month is taken over the years in `reference`. If that month has no
/// valid data inside the period, or no period is given, the mean is taken over the whole series.
pub fn monthly_anomalies(data: &Series, reference: Option<ReferencePeriod>) -> MonthlyAnomalies {
    let mut result = MonthlyAnomalies::default();

    for month in 0..12 {
        let vals: Vec<(MonthKey, f64)> = data.valid_in_month(month).collect();
        if vals.is_empty() {
            continue;
        }

        let in_period: Vec<f64> = vals
            .iter()
            .filter(|(k, _)| reference.map(|r| r.contains(k.year())).unwrap_or(true))
            .map(|&(_, v)| v)
            .collect();

        let mean = if in_period.is_empty() {
            // Fall back to the entire period
            vals.iter().map(|&(_, v)| v).sum::<f64>() / vals.len() as f64
        } else {
            in_period.iter().sum::<f64>() / in_period.len() as f64
        };

        result.means[month] = Optioned::from(mean);
        result
            .anomalies
            .extend(vals.into_iter().map(|(k, v)| (k, v - mean)));
    }

    result
}

/// Turn a series into anomalies relative to monthly means over `reference`. See
/// [`monthly_anomalies`] for the fallback rules. The input is not changed.
///
/// # Examples
///
/// ```rust
/// use temperature_analysis::{anomalize, MonthKey, ReferencePeriod, Series};
///
/// let jan = |y| MonthKey::new(y, 1).unwrap();
/// let data: Series = vec![(jan(1950), 1.0), (jan(1951), 3.0), (jan(1990), 5.0)]
///     .into_iter()
///     .collect();
///
/// let anoms = anomalize(&data, Some(ReferencePeriod::new(1950, 1951)));
/// assert_eq!(anoms.get(&jan(1950)).unpack(), -1.0);
/// assert_eq!(anoms.get(&jan(1990)).unpack(), 3.0);
/// ```
#[inline]
pub fn anomalize(data: &Series, reference: Option<ReferencePeriod>) -> Series {
    monthly_anomalies(data, reference).anomalies
}

/// Seasonal climatology and seasonal anomalies, in the order of [`SEASONS`].
#[derive(Debug, Clone, Default)]
pub struct SeasonalAnomalies {
    /// Mean for each season, requires two valid monthly means.
    pub means: [Optioned<f64>; 4],
    /// Anomaly for each season keyed by meteorological year, requires two valid months.
    pub anomalies: [BTreeMap<i32, f64>; 4],
}

/// Average monthly means into seasonal means and monthly anomalies into seasonal anomalies.
pub fn seasonal_anomalies(monthly: &MonthlyAnomalies) -> SeasonalAnomalies {
    let mut result = SeasonalAnomalies::default();

    for (season, months) in SEASONS.iter().enumerate() {
        // Need at least two valid months for a valid season.
        result.means[season] = valid_mean(months.iter().map(|&m| monthly.means[m]), 2);

        let groups = monthly
            .anomalies
            .valid()
            .filter(|(k, _)| months.contains(&k.month_index()))
            .sorted_by_key(|(k, _)| (k.met_year(), *k))
            .group_by(|(k, _)| k.met_year());

        for (year, group) in &groups {
            let vals: Vec<f64> = group.map(|(_, v)| v).collect();
            if vals.len() >= 2 {
                let mean = vals.iter().sum::<f64>() / vals.len() as f64;
                result.anomalies[season].insert(year, mean);
            }
        }
    }

    result
}

/// The annual mean of a series and its annual anomalies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnualAnomalies {
    /// Mean annual value, missing unless three seasonal means are valid.
    pub mean: Optioned<f64>,
    /// Annual (December to November) anomaly for each year with three valid seasons.
    pub anomalies: BTreeMap<i32, f64>,
}

/// Compute the annual mean and the annual anomalies of a monthly series.
///
/// This goes via monthly anomalies and then seasonal ones, and the thresholds at each step are
/// fixed: a season needs two of its three months and a year needs three of its four seasons.
/// Annual anomalies run from December of the previous year through November.
pub fn annual_and_seasonal(data: &Series) -> AnnualAnomalies {
    let monthly = monthly_anomalies(data, None);
    let seasonal = seasonal_anomalies(&monthly);

    let mean = valid_mean(seasonal.means.iter().copied(), 3);

    let mut anomalies = BTreeMap::new();
    let years: Vec<i32> = seasonal
        .anomalies
        .iter()
        .flat_map(|s| s.keys().copied())
        .sorted()
        .dedup()
        .collect();
    for year in years {
        let vals: Vec<f64> = seasonal
            .anomalies
            .iter()
            .filter_map(|s| s.get(&year).copied())
            .collect();
        if vals.len() >= 3 {
            anomalies.insert(year, vals.iter().sum::<f64>() / vals.len() as f64);
        }
    }

    AnnualAnomalies { mean, anomalies }
}

/// Calendar year means of a series, only for years with at least `min_months` valid months.
pub fn annual_means(data: &Series, min_months: usize) -> BTreeMap<i32, f64> {
    let mut result = BTreeMap::new();
    for (year, group) in &data.valid().group_by(|(k, _)| k.year()) {
        let vals: Vec<f64> = group.map(|(_, v)| v).collect();
        if !vals.is_empty() && vals.len() >= min_months {
            result.insert(year, vals.iter().sum::<f64>() / vals.len() as f64);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utility::test_tools::*;
    use optional::some;

    fn key(year: i32, month: u32) -> MonthKey {
        MonthKey::new(year, month).unwrap()
    }

    #[test]
    fn test_anomalies_over_reference_period_average_to_zero() {
        let data: Series = (1940..1990)
            .flat_map(|y| {
                (1..=12).map(move |m| {
                    let val = (y * m as i32 % 7) as f64 + 0.1 * m as f64;
                    (key(y, m), val)
                })
            })
            .collect();
        let period = ReferencePeriod::new(1951, 1980);
        let anoms = anomalize(&data, Some(period));

        for month in 0..12 {
            let vals: Vec<f64> = anoms
                .valid_in_month(month)
                .filter(|(k, _)| period.contains(k.year()))
                .map(|(_, v)| v)
                .collect();
            assert_eq!(vals.len(), 30);
            let mean = vals.iter().sum::<f64>() / vals.len() as f64;
            assert!(approx_equal(mean, 0.0, 1.0e-10));
        }
    }

    #[test]
    fn test_anomalies_fall_back_to_whole_series() {
        // March only has data outside the reference period.
        let data: Series = vec![
            (key(1900, 3), 2.0),
            (key(1901, 3), 4.0),
            (key(1960, 4), 7.0),
            (key(1900, 4), 1.0),
        ]
        .into_iter()
        .collect();

        let result = monthly_anomalies(&data, Some(ReferencePeriod::new(1951, 1980)));
        assert!(approx_equal(result.means[2].unpack(), 3.0, 1.0e-12));
        assert!(approx_equal(result.means[3].unpack(), 7.0, 1.0e-12));
        assert!(result.means[0].is_none());
        assert!(approx_equal(result.anomalies.get(&key(1900, 3)).unpack(), -1.0, 1.0e-12));
        assert!(approx_equal(result.anomalies.get(&key(1900, 4)).unpack(), -6.0, 1.0e-12));
        assert_eq!(result.anomalies.valid_count(), 4);

        // Without a period everything is averaged over the whole series.
        let result = monthly_anomalies(&data, None);
        assert!(approx_equal(result.means[3].unpack(), 4.0, 1.0e-12));
    }

    #[test]
    fn test_anomalize_does_not_touch_missing() {
        let mut data = Series::from_linear(1950, &[some(1.0); 24]);
        data.insert(key(1952, 1), optional::none::<f64>());
        let anoms = anomalize(&data, None);
        assert!(anoms.get(&key(1952, 1)).is_none());
        assert_eq!(anoms.valid_count(), 24);
    }

    #[test]
    fn test_annual_mean_of_full_years() {
        // Three complete years, every threshold is met.
        let vals: Vec<f64> = (0..36).map(|i| ((i * 37) % 11) as f64 - 3.0).collect();
        let data = Series::from_linear(
            1960,
            &vals.iter().map(|&v| some(v)).collect::<Vec<_>>(),
        );

        let annual = annual_and_seasonal(&data);
        let simple = vals.iter().sum::<f64>() / 36.0;
        assert!(approx_equal(annual.mean.unpack(), simple, 1.0e-10));
    }

    #[test]
    fn test_december_belongs_to_next_year() {
        // A constant series except for a warm December 1960.
        let mut data = Series::from_linear(1960, &[some(0.0); 36]);
        data.insert(key(1960, 12), 12.0);

        let annual = annual_and_seasonal(&data);
        // 1960 has no December of 1959, so winter 1960 is Jan + Feb only.
        assert!(annual.anomalies.contains_key(&1960));
        assert!(annual.anomalies.contains_key(&1961));
        // The warm month lifts 1961 and not 1960.
        assert!(annual.anomalies[&1961] > annual.anomalies[&1960]);
        // Winter 1963 would only be December 1962, not enough for a season, and the other
        // seasons do not exist, so there is no 1963.
        assert!(!annual.anomalies.contains_key(&1963));
    }

    #[test]
    fn test_season_needs_two_months() {
        // Only January and April to June in one year.
        let data: Series = vec![
            (key(1970, 1), 1.0),
            (key(1970, 4), 1.0),
            (key(1970, 5), 1.0),
            (key(1970, 6), 1.0),
        ]
        .into_iter()
        .collect();

        let annual = annual_and_seasonal(&data);
        // Winter has one month, spring two, summer one and autumn none.
        assert!(annual.mean.is_none());
        assert!(annual.anomalies.is_empty());
    }

    #[test]
    fn test_annual_means() {
        let mut data = Series::from_linear(2000, &[some(1.0); 12]);
        data.extend((1..=5).map(|m| (key(2001, m), 3.0)));
        let means = annual_means(&data, 6);
        assert_eq!(means.len(), 1);
        assert!(approx_equal(means[&2000], 1.0, 1.0e-12));
        assert_eq!(annual_means(&data, 5).len(), 2);
    }
}
