//! Bias corrected, weighted combination of two monthly series.
//!
//! This is the one algorithm every stage of the pipeline shares. Station duplicates, grid cells,
//! boxes, bands and zones are all built by repeatedly folding an incoming series into an
//! accumulating one.
use crate::{
    error::{AnalysisError, Result},
    series::{MonthKey, Series, Weights},
};
use std::ops::{Add, Index};

/// Weight of the incoming series in a combine.
#[derive(Debug, Clone, Copy)]
pub enum IncomingWeight<'a> {
    /// The same weight for every month of the incoming series.
    Scalar(f64),
    /// A weight for each month, months without an entry have weight 0.
    PerMonth(&'a Weights),
}

impl<'a> IncomingWeight<'a> {
    #[inline]
    fn get(&self, key: &MonthKey) -> f64 {
        match self {
            IncomingWeight::Scalar(w) => *w,
            IncomingWeight::PerMonth(weights) => weights.get(key),
        }
    }
}

impl<'a> From<f64> for IncomingWeight<'a> {
    fn from(w: f64) -> Self {
        IncomingWeight::Scalar(w)
    }
}

impl<'a> From<&'a Weights> for IncomingWeight<'a> {
    fn from(weights: &'a Weights) -> Self {
        IncomingWeight::PerMonth(weights)
    }
}

/// Number of months merged for each calendar month, index 0 is January.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthCounts([usize; 12]);

impl MonthCounts {
    /// Total months merged over the whole year.
    #[inline]
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// True if nothing was merged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The counts as an array.
    #[inline]
    pub fn as_array(&self) -> &[usize; 12] {
        &self.0
    }
}

impl Index<usize> for MonthCounts {
    type Output = usize;

    fn index(&self, month_index: usize) -> &usize {
        &self.0[month_index]
    }
}

impl Add for MonthCounts {
    type Output = MonthCounts;

    fn add(mut self, other: MonthCounts) -> MonthCounts {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
        self
    }
}

/// Combine `incoming` into `base`, one calendar month at a time.
///
/// For each calendar month the months valid in both series form the overlap. If the overlap
/// has fewer than `min_overlap` members that calendar month is left alone. Otherwise the mean
/// difference `base - incoming` over the overlap is the bias, and every valid incoming value
/// for that calendar month (not just the overlap) is shifted by the bias and folded into `base`
/// as a weighted mean. `base_weight` accumulates the weights.
///
/// Returns how many months were merged for each calendar month.
///
/// # Examples
///
/// ```rust
/// use temperature_analysis::{combine, MonthKey, Series, Weights};
///
/// let jan = |y| MonthKey::new(y, 1).unwrap();
/// let mut base: Series = vec![(jan(1950), 1.0), (jan(1951), 2.0)].into_iter().collect();
/// let mut weights = Weights::uniform(&base, 1.0);
/// let incoming: Series = vec![(jan(1950), 2.0), (jan(1951), 3.0), (jan(1952), 4.0)]
///     .into_iter()
///     .collect();
///
/// let counts = combine(&mut base, &mut weights, &incoming, 1.0, 2).unwrap();
/// assert_eq!(counts.total(), 3);
/// // The incoming series runs one degree warm, so it lands on 3.0 for 1952.
/// assert!((base.get(&jan(1952)).unpack() - 3.0).abs() < 1.0e-12);
/// assert_eq!(weights.get(&jan(1950)), 2.0);
/// ```
pub fn combine<'a, W>(
    base: &mut Series,
    base_weight: &mut Weights,
    incoming: &Series,
    incoming_weight: W,
    min_overlap: usize,
) -> Result<MonthCounts>
where
    W: Into<IncomingWeight<'a>>,
{
    if min_overlap == 0 {
        return Err(AnalysisError::ZeroOverlap);
    }
    let incoming_weight = incoming_weight.into();

    let mut counts = MonthCounts::default();
    for month in 0..12 {
        let (sum, overlap) = incoming
            .valid_in_month(month)
            .filter_map(|(k, v)| base.get(&k).into_option().map(|b| b - v))
            .fold((0.0, 0usize), |(sum, n), diff| (sum + diff, n + 1));

        if overlap < min_overlap {
            continue;
        }
        let bias = sum / overlap as f64;

        counts.0[month] = fold_in(
            base,
            base_weight,
            incoming.valid_in_month(month),
            incoming_weight,
            bias,
        );
    }

    Ok(counts)
}

/// Fold every valid month of `incoming` into `base` after adding `bias` to it.
///
/// This is the point-wise half of [`combine`] without the overlap test. It is used where the
/// bias is worked out elsewhere, e.g. from the difference of annual anomalies when merging
/// duplicate station records.
pub fn merge_with_bias<'a, W>(
    base: &mut Series,
    base_weight: &mut Weights,
    incoming: &Series,
    incoming_weight: W,
    bias: f64,
) -> MonthCounts
where
    W: Into<IncomingWeight<'a>>,
{
    let incoming_weight = incoming_weight.into();

    let mut counts = MonthCounts::default();
    for month in 0..12 {
        counts.0[month] = fold_in(
            base,
            base_weight,
            incoming.valid_in_month(month),
            incoming_weight,
            bias,
        );
    }
    counts
}

fn fold_in<I>(
    base: &mut Series,
    base_weight: &mut Weights,
    incoming: I,
    incoming_weight: IncomingWeight,
    bias: f64,
) -> usize
where
    I: Iterator<Item = (MonthKey, f64)>,
{
    let mut merged = 0;
    for (key, val) in incoming {
        let in_wt = incoming_weight.get(&key);
        let base_val = base.get(&key).into_option();
        // A missing base value carries no weight, whatever the weight map says.
        let base_wt = if base_val.is_some() {
            base_weight.get(&key)
        } else {
            0.0
        };

        let new_wt = base_wt + in_wt;
        if new_wt <= 0.0 {
            continue;
        }

        let new_val = (base_wt * base_val.unwrap_or(0.0) + in_wt * (val + bias)) / new_wt;
        base.insert(key, new_val);
        base_weight.set(key, new_wt);
        merged += 1;
    }
    merged
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utility::test_tools::*;

    fn key(year: i32, month: u32) -> MonthKey {
        MonthKey::new(year, month).unwrap()
    }

    fn make(vals: &[(i32, u32, f64)]) -> Series {
        vals.iter().map(|&(y, m, v)| (key(y, m), v)).collect()
    }

    #[test]
    fn test_zero_overlap_is_an_error() {
        let mut base = make(&[(1950, 1, 1.0)]);
        let mut wts = Weights::uniform(&base, 1.0);
        let result = combine(&mut base, &mut wts, &Series::new(), 1.0, 0);
        assert!(matches!(result, Err(AnalysisError::ZeroOverlap)));
    }

    #[test]
    fn test_empty_incoming_is_a_no_op() {
        let mut base = make(&[(1950, 1, 1.0), (1950, 2, 2.0), (1951, 1, 3.0)]);
        let mut wts = Weights::uniform(&base, 0.7);
        let (orig, orig_wts) = (base.clone(), wts.clone());

        for min_overlap in 1..4 {
            let counts = combine(&mut base, &mut wts, &Series::new(), 1.0, min_overlap).unwrap();
            assert!(counts.is_empty());
            assert_eq!(base, orig);
            assert_eq!(wts, orig_wts);
        }
    }

    #[test]
    fn test_disjoint_series_never_merge() {
        let mut base = make(&[(1950, 1, 1.0), (1951, 1, 1.0), (1952, 2, 1.0)]);
        let mut wts = Weights::uniform(&base, 1.0);
        let incoming = make(&[(1953, 1, 5.0), (1954, 1, 5.0), (1952, 3, 5.0)]);

        let counts = combine(&mut base, &mut wts, &incoming, 1.0, 1).unwrap();
        assert_eq!(counts, MonthCounts::default());
        assert_eq!(base.valid_count(), 3);
    }

    #[test]
    fn test_bias_per_calendar_month() {
        // January: base 1.0 in two years, incoming warmer by 0.5 and one year longer.
        // February: only one shared year, below the overlap threshold.
        let mut base = make(&[(1950, 1, 1.0), (1951, 1, 1.0), (1950, 2, 10.0)]);
        let mut wts = Weights::uniform(&base, 1.0);
        let incoming = make(&[
            (1950, 1, 1.5),
            (1951, 1, 1.5),
            (1952, 1, 2.5),
            (1950, 2, 20.0),
            (1951, 2, 20.0),
        ]);

        let counts = combine(&mut base, &mut wts, &incoming, 1.0, 2).unwrap();
        assert_eq!(counts[0], 3);
        assert_eq!(counts[1], 0);
        assert_eq!(counts.total(), 3);

        // bias = -0.5, so the overlap values stay at 1.0 and 1952 becomes 2.0.
        assert!(approx_equal(base.get(&key(1950, 1)).unpack(), 1.0, 1.0e-12));
        assert!(approx_equal(base.get(&key(1951, 1)).unpack(), 1.0, 1.0e-12));
        assert!(approx_equal(base.get(&key(1952, 1)).unpack(), 2.0, 1.0e-12));
        assert_eq!(wts.get(&key(1950, 1)), 2.0);
        assert_eq!(wts.get(&key(1952, 1)), 1.0);

        // February untouched.
        assert_eq!(base.get(&key(1950, 2)).unpack(), 10.0);
        assert!(base.get(&key(1951, 2)).is_none());
        assert_eq!(wts.get(&key(1950, 2)), 1.0);
    }

    #[test]
    fn test_weighted_merge_by_hand() {
        // base weights 2, incoming weight 0.5, bias = mean(3-1, 5-2) = 2.5
        let mut base = make(&[(1950, 6, 3.0), (1951, 6, 5.0)]);
        let mut wts = Weights::uniform(&base, 2.0);
        let incoming = make(&[(1950, 6, 1.0), (1951, 6, 2.0), (1952, 6, 4.0)]);

        combine(&mut base, &mut wts, &incoming, 0.5, 1).unwrap();

        // (2*3 + 0.5*(1+2.5)) / 2.5 = 3.1
        assert!(approx_equal(base.get(&key(1950, 6)).unpack(), 3.1, 1.0e-12));
        // (2*5 + 0.5*(2+2.5)) / 2.5 = 4.9
        assert!(approx_equal(base.get(&key(1951, 6)).unpack(), 4.9, 1.0e-12));
        // (0 + 0.5*(4+2.5)) / 0.5 = 6.5
        assert!(approx_equal(base.get(&key(1952, 6)).unpack(), 6.5, 1.0e-12));
        assert!(approx_equal(wts.get(&key(1950, 6)), 2.5, 1.0e-12));
        assert!(approx_equal(wts.get(&key(1952, 6)), 0.5, 1.0e-12));
    }

    #[test]
    fn test_per_month_weights() {
        let mut base = make(&[(1950, 1, 0.0), (1951, 1, 0.0)]);
        let mut wts = Weights::uniform(&base, 1.0);
        let incoming = make(&[(1950, 1, 1.0), (1951, 1, 1.0), (1952, 1, 1.0)]);
        let mut in_wts = Weights::new();
        in_wts.set(key(1950, 1), 3.0);
        in_wts.set(key(1951, 1), 3.0);
        // 1952 has no weight entry, so it cannot be merged into a month with no base data.

        let counts = combine(&mut base, &mut wts, &incoming, &in_wts, 1).unwrap();
        assert_eq!(counts.total(), 2);
        assert_eq!(wts.get(&key(1950, 1)), 4.0);
        assert!(base.get(&key(1952, 1)).is_none());
    }

    #[test]
    fn test_merge_with_bias() {
        let mut base = make(&[(1950, 1, 1.0)]);
        let mut wts = Weights::uniform(&base, 1.0);
        let incoming = make(&[(1950, 1, 2.0), (1950, 7, 4.0)]);

        let counts = merge_with_bias(&mut base, &mut wts, &incoming, 1.0, -1.0);
        assert_eq!(counts.total(), 2);
        assert!(approx_equal(base.get(&key(1950, 1)).unpack(), 1.0, 1.0e-12));
        assert!(approx_equal(base.get(&key(1950, 7)).unpack(), 3.0, 1.0e-12));
    }
}
