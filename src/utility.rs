//! Small numeric helpers shared by the pipeline stages.
use optional::Optioned;

/// Mean of the valid items in `values`. If there are fewer than `min` valid items the mean is
/// missing.
///
/// # Examples
///
/// ```rust
/// use temperature_analysis::utility::valid_mean;
/// use optional::{none, some};
///
/// assert_eq!(valid_mean(vec![some(1.0), none(), some(2.0)], 2).unpack(), 1.5);
/// assert!(valid_mean(vec![some(1.0), none(), none()], 2).is_none());
/// ```
pub fn valid_mean<I>(values: I, min: usize) -> Optioned<f64>
where
    I: IntoIterator<Item = Optioned<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .filter_map(|v| v.into_option())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count >= min && count > 0 {
        Optioned::from(sum / count as f64)
    } else {
        Optioned::default()
    }
}

/// Arithmetic mean, `None` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation, `None` for an empty slice.
///
/// Uses the two pass method so the argument to the square root is never negative.
pub fn sigma(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
    Some((sum_sq / values.len() as f64).sqrt())
}

/// Indexes of `lengths` ordered from the longest to the shortest.
///
/// The sort is stable, so equal lengths keep their original relative order.
pub fn longest_first(lengths: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by(|&a, &b| lengths[b].cmp(&lengths[a]));
    order
}
