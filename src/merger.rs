//! Combining the duplicate records of a station into as few records as possible.
//!
//! There are two passes, both run over records grouped by station. The first pass combines
//! records that overlap well, offsetting each by the mean difference of annual anomalies over
//! the overlap. The second pass takes what the first could not combine, pieces with short or no
//! overlap, and adds a piece if its mean annual value near the middle of the combined span is
//! within one standard deviation of the combined record's.
//!
//! Neither pass ever fails for lack of data, a record that cannot be combined is passed through
//! on its own.
use crate::{
    anomaly::annual_and_seasonal,
    combine::merge_with_bias,
    config::Parameters,
    error::{AnalysisError, Result},
    record::{SourceTable, StationRecord},
    series::{Series, Weights},
    utility::{mean, sigma},
};
use log::debug;
use std::{
    cmp::{max, min, Ordering},
    collections::{HashSet, VecDeque},
    iter::Peekable,
};

/// Merges duplicate station records.
#[derive(Debug, Clone)]
pub struct StationMerger {
    sources: SourceTable,
    min_overlap: usize,
    bucket_radius: i32,
    min_mid_years: usize,
}

impl StationMerger {
    /// Create a new merger. `sources` is consulted for the data source of every record.
    pub fn new(params: &Parameters, sources: SourceTable) -> Self {
        StationMerger {
            sources,
            min_overlap: params.station_combine_min_overlap,
            bucket_radius: params.station_combine_bucket_radius,
            min_mid_years: params.station_combine_min_mid_years,
        }
    }

    /// Combine records of the same station that overlap by at least the configured number of
    /// years.
    ///
    /// The input must have all records of a station next to each other. The stream stops after
    /// yielding an `UngroupedStation` error if a station shows up again later.
    pub fn combine_records<I>(&self, records: I) -> MergeStream<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Result<StationRecord>>,
    {
        MergeStream::new(self, records.into_iter(), Pass::Records)
    }

    /// Try to combine the remaining records of each station, which overlap too little for
    /// [`combine_records`](StationMerger::combine_records), by comparing their climatology.
    pub fn combine_pieces<I>(&self, records: I) -> MergeStream<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Result<StationRecord>>,
    {
        MergeStream::new(self, records.into_iter(), Pass::Pieces)
    }

    /// Both passes, one after the other.
    pub fn merge<'m, I>(&'m self, records: I) -> impl Iterator<Item = Result<StationRecord>> + 'm
    where
        I: IntoIterator<Item = StationRecord>,
        I::IntoIter: 'm,
    {
        self.combine_pieces(self.combine_records(records.into_iter().map(Ok)))
    }

    fn combine_group(&self, mut records: Vec<StationRecord>) -> Vec<StationRecord> {
        let mut combined = Vec::with_capacity(records.len());

        while !records.is_empty() {
            if records.len() == 1 {
                combined.append(&mut records);
                break;
            }

            let mut record = records.remove(self.best_index(&records));
            debug!("{}", record.station_id());
            debug!("\t{}", record);

            let (mut series, mut weights) = fresh_series(&record);
            while !records.is_empty() {
                let overlap = match longest_overlap(&series, &records) {
                    Some(overlap) if overlap.years >= self.min_overlap => overlap,
                    _ => {
                        debug!("\tno other records okay");
                        break;
                    }
                };

                let other = records.remove(overlap.index);
                let diff = overlap.diff.unwrap_or(0.0);
                merge_with_bias(&mut series, &mut weights, other.series(), 1.0, -diff);
                debug!("\t {} {}", other, diff);
            }

            record.set_series(series);
            combined.push(record);
        }

        combined
    }

    fn pieces_group(&self, mut records: Vec<StationRecord>) -> Vec<StationRecord> {
        let mut combined = Vec::with_capacity(records.len());

        while !records.is_empty() {
            if records.len() == 1 {
                combined.append(&mut records);
                break;
            }

            let mut record = records.remove(longest_index(&records));
            debug!("{}", record.station_id());
            debug!("\t{}", record);

            let (mut series, mut weights) = fresh_series(&record);
            while !records.is_empty() {
                let index = match longest_overlap(&series, &records) {
                    Some(overlap) => overlap.index,
                    None => break,
                };
                debug!("\t {}", records[index]);

                if self.pieces_agree(&series, &weights, &records[index], record.uid()) {
                    let other = records.remove(index);
                    merge_with_bias(&mut series, &mut weights, other.series(), 1.0, 0.0);
                } else {
                    debug!("\t***no other pieces okay***");
                    break;
                }
            }

            record.set_series(series);
            combined.push(record);
        }

        combined
    }

    /// Whether a candidate piece agrees with the combined record well enough to be added.
    ///
    /// Windows of growing radius around the middle of the shared span are tried until both
    /// records have enough valid years in one. The piece is accepted if the difference of their
    /// mean annual values over that window is less than the standard deviation of the combined
    /// record's annual anomalies.
    fn pieces_agree(
        &self,
        series: &Series,
        weights: &Weights,
        piece: &StationRecord,
        new_id: &str,
    ) -> bool {
        let log_id = format!("{} {}", new_id, piece.uid());

        let (rec_begin, rec_end) = match (piece.first_year(), piece.last_year()) {
            (Some(begin), Some(end)) => (begin, end),
            _ => return false,
        };
        let (actual_begin, actual_end) = match weights.year_span() {
            Some(span) => span,
            None => return false,
        };

        let max_begin = max(actual_begin, rec_begin);
        let min_end = min(actual_end, rec_end);
        // Rounds fractional middle years up.
        let middle_year = (0.5 * f64::from(max_begin + min_end) + 0.5).floor() as i32;
        debug!("max begin: {}\tmin end: {}", max_begin, min_end);

        let combined = annual_and_seasonal(series);
        let anoms: Vec<f64> = combined.anomalies.values().copied().collect();
        let std_dev = match sigma(&anoms) {
            Some(std_dev) => std_dev,
            None => return false,
        };
        debug!("ann_std_dev = {}", std_dev);

        let piece_annual = &piece.summary().annual;
        let (new_mean, rec_mean) = match (
            combined.mean.into_option(),
            piece_annual.mean.into_option(),
        ) {
            (Some(new_mean), Some(rec_mean)) => (new_mean, rec_mean),
            _ => return false,
        };

        for rad in 1..=self.bucket_radius {
            let window = (middle_year - rad)..=(middle_year + rad);
            let new_middle: Vec<f64> = combined
                .anomalies
                .range(window.clone())
                .map(|(_, anom)| anom + new_mean)
                .collect();
            let rec_middle: Vec<f64> = piece_annual
                .anomalies
                .range(window)
                .map(|(_, anom)| anom + rec_mean)
                .collect();

            if new_middle.len() >= self.min_mid_years && rec_middle.len() >= self.min_mid_years {
                debug!("overlap success: {}", log_id);
                let (avg1, avg2) = match (mean(&new_middle), mean(&rec_middle)) {
                    (Some(avg1), Some(avg2)) => (avg1, avg2),
                    _ => return false,
                };
                let diff = (avg1 - avg2).abs();
                debug!("diff = {}", diff);

                let okay = diff < std_dev;
                if okay {
                    debug!("combination success: {}", log_id);
                } else {
                    debug!("combination failure: {}", log_id);
                }
                return okay;
            }
        }

        debug!("overlap failure: {}", log_id);
        false
    }

    /// The record to seed a combination with: best source, then most valid annual anomalies,
    /// then the smallest uid.
    fn best_index(&self, records: &[StationRecord]) -> usize {
        records
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                self.sources
                    .rank(a)
                    .cmp(&self.sources.rank(b))
                    .then(a.annual_good_count().cmp(&b.annual_good_count()))
                    .then(b.uid().cmp(a.uid()))
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// The record with the most valid annual anomalies, ties go to the smallest uid.
fn longest_index(records: &[StationRecord]) -> usize {
    records
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.annual_good_count()
                .cmp(&b.annual_good_count())
                .then(b.uid().cmp(a.uid()))
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn fresh_series(record: &StationRecord) -> (Series, Weights) {
    let series = record.series().clone();
    let weights = Weights::uniform(&series, 1.0);
    (series, weights)
}

struct Overlap {
    // Position in the candidate list.
    index: usize,
    // Mean difference of annual values, positive when the candidate is warmer.
    diff: Option<f64>,
    // Number of years with annual anomalies in both.
    years: usize,
}

/// Find the record sharing the most years of annual anomalies with `target`, ties go to the
/// smallest uid. Some record is returned even if nothing overlaps.
fn longest_overlap(target: &Series, records: &[StationRecord]) -> Option<Overlap> {
    let target = annual_and_seasonal(target);

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[a].uid().cmp(records[b].uid()));

    let mut best: Option<Overlap> = None;
    for index in order {
        let record = &records[index];
        let annual = &record.summary().annual;

        let common: Vec<(f64, f64)> = annual
            .anomalies
            .iter()
            .filter_map(|(year, anom)| target.anomalies.get(year).map(|t| (*anom, *t)))
            .collect();

        if let Some(ref b) = best {
            if common.len().cmp(&b.years) != Ordering::Greater {
                continue;
            }
        }

        let diff = match (annual.mean.into_option(), target.mean.into_option()) {
            (Some(rec_mean), Some(mean)) if !common.is_empty() => {
                let total: f64 = common
                    .iter()
                    .map(|(rec_anom, anom)| (rec_mean + rec_anom) - (mean + anom))
                    .sum();
                Some(total / common.len() as f64)
            }
            _ => None,
        };

        best = Some(Overlap {
            index,
            diff,
            years: common.len(),
        });
    }

    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Records,
    Pieces,
}

/// Iterator over merged station records, produced by
/// [`StationMerger::combine_records`] and [`StationMerger::combine_pieces`].
///
/// Records are pulled from the input one station at a time, so this only ever holds the
/// records of a single station.
pub struct MergeStream<'m, I>
where
    I: Iterator<Item = Result<StationRecord>>,
{
    merger: &'m StationMerger,
    groups: StationGroups<I>,
    pending: VecDeque<StationRecord>,
    pass: Pass,
}

impl<'m, I> MergeStream<'m, I>
where
    I: Iterator<Item = Result<StationRecord>>,
{
    fn new(merger: &'m StationMerger, records: I, pass: Pass) -> Self {
        MergeStream {
            merger,
            groups: StationGroups::new(records),
            pending: VecDeque::new(),
            pass,
        }
    }
}

impl<'m, I> Iterator for MergeStream<'m, I>
where
    I: Iterator<Item = Result<StationRecord>>,
{
    type Item = Result<StationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }

            let group = match self.groups.next()? {
                Ok(group) => group,
                Err(err) => return Some(Err(err)),
            };

            let merged = match self.pass {
                Pass::Records => self.merger.combine_group(group),
                Pass::Pieces => self.merger.pieces_group(group),
            };
            self.pending.extend(merged);
        }
    }
}

/// Groups consecutive records of the same station.
struct StationGroups<I>
where
    I: Iterator<Item = Result<StationRecord>>,
{
    inner: Peekable<I>,
    seen: HashSet<String>,
    done: bool,
}

impl<I> StationGroups<I>
where
    I: Iterator<Item = Result<StationRecord>>,
{
    fn new(inner: I) -> Self {
        StationGroups {
            inner: inner.peekable(),
            seen: HashSet::new(),
            done: false,
        }
    }
}

impl<I> Iterator for StationGroups<I>
where
    I: Iterator<Item = Result<StationRecord>>,
{
    type Item = Result<Vec<StationRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first = match self.inner.next()? {
            Ok(record) => record,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let id = first.station_id().to_owned();
        if !self.seen.insert(id.clone()) {
            self.done = true;
            return Some(Err(AnalysisError::UngroupedStation(id)));
        }

        let mut group = vec![first];
        while let Some(Ok(next)) = self.inner.peek() {
            if next.station_id() != id {
                break;
            }
            if let Some(Ok(record)) = self.inner.next() {
                group.push(record);
            }
        }

        Some(Ok(group))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        keys::SourceRank,
        series::MonthKey,
        test_data::{station_record, synthetic_value},
        utility::test_tools::*,
    };

    fn merger() -> StationMerger {
        StationMerger::new(&Parameters::default(), SourceTable::new())
    }

    fn run(merger: &StationMerger, records: Vec<StationRecord>) -> Vec<StationRecord> {
        merger
            .combine_records(records.into_iter().map(Ok))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_single_record_passes_through() {
        let rec = station_record("10160355000", 0, 1950, 1960, 0.0);
        let out = run(&merger(), vec![rec.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].uid(), rec.uid());
        assert_eq!(out[0].series(), rec.series());
    }

    #[test]
    fn test_overlapping_duplicates_combine() {
        // The same climate, the second copy runs 1 degree warm and extends the record. It spans
        // whole cycles of the year to year variation, so the bias comes out at exactly 1.
        let a = station_record("10160355000", 0, 1950, 1970, 0.0);
        let b = station_record("10160355000", 1, 1960, 1979, 1.0);

        let out = run(&merger(), vec![a, b]);
        assert_eq!(out.len(), 1);
        let rec = &out[0];
        assert_eq!(rec.first_year(), Some(1950));
        assert_eq!(rec.last_year(), Some(1979));

        // The warm offset is removed before averaging, so 1975 matches the cool record.
        let key = MonthKey::new(1975, 7).unwrap();
        let expected = synthetic_value(key, 0.0);
        assert!(approx_equal(rec.series().get(&key).unpack(), expected, 1.0e-9));
    }

    #[test]
    fn test_best_source_seeds() {
        let a = station_record("10160355000", 0, 1950, 1960, 0.0);
        let b = station_record("10160355000", 1, 1990, 2000, 0.0);

        let mut sources = SourceTable::new();
        sources.insert(b.uid().to_owned(), SourceRank::Mcdw);
        let merger = StationMerger::new(&Parameters::default(), sources);

        // No overlap, so both come out on their own with the MCDW record first.
        let out = run(&merger, vec![a.clone(), b.clone()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].uid(), b.uid());
        assert_eq!(out[1].uid(), a.uid());
    }

    #[test]
    fn test_short_overlap_is_left_alone() {
        let a = station_record("10160355000", 0, 1950, 1960, 0.0);
        // Three years of overlap, one short of the minimum.
        let b = station_record("10160355000", 1, 1958, 1975, 0.0);

        let out = run(&merger(), vec![a, b]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_groups_must_be_contiguous() {
        let a = station_record("10160355000", 0, 1950, 1960, 0.0);
        let b = station_record("20160355000", 0, 1950, 1960, 0.0);
        let c = station_record("10160355000", 1, 1950, 1960, 0.0);

        let results: Vec<Result<StationRecord>> = merger()
            .combine_records(vec![a, b, c].into_iter().map(Ok))
            .collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(AnalysisError::UngroupedStation(ref id)) if id == "10160355000"
        ));
    }

    #[test]
    fn test_pieces_with_consistent_climate_combine() {
        // Two pieces of the same station that overlap by only two years.
        let a = station_record("10160355000", 0, 1950, 1971, 0.0);
        let b = station_record("10160355000", 1, 1970, 1990, 0.0);

        let m = merger();
        let first_pass = run(&m, vec![a, b]);
        assert_eq!(first_pass.len(), 2);

        let out: Vec<StationRecord> = m
            .combine_pieces(first_pass.into_iter().map(Ok))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first_year(), Some(1950));
        assert_eq!(out[0].last_year(), Some(1990));
    }

    #[test]
    fn test_pieces_with_different_climate_stay_apart() {
        let a = station_record("10160355000", 0, 1950, 1971, 0.0);
        let b = station_record("10160355000", 1, 1970, 1990, 5.0);

        let out: Vec<StationRecord> = merger()
            .merge(vec![a, b])
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    fn merge_all(merger: &StationMerger, records: Vec<StationRecord>) -> Vec<StationRecord> {
        merger.merge(records).collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_pieces_too_far_apart_stay_apart() {
        // Same climate, but the shared span is empty and its middle is 1940. Within 10 years of
        // that the early piece only has 1930 and the late piece only 1950.
        let a = station_record("10160355000", 0, 1900, 1930, 0.0);
        let b = station_record("10160355000", 1, 1950, 1975, 0.0);

        let out = merge_all(&merger(), vec![a.clone(), b.clone()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].uid(), a.uid());
        assert_eq!(out[0].last_year(), Some(1930));

        // A wider window finds six years on each side and the pieces agree.
        let params = Parameters {
            station_combine_bucket_radius: 15,
            ..Parameters::default()
        };
        let out = merge_all(&StationMerger::new(&params, SourceTable::new()), vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first_year(), Some(1900));
        assert_eq!(out[0].last_year(), Some(1975));
    }

    #[test]
    fn test_rejected_piece_ends_the_combination() {
        // The late piece shares the most years with the seed but runs far too warm. The early
        // piece would fit, but once a piece is turned down nothing more is added to the seed.
        let a = station_record("10160355000", 0, 1950, 1975, 0.0);
        let warm = station_record("10160355000", 1, 1973, 1990, 5.0);
        let early = station_record("10160355000", 2, 1930, 1951, 0.0);

        let out = merge_all(&merger(), vec![a.clone(), warm.clone(), early.clone()]);
        assert_eq!(out.len(), 3);
        let seed = out.iter().find(|rec| rec.uid() == a.uid()).unwrap();
        assert_eq!(seed.first_year(), Some(1950));
        assert_eq!(seed.last_year(), Some(1975));

        // Without the warm piece the early one is added.
        let out = merge_all(&merger(), vec![a.clone(), early]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].uid(), a.uid());
        assert_eq!(out[0].first_year(), Some(1930));
    }
}
