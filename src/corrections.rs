//! Hand edits to individual station records.
//!
//! Some records have known problems that no automatic step can find, a station moved without a
//! change of identifier or a run of months is obviously corrupt. These edits are listed per
//! record and applied between the stages of station merging.
use crate::{error::Result, record::StationRecord, series::MonthKey};
use log::{debug, info, warn};
use std::collections::HashMap;

/// A single edit to a station record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Add `delta` to every value up to and including `cutoff`. Applied between the two merge
    /// passes.
    OffsetThrough {
        /// Last month that is adjusted.
        cutoff: MonthKey,
        /// Amount added.
        delta: f64,
    },
    /// Add `delta` to every value strictly before `cutoff`. Applied last.
    OffsetBefore {
        /// First month that is left alone.
        cutoff: MonthKey,
        /// Amount added.
        delta: f64,
    },
    /// Delete the years `first` through `last` inclusive.
    DropYears {
        /// First year removed.
        first: i32,
        /// Last year removed.
        last: i32,
    },
    /// Delete a single month.
    DropMonth(MonthKey),
}

impl Correction {
    fn is_piece_adjustment(&self) -> bool {
        matches!(self, Correction::OffsetThrough { .. })
    }

    fn is_deletion(&self) -> bool {
        matches!(self, Correction::DropYears { .. } | Correction::DropMonth(_))
    }

    fn is_discontinuity(&self) -> bool {
        matches!(self, Correction::OffsetBefore { .. })
    }

    /// Apply to a record, `None` if the whole record was deleted.
    fn apply(&self, mut record: StationRecord) -> Option<StationRecord> {
        match *self {
            Correction::OffsetThrough { cutoff, delta } => {
                let mut series = record.take_series();
                series.map_valid(|k, v| if k <= cutoff { v + delta } else { v });
                record.set_series(series);
                info!("{} adjusted by {} through {}", record.uid(), delta, cutoff);
            }
            Correction::OffsetBefore { cutoff, delta } => {
                let mut series = record.take_series();
                series.map_valid(|k, v| if k < cutoff { v + delta } else { v });
                record.set_series(series);
                info!("{} adjusted by {} before {}", record.uid(), delta, cutoff);
            }
            Correction::DropYears { first, last } => {
                if let (Some(rec_first), Some(rec_last)) = (record.first_year(), record.last_year())
                {
                    if first <= rec_first && last >= rec_last {
                        info!("{} dropped entirely", record.uid());
                        return None;
                    }
                }
                let mut series = record.take_series();
                series.retain(|k| k.year() < first || k.year() > last);
                record.set_series(series);
                info!("{} years {} to {} dropped", record.uid(), first, last);
            }
            Correction::DropMonth(key) => {
                if !record.series().is_valid(&key) {
                    warn!("{} has no data for {}, nothing to drop", record.uid(), key);
                }
                let mut series = record.take_series();
                series.remove(&key);
                record.set_series(series);
                debug!("{} month {} dropped", record.uid(), key);
            }
        }

        Some(record)
    }
}

/// Corrections keyed by record uid.
#[derive(Debug, Clone, Default)]
pub struct CorrectionTable {
    corrections: HashMap<String, Vec<Correction>>,
}

impl CorrectionTable {
    /// An empty table.
    #[inline]
    pub fn new() -> Self {
        CorrectionTable::default()
    }

    /// Add a correction for a record. Corrections of the same kind apply in insertion order.
    pub fn insert<S: Into<String>>(&mut self, uid: S, correction: Correction) {
        self.corrections
            .entry(uid.into())
            .or_insert_with(Vec::new)
            .push(correction);
    }

    /// The corrections listed for a record.
    pub fn get(&self, uid: &str) -> &[Correction] {
        self.corrections
            .get(uid)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of records with corrections.
    #[inline]
    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    /// True if there are no corrections.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Apply the [`Correction::OffsetThrough`] edits. Run after combining records and before
    /// combining pieces.
    pub fn adjust_pieces<'t, I>(
        &'t self,
        records: I,
    ) -> impl Iterator<Item = Result<StationRecord>> + 't
    where
        I: IntoIterator<Item = Result<StationRecord>>,
        I::IntoIter: 't,
    {
        records.into_iter().filter_map(move |record| match record {
            Ok(record) => self.apply_matching(record, Correction::is_piece_adjustment).map(Ok),
            Err(err) => Some(Err(err)),
        })
    }

    /// Apply the deletions, then the [`Correction::OffsetBefore`] edits. Run after combining
    /// pieces. Records that are deleted entirely are not passed on.
    pub fn finish<'t, I>(&'t self, records: I) -> impl Iterator<Item = Result<StationRecord>> + 't
    where
        I: IntoIterator<Item = Result<StationRecord>>,
        I::IntoIter: 't,
    {
        records.into_iter().filter_map(move |record| match record {
            Ok(record) => self
                .apply_matching(record, Correction::is_deletion)
                .and_then(|record| self.apply_matching(record, Correction::is_discontinuity))
                .map(Ok),
            Err(err) => Some(Err(err)),
        })
    }

    fn apply_matching<F>(&self, record: StationRecord, selected: F) -> Option<StationRecord>
    where
        F: Fn(&Correction) -> bool,
    {
        let corrections = match self.corrections.get(record.uid()) {
            Some(corrections) => corrections,
            None => return Some(record),
        };

        corrections
            .iter()
            .filter(|c| selected(c))
            .try_fold(record, |record, correction| correction.apply(record))
    }
}
