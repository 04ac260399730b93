//! Pivot from (sample point → label → count) to (label → sample point → count)
//!
//! Results arrive one (repository, execution) at a time. Counts for the
//! same label and sample point are summed across repositories, and each
//! count is replicated onto the execution's shared recordings.

use std::collections::{BTreeMap, HashMap};

use crate::sampling::Execution;
use crate::types::{GroupedResult, SamplePoint};

/// Sparse label-keyed counts; absent points are filled at assembly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesPivot {
    by_label: HashMap<String, BTreeMap<SamplePoint, u64>>,
}

impl SeriesPivot {
    /// Create an empty pivot
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one execution's results into the pivot
    ///
    /// Must be called exactly once per (repository, execution) pair; the
    /// order of calls does not matter.
    pub fn fold(&mut self, execution: &Execution, results: &[GroupedResult]) {
        for result in results {
            let times = self.by_label.entry(result.label.clone()).or_default();
            for time in execution.times() {
                *times.entry(time).or_insert(0) += result.count;
            }
        }
    }

    /// Recorded count for `label` at `time`, if any
    pub fn get(&self, label: &str, time: SamplePoint) -> Option<u64> {
        self.by_label.get(label)?.get(&time).copied()
    }

    /// Number of distinct labels
    pub fn label_count(&self) -> usize {
        self.by_label.len()
    }

    /// Whether nothing has been folded in
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Labels with their sparse counts, sorted by label
    pub fn into_sorted(self) -> Vec<(String, BTreeMap<SamplePoint, u64>)> {
        let mut entries: Vec<_> = self.by_label.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
