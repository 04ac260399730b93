//! Bounded label aggregation
//!
//! Capture groups over arbitrary file content can produce an effectively
//! unbounded number of distinct values. [`BoundedAggregator`] caps the total
//! count it will hold so memory and output size stay predictable; once the
//! cap is reached further increments are tallied as overflow instead of
//! being stored.
//!
//! # Example
//!
//! ```rust
//! use kuba_insights::aggregation::{AddOutcome, BoundedAggregator};
//!
//! let mut agg = BoundedAggregator::new(5);
//! agg.add("io", 3);
//! assert_eq!(agg.add("fmt", 4), AddOutcome::Clamped { accepted: 2, rejected: 2 });
//!
//! let drained = agg.drain();
//! assert_eq!(drained[0].label, "io");
//! assert_eq!(drained[1].count, 2);
//! ```

use std::collections::HashMap;

use crate::types::GroupedResult;

/// Default capacity used by the search orchestrator
pub const DEFAULT_AGGREGATION_CAPACITY: u64 = 100_000_000;

/// Result of a single [`BoundedAggregator::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The whole increment was recorded
    Accepted,
    /// Only part of the increment fit under the cap
    Clamped {
        /// Amount recorded
        accepted: u64,
        /// Amount tallied as overflow
        rejected: u64,
    },
    /// The aggregator is full; nothing was recorded
    Rejected,
}

/// Label counter whose total never exceeds a fixed capacity
#[derive(Debug, Clone)]
pub struct BoundedAggregator {
    capacity: u64,
    total: u64,
    overflow: u64,
    counts: HashMap<String, u64>,
}

impl BoundedAggregator {
    /// Create an aggregator holding at most `capacity` in total
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            total: 0,
            overflow: 0,
            counts: HashMap::new(),
        }
    }

    /// Add `delta` occurrences of `label`
    ///
    /// Increments that would push the total past capacity are clamped to
    /// the remaining headroom. Counts already recorded are never reduced.
    pub fn add(&mut self, label: &str, delta: u64) -> AddOutcome {
        if delta == 0 {
            return AddOutcome::Accepted;
        }

        let headroom = self.capacity - self.total;
        let accepted = delta.min(headroom);
        let rejected = delta - accepted;
        self.overflow = self.overflow.saturating_add(rejected);

        if accepted == 0 {
            return AddOutcome::Rejected;
        }

        self.total += accepted;
        match self.counts.get_mut(label) {
            Some(count) => *count += accepted,
            None => {
                self.counts.insert(label.to_string(), accepted);
            }
        }

        if rejected == 0 {
            AddOutcome::Accepted
        } else {
            AddOutcome::Clamped { accepted, rejected }
        }
    }

    /// Total count currently held
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Configured capacity
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Total count rejected because the cap was reached
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Number of distinct labels held
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no label has been recorded
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Take every label, count descending then label ascending
    ///
    /// Resets the aggregator to empty; the overflow tally is kept.
    pub fn drain(&mut self) -> Vec<GroupedResult> {
        self.total = 0;
        let mut results: Vec<GroupedResult> = self
            .counts
            .drain()
            .map(|(label, count)| GroupedResult { label, count })
            .collect();
        results.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        results
    }
}

impl Default for BoundedAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_AGGREGATION_CAPACITY)
    }
}
