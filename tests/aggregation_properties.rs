//! Property Tests for Aggregation, Pivoting and Sampling
//!
//! Uses property-based testing (proptest) to check the invariants the
//! executor relies on: the aggregation cap, additivity of the pivot,
//! zero-filled assembly, and strictly increasing sample points.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use kuba_insights::aggregation::BoundedAggregator;
use kuba_insights::sampling::{build_sample_times, Execution, Plan};
use kuba_insights::series::{assemble, SeriesPivot};
use kuba_insights::types::{GroupedResult, Interval, IntervalUnit, SamplePoint};

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Labels drawn from a small alphabet so collisions are common
fn label() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-c]",
        1 => "[a-z]{1,6}",
    ]
}

/// Sequence of (label, increment) additions
fn additions(max_len: usize) -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::vec(
        (
            label(),
            prop_oneof![
                6 => 1u64..5,
                3 => 5u64..1000,
                1 => Just(0u64),
            ],
        ),
        0..max_len,
    )
}

fn interval_unit() -> impl Strategy<Value = IntervalUnit> {
    prop_oneof![
        Just(IntervalUnit::Hour),
        Just(IntervalUnit::Day),
        Just(IntervalUnit::Week),
        Just(IntervalUnit::Month),
        Just(IntervalUnit::Year),
    ]
}

// =============================================================================
// Bounded Aggregator
// =============================================================================

mod bounded_aggregator {
    use super::*;

    proptest! {
        /// Total held never exceeds capacity and nothing is lost
        #[test]
        fn total_bounded_and_conserved(
            capacity in 0u64..2000,
            adds in additions(200)
        ) {
            let mut agg = BoundedAggregator::new(capacity);
            let mut offered = 0u64;
            for (label, delta) in &adds {
                agg.add(label, *delta);
                offered += delta;
                prop_assert!(agg.total() <= capacity);
            }
            prop_assert_eq!(agg.total() + agg.overflow(), offered);

            let drained = agg.drain();
            prop_assert_eq!(drained.iter().map(|r| r.count).sum::<u64>(), offered - agg.overflow());
        }

        /// Drained results are sorted by count descending, then label
        #[test]
        fn drain_is_sorted(adds in additions(200)) {
            let mut agg = BoundedAggregator::new(u64::MAX);
            for (label, delta) in &adds {
                agg.add(label, *delta);
            }
            let drained = agg.drain();
            for pair in drained.windows(2) {
                prop_assert!(
                    pair[0].count > pair[1].count
                        || (pair[0].count == pair[1].count && pair[0].label < pair[1].label)
                );
            }
            prop_assert!(drained.iter().all(|r| r.count > 0));
        }
    }
}

// =============================================================================
// Pivot and Assembly
// =============================================================================

mod pivot {
    use super::*;

    fn hour(h: u32) -> SamplePoint {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap().into()
    }

    proptest! {
        /// Every assembled series covers every sample time, and the sum
        /// per label equals the sum of folded counts
        #[test]
        fn assembly_is_complete_and_additive(
            folds in prop::collection::vec((0u32..6, additions(8)), 0..20)
        ) {
            let sample_times: Vec<SamplePoint> = (0..6).map(hour).collect();
            let plan = Plan::uncompressed(sample_times.clone());

            let mut pivot = SeriesPivot::new();
            let mut expected = std::collections::BTreeMap::<String, u64>::new();
            for (h, adds) in &folds {
                let results: Vec<GroupedResult> = adds
                    .iter()
                    .map(|(label, count)| GroupedResult::new(label.clone(), *count))
                    .collect();
                for r in &results {
                    *expected.entry(r.label.clone()).or_insert(0) += r.count;
                }
                pivot.fold(&Execution::new(hour(*h)), &results);
            }

            let series = assemble(pivot, &plan);
            prop_assert_eq!(series.len(), expected.len());
            for s in &series {
                let times: Vec<SamplePoint> = s.points.iter().map(|p| p.time).collect();
                prop_assert_eq!(&times, &sample_times);
                let total: u64 = s.points.iter().map(|p| p.count).sum();
                prop_assert_eq!(Some(&total), expected.get(&s.label));
            }
        }
    }
}

// =============================================================================
// Sample Planning
// =============================================================================

mod sampling {
    use super::*;

    proptest! {
        /// Sample points are strictly increasing and precede the reference
        #[test]
        fn sample_times_strictly_increasing(
            bucket_count in 0i64..60,
            unit in interval_unit(),
            value in 1u32..4,
            day in 1u32..29,
            month in 1u32..13
        ) {
            let reference = Utc.with_ymd_and_hms(2024, month, day, 6, 0, 0).unwrap();
            let times = build_sample_times(bucket_count, Interval::new(unit, value), reference);

            prop_assert_eq!(times.len() as i64, bucket_count);
            for pair in times.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            if let Some(last) = times.last() {
                prop_assert!(last.instant() < reference);
            }
        }
    }
}
