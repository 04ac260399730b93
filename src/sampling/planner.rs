//! Sample planner
//!
//! Walks backward from a reference instant one interval at a time and
//! returns the resulting sample points oldest first.

use chrono::{DateTime, Utc};

use super::Plan;
use crate::types::{Interval, SamplePoint};

/// Upper bound on up-front allocation; larger windows grow as they step
const MAX_PREALLOCATED_POINTS: i64 = 1024;

/// Build `bucket_count` sample times ending one interval before `reference`
///
/// Points are `reference - k * interval` for `k = bucket_count..=1`, each
/// produced by stepping back from the previous one, so calendar units clamp
/// progressively (Mar 31 → Feb 29 → Jan 29). Stepping stops early on
/// calendar overflow. A non-positive `bucket_count` yields no points.
pub fn build_sample_times(
    bucket_count: i64,
    interval: Interval,
    reference: DateTime<Utc>,
) -> Vec<SamplePoint> {
    if bucket_count <= 0 {
        return Vec::new();
    }

    let mut times = Vec::with_capacity(bucket_count.min(MAX_PREALLOCATED_POINTS) as usize);
    let mut current = reference;
    for _ in 0..bucket_count {
        match interval.step_back(current) {
            Some(previous) if previous < current => {
                times.push(SamplePoint(previous));
                current = previous;
            }
            _ => break,
        }
    }

    times.reverse();
    times
}

/// Uncompressed plan for a window ending at `reference`
pub fn plan(bucket_count: i64, interval: Interval, reference: DateTime<Utc>) -> Plan {
    Plan::uncompressed(build_sample_times(bucket_count, interval, reference))
}
