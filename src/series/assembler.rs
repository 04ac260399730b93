//! Series assembly
//!
//! Turns the pivot into one [`GeneratedSeries`] per label, sorted by label,
//! with exactly one point per sample time of the plan.

use crate::sampling::Plan;
use crate::types::{GeneratedSeries, TimeDataPoint};

use super::SeriesPivot;

/// Prefix of generated series identifiers
pub const SERIES_ID_PREFIX: &str = "dynamic-series";

/// Build zero-filled series for every label in `pivot`
///
/// Series are ordered by label and numbered from 1 in that order.
pub fn assemble(pivot: SeriesPivot, plan: &Plan) -> Vec<GeneratedSeries> {
    pivot
        .into_sorted()
        .into_iter()
        .enumerate()
        .map(|(index, (label, counts))| {
            let points = plan
                .sample_times
                .iter()
                .map(|time| TimeDataPoint {
                    time: *time,
                    count: counts.get(time).copied().unwrap_or(0),
                })
                .collect();

            GeneratedSeries {
                label,
                series_id: format!("{}-{}", SERIES_ID_PREFIX, index + 1),
                points,
            }
        })
        .collect()
}
