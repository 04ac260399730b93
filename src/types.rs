//! Core data types used throughout insight computation
//!
//! # Key Types
//!
//! - **`SamplePoint`**: One historical instant at which a search is executed
//! - **`Interval`**: Step between sample points (unit + multiplier)
//! - **`Window`**: Number of buckets and the interval between them
//! - **`Repo`** / **`Commit`**: Repository identity and resolved revision
//! - **`GroupedResult`**: One label's count from a single search
//! - **`GeneratedSeries`**: Final per-label, zero-filled time series
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use kuba_insights::types::{Interval, IntervalUnit, SamplePoint};
//!
//! let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
//! let interval = Interval::new(IntervalUnit::Month, 1);
//! let previous = interval.step_back(now).unwrap();
//! assert_eq!(SamplePoint::from(previous).to_string(), "2024-02-29T00:00:00Z");
//! ```

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An instant at which the search is replayed against history
///
/// Sample points are totally ordered and strictly increasing within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplePoint(pub DateTime<Utc>);

impl SamplePoint {
    /// Underlying UTC instant
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for SamplePoint {
    fn from(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }
}

impl fmt::Display for SamplePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Calendar unit of a sampling interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    /// Hours
    Hour,
    /// Days
    Day,
    /// Weeks (7 days)
    Week,
    /// Calendar months; day-of-month clamps to the month's last day
    Month,
    /// Calendar years
    Year,
}

/// Distance between two adjacent sample points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Calendar unit
    pub unit: IntervalUnit,
    /// Number of units per step
    pub value: u32,
}

impl Interval {
    /// Create a new interval
    pub fn new(unit: IntervalUnit, value: u32) -> Self {
        Self { unit, value }
    }

    /// Step one interval back from `from`
    ///
    /// Returns `None` on calendar overflow.
    pub fn step_back(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let value = i64::from(self.value);
        match self.unit {
            IntervalUnit::Hour => from.checked_sub_signed(Duration::hours(value)),
            IntervalUnit::Day => from.checked_sub_signed(Duration::days(value)),
            IntervalUnit::Week => from.checked_sub_signed(Duration::weeks(value)),
            IntervalUnit::Month => from.checked_sub_months(Months::new(self.value)),
            IntervalUnit::Year => self
                .value
                .checked_mul(12)
                .and_then(|months| from.checked_sub_months(Months::new(months))),
        }
    }
}

/// Requested sampling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Number of sample points; zero or negative yields no points
    pub bucket_count: i64,
    /// Step between sample points
    pub interval: Interval,
}

impl Window {
    /// Create a new window
    pub fn new(bucket_count: i64, interval: Interval) -> Self {
        Self {
            bucket_count,
            interval,
        }
    }
}

/// Numeric repository identifier assigned by the repository directory
pub type RepoId = i64;

/// A repository known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    /// Directory identifier
    pub id: RepoId,
    /// Fully qualified name, e.g. `github.com/acme/api`
    pub name: String,
}

impl Repo {
    /// Create a new repository handle
    pub fn new(id: RepoId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A commit resolved from revision history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit hash
    pub id: String,
    /// Committer date
    pub committed_at: DateTime<Utc>,
}

impl Commit {
    /// Create a new commit
    pub fn new(id: impl Into<String>, committed_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            committed_at,
        }
    }
}

/// One label's occurrence count from a single search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedResult {
    /// Captured value
    pub label: String,
    /// Number of occurrences
    pub count: u64,
}

impl GroupedResult {
    /// Create a new grouped result
    pub fn new(label: impl Into<String>, count: u64) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// A single (time, count) point of a generated series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDataPoint {
    /// Sample point
    pub time: SamplePoint,
    /// Count at that sample point (zero-filled when unobserved)
    pub count: u64,
}

/// A named time series for one captured label
///
/// Points are strictly ascending by time with exactly one point per sample
/// point of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSeries {
    /// Captured value this series counts
    pub label: String,
    /// Identifier unique within one invocation
    pub series_id: String,
    /// Zero-filled points, ascending by time
    pub points: Vec<TimeDataPoint>,
}
