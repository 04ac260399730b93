//! Historical sampling plans
//!
//! A [`Plan`] lists the [`Execution`]s needed to cover a window of sample
//! points. In the uncompressed form every sample point is its own execution.
//! A [`CompressionStrategy`] may fold later sample points into an earlier
//! execution's `shared_recordings` when nothing relevant changed between
//! them; those points then receive the same counts without a second search.
//!
//! ```text
//!  sample times   t1      t2      t3      t4
//!                  │       │       │       │
//!  uncompressed   [t1]    [t2]    [t3]    [t4]
//!  compressed     [t1 ← t2, t3]           [t4]
//! ```

pub mod compression;
pub mod planner;

pub use compression::{CompressionStrategy, HistoricalCompression, NoopCompression};
pub use planner::{build_sample_times, plan};

use crate::types::SamplePoint;

/// One search to run, plus the sample points that share its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Sample point the search is run for
    pub recording_time: SamplePoint,
    /// Commit already resolved for `recording_time`, if any
    pub revision: Option<String>,
    /// Later sample points receiving the same counts, ascending
    pub shared_recordings: Vec<SamplePoint>,
}

impl Execution {
    /// Standalone execution with no shared recordings
    pub fn new(recording_time: SamplePoint) -> Self {
        Self {
            recording_time,
            revision: None,
            shared_recordings: Vec::new(),
        }
    }

    /// Set the resolved revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Set the shared recordings
    pub fn with_shared(mut self, shared: Vec<SamplePoint>) -> Self {
        self.shared_recordings = shared;
        self
    }

    /// Recording time followed by every shared recording
    pub fn times(&self) -> impl Iterator<Item = SamplePoint> + '_ {
        std::iter::once(self.recording_time).chain(self.shared_recordings.iter().copied())
    }

    /// Make the sample point at `index` of [`Execution::times`] the
    /// recording time; points after it stay shared, points before it are
    /// dropped.
    ///
    /// Returns `None` if `index` is out of range.
    pub fn promote(&self, index: usize, revision: impl Into<String>) -> Option<Execution> {
        let times: Vec<SamplePoint> = self.times().collect();
        let recording_time = *times.get(index)?;
        Some(Execution {
            recording_time,
            revision: Some(revision.into()),
            shared_recordings: times[index + 1..].to_vec(),
        })
    }
}

/// Ordered executions covering a requested window, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Executions, ascending by recording time
    pub executions: Vec<Execution>,
    /// Every sample point of the requested window, ascending
    ///
    /// Kept separately so assembly can zero-fill points that no execution
    /// covers (e.g. points before a repository's first commit).
    pub sample_times: Vec<SamplePoint>,
}

impl Plan {
    /// Uncompressed plan: one standalone execution per sample time
    pub fn uncompressed(sample_times: Vec<SamplePoint>) -> Self {
        Self {
            executions: sample_times.iter().copied().map(Execution::new).collect(),
            sample_times,
        }
    }

    /// Whether the plan covers no sample points
    pub fn is_empty(&self) -> bool {
        self.sample_times.is_empty()
    }

    /// Number of searches this plan requires per repository
    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }
}
