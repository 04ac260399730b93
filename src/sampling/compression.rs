//! Sampling compression strategies
//!
//! A compression strategy rewrites a repository's plan so that sample points
//! known to produce identical results share one search. Two strategies are
//! provided:
//!
//! - [`NoopCompression`]: every sample point stands alone
//! - [`HistoricalCompression`]: adjacent sample points resolving to the same
//!   commit are merged; the earliest keeps the search, the rest share it

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Execution, Plan};
use crate::collaborators::RevisionHistory;
use crate::error::Result;
use crate::history::{CommitResolver, Resolution};
use crate::metrics;
use crate::types::Repo;

/// Rewrites a plan for one repository
#[async_trait]
pub trait CompressionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Compress `plan` for `repo`
    ///
    /// The returned plan keeps the same `sample_times`. Every sample time
    /// appears at most once across all executions; times left out receive
    /// no data for this repository.
    async fn compress(&self, repo: &Repo, plan: Plan) -> Result<Plan>;
}

/// Identity strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCompression;

#[async_trait]
impl CompressionStrategy for NoopCompression {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn compress(&self, _repo: &Repo, plan: Plan) -> Result<Plan> {
        Ok(plan)
    }
}

/// Merges sample points that resolve to the same commit
///
/// Each sample point is resolved once here and the retained execution
/// carries its revision, so the executor does not resolve it again. Points
/// without history are dropped, which means a group never straddles a
/// repository's first commit.
#[derive(Clone)]
pub struct HistoricalCompression {
    resolver: CommitResolver,
}

impl HistoricalCompression {
    /// Create a strategy over a revision history provider
    pub fn new(history: Arc<dyn RevisionHistory>) -> Self {
        Self {
            resolver: CommitResolver::new(history),
        }
    }
}

#[async_trait]
impl CompressionStrategy for HistoricalCompression {
    fn name(&self) -> &'static str {
        "historical"
    }

    async fn compress(&self, repo: &Repo, plan: Plan) -> Result<Plan> {
        let mut times: Vec<_> = plan.executions.iter().flat_map(|e| e.times()).collect();
        times.sort_unstable();
        times.dedup();

        let mut executions: Vec<Execution> = Vec::new();
        for time in times {
            match self.resolver.resolve(repo, time).await? {
                Resolution::NoHistory => {
                    metrics::record_skipped_sample("no_history");
                }
                Resolution::Commit(commit) => {
                    let unchanged = executions
                        .last()
                        .is_some_and(|last| last.revision.as_deref() == Some(commit.id.as_str()));
                    if unchanged {
                        if let Some(last) = executions.last_mut() {
                            last.shared_recordings.push(time);
                        }
                    } else {
                        executions.push(Execution::new(time).with_revision(commit.id));
                    }
                }
            }
        }

        debug!(
            repository = %repo.name,
            before = plan.executions.len(),
            after = executions.len(),
            "Compressed sampling plan"
        );

        Ok(Plan {
            executions,
            sample_times: plan.sample_times,
        })
    }
}
