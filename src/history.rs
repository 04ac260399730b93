//! Commit resolution
//!
//! Maps (repository, sample point) to the most recent commit at or before
//! that point. "No history" is a normal outcome: empty repositories and
//! sample points before the first commit simply contribute nothing. Any
//! other provider failure is surfaced with repository context.

use std::sync::Arc;

use tracing::debug;

use crate::collaborators::RevisionHistory;
use crate::error::{HistoryError, InsightsError, Result};
use crate::metrics;
use crate::sampling::Execution;
use crate::types::{Commit, Repo, SamplePoint};

/// Outcome of resolving a sample point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Commit to search at
    Commit(Commit),
    /// Repository has no commit at or before the sample point
    NoHistory,
}

/// Resolves sample points to commits through a [`RevisionHistory`]
#[derive(Clone)]
pub struct CommitResolver {
    history: Arc<dyn RevisionHistory>,
}

impl CommitResolver {
    /// Create a resolver over a revision history provider
    pub fn new(history: Arc<dyn RevisionHistory>) -> Self {
        Self { history }
    }

    /// Most recent commit of `repo` at or before `at`
    pub async fn resolve(&self, repo: &Repo, at: SamplePoint) -> Result<Resolution> {
        match self
            .history
            .most_recent_commit_at_or_before(repo, at.instant())
            .await
        {
            Ok(commit) => Ok(Resolution::Commit(commit)),
            Err(HistoryError::NoHistory) => Ok(Resolution::NoHistory),
            Err(HistoryError::Other(source)) => Err(InsightsError::lookup(
                &repo.name,
                format!("commit at or before {}", at),
                source,
            )),
        }
    }

    /// Resolve the revision an execution should be searched at
    ///
    /// Executions that already carry a revision are returned as-is. If the
    /// recording time has no history, the first shared recording that does
    /// is promoted to recording time; shared recordings before it get no
    /// data. Returns `None` when no point of the execution has history.
    pub async fn resolve_execution(
        &self,
        repo: &Repo,
        execution: Execution,
    ) -> Result<Option<(Execution, String)>> {
        if let Some(revision) = execution.revision.clone() {
            return Ok(Some((execution, revision)));
        }

        let times: Vec<SamplePoint> = execution.times().collect();
        for (index, time) in times.iter().enumerate() {
            match self.resolve(repo, *time).await? {
                Resolution::Commit(commit) => {
                    if index > 0 {
                        debug!(
                            repository = %repo.name,
                            promoted = %time,
                            skipped = index,
                            "Promoted shared recording past missing history"
                        );
                    }
                    let promoted = execution.promote(index, commit.id.clone());
                    return Ok(promoted.map(|e| (e, commit.id)));
                }
                Resolution::NoHistory => {
                    metrics::record_skipped_sample("no_history");
                }
            }
        }

        debug!(
            repository = %repo.name,
            recording_time = %execution.recording_time,
            "No history for execution, skipping"
        );
        Ok(None)
    }
}
