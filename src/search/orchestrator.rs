//! Search orchestration for one (repository, revision) pair
//!
//! Builds the scoped query, runs it against the streaming search service
//! under a hard deadline, and drives every match through a counting
//! strategy into a fresh [`BoundedAggregator`].
//!
//! Failure classification:
//!
//! | Condition                               | Outcome            |
//! |-----------------------------------------|--------------------|
//! | query build failure                     | `InvalidInput`     |
//! | caller deadline or backend timeout      | `DeadlineExceeded` |
//! | backend error, alert, or stream failure | `Search`           |
//! | no matches                              | `Ok(vec![])`       |

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::debug;

use crate::aggregation::{BoundedAggregator, CountingStrategy};
use crate::collaborators::{QueryBuilder, QueryDefaults, SearchEvent, SearchService, SearchStream};
use crate::error::{InsightsError, Result};
use crate::metrics;
use crate::types::{GroupedResult, SamplePoint};

/// Extra time given to the backend's own timeout so the caller's deadline
/// always fires first
const BACKEND_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Runs scoped searches and aggregates their matches
pub struct SearchOrchestrator {
    query_builder: Arc<dyn QueryBuilder>,
    search: Arc<dyn SearchService>,
    defaults: QueryDefaults,
    aggregation_capacity: u64,
}

impl SearchOrchestrator {
    /// Create an orchestrator
    pub fn new(
        query_builder: Arc<dyn QueryBuilder>,
        search: Arc<dyn SearchService>,
        defaults: QueryDefaults,
        aggregation_capacity: u64,
    ) -> Self {
        Self {
            query_builder,
            search,
            defaults,
            aggregation_capacity,
        }
    }

    /// Search `query` in `repository` at `revision` and count matches
    ///
    /// `deadline` bounds the whole call, including query building and
    /// stream consumption.
    pub async fn run(
        &self,
        repository: &str,
        revision: &str,
        sample_time: SamplePoint,
        query: &str,
        counting: &dyn CountingStrategy,
        deadline: Instant,
    ) -> Result<Vec<GroupedResult>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(deadline_exceeded(repository, revision, sample_time));
        }

        let defaults = self
            .defaults
            .clone()
            .with_timeout(remaining + BACKEND_TIMEOUT_SLACK);
        let scoped = self
            .query_builder
            .scope_query(query, repository, revision, &defaults)
            .map_err(|e| {
                InsightsError::InvalidInput(format!(
                    "cannot scope query to repository {}: {}",
                    repository, e
                ))
            })?;

        debug!(repository, revision, query = %scoped, "Executing scoped search");

        let start = std::time::Instant::now();
        let outcome = tokio::time::timeout_at(
            deadline,
            self.collect(&scoped, deadline, counting, repository, revision, sample_time),
        )
        .await
        .unwrap_or_else(|_| Err(deadline_exceeded(repository, revision, sample_time)));

        let status = match &outcome {
            Ok(_) => "success",
            Err(InsightsError::DeadlineExceeded { .. }) => "timeout",
            Err(_) => "error",
        };
        metrics::record_search(start.elapsed().as_secs_f64(), status);
        let mut aggregator = outcome?;

        if aggregator.overflow() > 0 {
            debug!(
                repository,
                revision,
                overflow = aggregator.overflow(),
                capacity = aggregator.capacity(),
                "Aggregator reached capacity"
            );
            metrics::record_aggregator_overflow(aggregator.overflow());
        }

        let results = aggregator.drain();
        debug!(repository, revision, labels = results.len(), "Search complete");
        Ok(results)
    }

    async fn collect(
        &self,
        scoped: &str,
        deadline: Instant,
        counting: &dyn CountingStrategy,
        repository: &str,
        revision: &str,
        sample_time: SamplePoint,
    ) -> Result<BoundedAggregator> {
        let search_error = |message: String| InsightsError::Search {
            repository: repository.to_string(),
            revision: revision.to_string(),
            sample_time,
            message,
        };

        let mut stream: SearchStream = self
            .search
            .search(scoped, deadline)
            .await
            .map_err(|e| search_error(e.to_string()))?;

        let mut aggregator = BoundedAggregator::new(self.aggregation_capacity);
        while let Some(event) = stream.next().await {
            match event.map_err(|e| search_error(e.to_string()))? {
                SearchEvent::Match(m) => {
                    for (label, increment) in counting.count(&m) {
                        aggregator.add(&label, increment);
                    }
                }
                SearchEvent::Alert { title, description } => {
                    return Err(search_error(format!("alert: {}: {}", title, description)));
                }
                SearchEvent::Error { message } => {
                    return Err(search_error(format!("error: {}", message)));
                }
                SearchEvent::Timeout => {
                    return Err(deadline_exceeded(repository, revision, sample_time));
                }
            }
        }

        Ok(aggregator)
    }
}

fn deadline_exceeded(repository: &str, revision: &str, sample_time: SamplePoint) -> InsightsError {
    InsightsError::DeadlineExceeded {
        repository: repository.to_string(),
        revision: revision.to_string(),
        sample_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::CaptureGroupCounter;
    use crate::collaborators::memory::{InMemorySearchService, ScopedQueryBuilder};
    use crate::collaborators::SearchMatch;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};

    fn matched(content: &str) -> SearchEvent {
        SearchEvent::Match(SearchMatch {
            repository: "a".to_string(),
            path: "main.go".to_string(),
            content: content.to_string(),
            match_count: 1,
        })
    }

    fn orchestrator(search: Arc<InMemorySearchService>, capacity: u64) -> SearchOrchestrator {
        SearchOrchestrator::new(
            Arc::new(ScopedQueryBuilder),
            search,
            QueryDefaults::default(),
            capacity,
        )
    }

    fn counter() -> CaptureGroupCounter {
        CaptureGroupCounter::new(r"level=(\w+)", true).unwrap()
    }

    fn at() -> SamplePoint {
        SamplePoint(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
    }

    fn in_a_minute() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_counts_capture_groups_sorted() {
        let search = Arc::new(InMemorySearchService::new());
        search.respond(
            "c1",
            vec![
                matched("level=info"),
                matched("level=warn level=info"),
                matched("level=debug"),
            ],
        );

        let results = orchestrator(search.clone(), 1_000)
            .run("a", "c1", at(), r"level=(\w+)", &counter(), in_a_minute())
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                GroupedResult::new("info", 2),
                GroupedResult::new("debug", 1),
                GroupedResult::new("warn", 1),
            ]
        );
        assert_eq!(search.queries().len(), 1);
        assert!(search.queries()[0].contains("timeout:"));
    }

    #[tokio::test]
    async fn test_zero_matches_is_empty_success() {
        let search = Arc::new(InMemorySearchService::new());
        let results = orchestrator(search, 1_000)
            .run("a", "nothing", at(), r"level=(\w+)", &counter(), in_a_minute())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_alert_is_fatal() {
        let search = Arc::new(InMemorySearchService::new());
        search.respond(
            "c1",
            vec![
                matched("level=info"),
                SearchEvent::Alert {
                    title: "Too many matches".to_string(),
                    description: "narrow the query".to_string(),
                },
            ],
        );
        let err = orchestrator(search, 1_000)
            .run("a", "c1", at(), r"level=(\w+)", &counter(), in_a_minute())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchFatal);
        assert!(err.to_string().contains("Too many matches"));
    }

    #[tokio::test]
    async fn test_backend_error_is_fatal() {
        let search = Arc::new(InMemorySearchService::new());
        search.respond(
            "c1",
            vec![SearchEvent::Error {
                message: "shard unavailable".to_string(),
            }],
        );
        let err = orchestrator(search, 1_000)
            .run("a", "c1", at(), r"level=(\w+)", &counter(), in_a_minute())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InsightsError::Search { ref sample_time, .. } if *sample_time == at()
        ));
        assert!(err.to_string().contains("2024-02-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_backend_timeout_is_deadline_exceeded() {
        let search = Arc::new(InMemorySearchService::new());
        search.respond("c1", vec![SearchEvent::Timeout]);
        let err = orchestrator(search, 1_000)
            .run("a", "c1", at(), r"level=(\w+)", &counter(), in_a_minute())
            .await
            .unwrap_err();
        assert!(matches!(err, InsightsError::DeadlineExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_enforced() {
        let search = Arc::new(InMemorySearchService::new());
        search.respond("slow", vec![matched("level=info")]);
        search.delay("slow", Duration::from_secs(120));

        let err = orchestrator(search, 1_000)
            .run(
                "a",
                "slow",
                at(),
                r"level=(\w+)",
                &counter(),
                Instant::now() + Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InsightsError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_query_build_failure_is_invalid_input() {
        let search = Arc::new(InMemorySearchService::new());
        let err = orchestrator(search.clone(), 1_000)
            .run("a", "c1", at(), "repo:other (\\w+)", &counter(), in_a_minute())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_capacity_bounds_results() {
        let search = Arc::new(InMemorySearchService::new());
        search.respond(
            "c1",
            (0..10).map(|i| matched(&format!("level=l{}", i))).collect(),
        );
        let results = orchestrator(search, 4)
            .run("a", "c1", at(), r"level=(\w+)", &counter(), in_a_minute())
            .await
            .unwrap();
        assert_eq!(results.iter().map(|r| r.count).sum::<u64>(), 4);
    }
}
