//! Capture-group insight executor
//!
//! Entry point tying sampling, commit resolution, scoped search, and
//! pivoting together:
//!
//! ```text
//!  names ──► RepoDirectory ──► Repo ─┐
//!                                    ├─► CompressionStrategy ─► Plan per repo
//!  clock ──► planner ──► Plan ───────┘                              │
//!                                                                   ▼
//!            ┌────────────── worker pool (JoinSet + Semaphore) ─────────────┐
//!            │  resolve commit ─► SearchOrchestrator ─► [(label, count)]    │
//!            └──────────────────────────────┬───────────────────────────────┘
//!                                           ▼
//!                        single consumer: SeriesPivot ─► assemble
//! ```
//!
//! An invocation either returns every series or exactly one error. The
//! first fatal error aborts all outstanding work and the partial pivot is
//! dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregation::{CaptureGroupCounter, CountingStrategy};
use crate::collaborators::{QueryBuilder, RepoDirectory, RevisionHistory, SearchService};
use crate::config::{CompressionMode, InsightsConfig};
use crate::error::{CollaboratorError, InsightsError, Result};
use crate::history::CommitResolver;
use crate::metrics;
use crate::sampling::{self, CompressionStrategy, Execution, HistoricalCompression, NoopCompression};
use crate::search::{DeadlineBudget, SearchOrchestrator};
use crate::series::{assemble, SeriesPivot};
use crate::types::{GeneratedSeries, GroupedResult, Repo, Window};

/// Source of "now" for sample planning
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of one (repository, execution) work item; `None` when the
/// repository has no history at any of the execution's sample points
type WorkOutput = Option<(Execution, Vec<GroupedResult>)>;

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`CaptureGroupExecutor`]
pub struct CaptureGroupExecutorBuilder {
    directory: Option<Arc<dyn RepoDirectory>>,
    history: Option<Arc<dyn RevisionHistory>>,
    query_builder: Option<Arc<dyn QueryBuilder>>,
    search: Option<Arc<dyn SearchService>>,
    compression: Option<Arc<dyn CompressionStrategy>>,
    clock: Option<Clock>,
    config: InsightsConfig,
}

impl CaptureGroupExecutorBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            directory: None,
            history: None,
            query_builder: None,
            search: None,
            compression: None,
            clock: None,
            config: InsightsConfig::default(),
        }
    }

    /// Set the repository directory
    pub fn with_repo_directory(mut self, directory: Arc<dyn RepoDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Set the revision history provider
    pub fn with_revision_history(mut self, history: Arc<dyn RevisionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Set the scoped query builder
    pub fn with_query_builder(mut self, query_builder: Arc<dyn QueryBuilder>) -> Self {
        self.query_builder = Some(query_builder);
        self
    }

    /// Set the search service
    pub fn with_search_service(mut self, search: Arc<dyn SearchService>) -> Self {
        self.search = Some(search);
        self
    }

    /// Override the compression strategy selected by configuration
    pub fn with_compression(mut self, compression: Arc<dyn CompressionStrategy>) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Set the clock used as the sampling reference time
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set configuration
    pub fn with_config(mut self, config: InsightsConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the executor
    ///
    /// Fails with [`InsightsError::Configuration`] if a collaborator is
    /// missing or the configuration does not validate.
    pub fn build(self) -> Result<CaptureGroupExecutor> {
        self.config.validate()?;

        let directory = self
            .directory
            .ok_or_else(|| InsightsError::Configuration("No repository directory configured".to_string()))?;

        let history = self
            .history
            .ok_or_else(|| InsightsError::Configuration("No revision history configured".to_string()))?;

        let query_builder = self
            .query_builder
            .ok_or_else(|| InsightsError::Configuration("No query builder configured".to_string()))?;

        let search = self
            .search
            .ok_or_else(|| InsightsError::Configuration("No search service configured".to_string()))?;

        let compression: Arc<dyn CompressionStrategy> = match self.compression {
            Some(compression) => compression,
            None => match self.config.execution.compression {
                CompressionMode::None => Arc::new(NoopCompression),
                CompressionMode::Historical => Arc::new(HistoricalCompression::new(history.clone())),
            },
        };

        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Utc::now),
        };

        let orchestrator = SearchOrchestrator::new(
            query_builder,
            search,
            self.config.search.query_defaults(),
            self.config.execution.aggregation_capacity,
        );

        Ok(CaptureGroupExecutor {
            directory,
            resolver: CommitResolver::new(history),
            orchestrator: Arc::new(orchestrator),
            compression,
            clock,
            config: self.config,
        })
    }
}

impl Default for CaptureGroupExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Computes per-label time series of capture-group counts across
/// repositories and history
pub struct CaptureGroupExecutor {
    directory: Arc<dyn RepoDirectory>,
    resolver: CommitResolver,
    orchestrator: Arc<SearchOrchestrator>,
    compression: Arc<dyn CompressionStrategy>,
    clock: Clock,
    config: InsightsConfig,
}

impl CaptureGroupExecutor {
    /// Start building an executor
    pub fn builder() -> CaptureGroupExecutorBuilder {
        CaptureGroupExecutorBuilder::new()
    }

    /// Name of the active compression strategy
    pub fn compression_name(&self) -> &'static str {
        self.compression.name()
    }

    /// Count the first capture group of `query`'s pattern over `window`
    /// in every repository
    ///
    /// Series come back ordered by label, each with exactly one point per
    /// sample time, oldest first.
    pub async fn execute(
        &self,
        query: &str,
        repositories: &[String],
        window: Window,
    ) -> Result<Vec<GeneratedSeries>> {
        let counter = CaptureGroupCounter::from_query(query, self.config.search.case_sensitive)?;
        self.execute_with_counter(query, Arc::new(counter), repositories, window)
            .await
    }

    /// Like [`execute`](Self::execute) with a caller-supplied counting
    /// strategy
    pub async fn execute_with_counter(
        &self,
        query: &str,
        counting: Arc<dyn CountingStrategy>,
        repositories: &[String],
        window: Window,
    ) -> Result<Vec<GeneratedSeries>> {
        self.validate_window(&window)?;

        if repositories.is_empty() {
            debug!("No repositories requested");
            return Ok(Vec::new());
        }

        let budget = DeadlineBudget::new(
            self.config.execution.invocation_timeout(),
            self.config.execution.search_timeout(),
        );

        info!(
            query,
            repositories = repositories.len(),
            buckets = window.bucket_count,
            compression = self.compression.name(),
            "Starting insight execution"
        );

        let outcome = tokio::time::timeout_at(
            budget.invocation_deadline(),
            self.run(query, counting, repositories, &window, budget),
        )
        .await
        .unwrap_or_else(|_| Err(InsightsError::InvocationTimeout(budget.elapsed())));

        metrics::record_invocation(outcome.is_ok());
        match &outcome {
            Ok(series) => info!(
                series = series.len(),
                elapsed_ms = budget.elapsed().as_millis() as u64,
                "Insight execution complete"
            ),
            Err(e) => warn!(error = %e, kind = %e.kind(), "Insight execution failed"),
        }
        outcome
    }

    fn validate_window(&self, window: &Window) -> Result<()> {
        if window.interval.value == 0 {
            return Err(InsightsError::InvalidInput(
                "interval value must be > 0".to_string(),
            ));
        }
        if window.bucket_count > self.config.execution.max_buckets {
            return Err(InsightsError::InvalidInput(format!(
                "bucket count {} exceeds maximum of {}",
                window.bucket_count, self.config.execution.max_buckets
            )));
        }
        Ok(())
    }

    async fn run(
        &self,
        query: &str,
        counting: Arc<dyn CountingStrategy>,
        repositories: &[String],
        window: &Window,
        budget: DeadlineBudget,
    ) -> Result<Vec<GeneratedSeries>> {
        let repos = self.lookup_repositories(repositories).await?;

        let plan = sampling::plan(window.bucket_count, window.interval, (self.clock)());
        if plan.is_empty() {
            debug!("Window has no sample points");
            return Ok(Vec::new());
        }

        let query: Arc<str> = Arc::from(query);
        let semaphore = Arc::new(Semaphore::new(self.config.execution.max_concurrency));
        let mut join_set: JoinSet<Result<WorkOutput>> = JoinSet::new();

        for repo in repos {
            let repo_plan = self.compression.compress(&repo, plan.clone()).await?;
            debug!(
                repository = %repo.name,
                executions = repo_plan.execution_count(),
                "Scheduling searches"
            );

            let repo = Arc::new(repo);
            for execution in repo_plan.executions {
                let repo = Arc::clone(&repo);
                let resolver = self.resolver.clone();
                let orchestrator = Arc::clone(&self.orchestrator);
                let counting = Arc::clone(&counting);
                let query = Arc::clone(&query);
                let semaphore = Arc::clone(&semaphore);

                join_set.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| InsightsError::Worker(e.to_string()))?;

                    let Some((execution, revision)) =
                        resolver.resolve_execution(&repo, execution).await?
                    else {
                        return Ok(None);
                    };

                    let results = orchestrator
                        .run(
                            &repo.name,
                            &revision,
                            execution.recording_time,
                            &query,
                            counting.as_ref(),
                            budget.search_deadline(),
                        )
                        .await?;
                    Ok(Some((execution, results)))
                });
            }
        }

        let mut pivot = SeriesPivot::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(Some((execution, results)))) => pivot.fold(&execution, &results),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "Search worker panicked");
                    join_set.abort_all();
                    return Err(InsightsError::Worker(e.to_string()));
                }
            }
        }

        debug!(labels = pivot.label_count(), "All searches complete");
        Ok(assemble(pivot, &plan))
    }

    async fn lookup_repositories(&self, names: &[String]) -> Result<Vec<Repo>> {
        let mut repos = Vec::with_capacity(names.len());
        for name in names {
            let repo = self
                .directory
                .lookup_by_name(name)
                .await
                .map_err(|e| InsightsError::lookup(name, "repository by name", e))?
                .ok_or_else(|| {
                    InsightsError::lookup(
                        name,
                        "repository by name",
                        CollaboratorError::new("repository not found"),
                    )
                })?;
            repos.push(repo);
        }
        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::memory::{
        InMemoryRepoDirectory, InMemoryRevisionHistory, InMemorySearchService, ScopedQueryBuilder,
    };
    use crate::collaborators::{SearchEvent, SearchMatch};
    use crate::error::ErrorKind;
    use crate::types::{Interval, IntervalUnit};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn matched(content: &str) -> SearchEvent {
        SearchEvent::Match(SearchMatch {
            repository: "a".to_string(),
            path: "lib.rs".to_string(),
            content: content.to_string(),
            match_count: 1,
        })
    }

    struct Fixture {
        directory: Arc<InMemoryRepoDirectory>,
        history: Arc<InMemoryRevisionHistory>,
        search: Arc<InMemorySearchService>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                directory: Arc::new(InMemoryRepoDirectory::new()),
                history: Arc::new(InMemoryRevisionHistory::new()),
                search: Arc::new(InMemorySearchService::new()),
            }
        }

        fn builder(&self) -> CaptureGroupExecutorBuilder {
            CaptureGroupExecutor::builder()
                .with_repo_directory(self.directory.clone())
                .with_revision_history(self.history.clone())
                .with_query_builder(Arc::new(ScopedQueryBuilder))
                .with_search_service(self.search.clone())
                .with_clock(now)
        }
    }

    fn days(bucket_count: i64) -> Window {
        Window::new(bucket_count, Interval::new(IntervalUnit::Day, 1))
    }

    #[test]
    fn test_build_requires_collaborators() {
        let err = CaptureGroupExecutor::builder().build().err().unwrap();
        assert!(matches!(err, InsightsError::Configuration(_)));
    }

    #[test]
    fn test_build_selects_compression_from_config() {
        let fixture = Fixture::new();
        assert_eq!(fixture.builder().build().unwrap().compression_name(), "noop");

        let mut config = InsightsConfig::default();
        config.execution.compression = CompressionMode::Historical;
        let executor = fixture.builder().with_config(config).build().unwrap();
        assert_eq!(executor.compression_name(), "historical");
    }

    #[test]
    fn test_build_rejects_unbounded_limits() {
        let fixture = Fixture::new();

        let mut config = InsightsConfig::default();
        config.execution.max_concurrency = usize::MAX;
        let err = fixture.builder().with_config(config).build().err().unwrap();
        assert!(matches!(err, InsightsError::Configuration(_)));

        let mut config = InsightsConfig::default();
        config.execution.search_timeout_secs = u64::MAX;
        config.execution.invocation_timeout_secs = u64::MAX;
        let err = fixture.builder().with_config(config).build().err().unwrap();
        assert!(matches!(err, InsightsError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_window_validation() {
        let executor = Fixture::new().builder().build().unwrap();
        let repos = vec!["a".to_string()];

        let err = executor
            .execute("(\\w+)", &repos, Window::new(3, Interval::new(IntervalUnit::Week, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let err = executor.execute("(\\w+)", &repos, days(5_000)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[tokio::test]
    async fn test_pattern_without_group_is_invalid() {
        let executor = Fixture::new().builder().build().unwrap();
        let err = executor
            .execute("TODO", &["a".to_string()], days(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[tokio::test]
    async fn test_empty_repository_list() {
        let fixture = Fixture::new();
        let executor = fixture.builder().build().unwrap();
        assert!(executor.execute("(\\w+)", &[], days(3)).await.unwrap().is_empty());
        assert!(fixture.search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_bucket_count_yields_nothing() {
        let fixture = Fixture::new();
        fixture.directory.add("a");
        let executor = fixture.builder().build().unwrap();
        let series = executor
            .execute("(\\w+)", &["a".to_string()], days(0))
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_single_repository_daily_counts() {
        let fixture = Fixture::new();
        fixture.directory.add("a");
        fixture
            .history
            .add_commit("a", "c1", now() - chrono::Duration::days(10));
        fixture
            .search
            .respond("c1", vec![matched("go 1.21"), matched("go 1.22")]);

        let executor = fixture.builder().build().unwrap();
        let series = executor
            .execute(r"go (\d\.\d+)", &["a".to_string()], days(2))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "1.21");
        assert_eq!(series[1].label, "1.22");
        for s in &series {
            assert_eq!(s.points.iter().map(|p| p.count).collect::<Vec<_>>(), vec![1, 1]);
        }
        assert_eq!(fixture.search.queries().len(), 2);
    }
}
