//! In-memory collaborators (for testing and embedding)

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use super::{
    QueryBuilder, QueryDefaults, RepoDirectory, RevisionHistory, SearchEvent, SearchService,
    SearchStream,
};
use crate::error::{CollaboratorError, HistoryError};
use crate::types::{Commit, Repo, RepoId};

/// Filters a base query may not carry because scoping adds them
const SCOPE_FILTERS: &[&str] = &["repo:", "rev:", "-repo:"];

// ============================================================================
// Repository directory
// ============================================================================

/// Repository directory backed by a map
#[derive(Default)]
pub struct InMemoryRepoDirectory {
    repos: RwLock<HashMap<String, Repo>>,
    failing: RwLock<HashSet<String>>,
    next_id: AtomicUsize,
}

impl InMemoryRepoDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository and return its handle
    pub fn add(&self, name: &str) -> Repo {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) as RepoId + 1;
        let repo = Repo::new(id, name);
        self.repos.write().insert(name.to_string(), repo.clone());
        repo
    }

    /// Make lookups of `name` fail
    pub fn fail_lookups_for(&self, name: &str) {
        self.failing.write().insert(name.to_string());
    }
}

#[async_trait]
impl RepoDirectory for InMemoryRepoDirectory {
    async fn lookup_by_name(&self, name: &str) -> Result<Option<Repo>, CollaboratorError> {
        if self.failing.read().contains(name) {
            return Err(CollaboratorError::new(format!(
                "repository store unavailable for {}",
                name
            )));
        }
        Ok(self.repos.read().get(name).cloned())
    }
}

// ============================================================================
// Revision history
// ============================================================================

/// Revision history backed by per-repository commit lists
#[derive(Default)]
pub struct InMemoryRevisionHistory {
    commits: RwLock<HashMap<String, Vec<Commit>>>,
    failing: RwLock<HashSet<String>>,
    lookups: AtomicUsize,
}

impl InMemoryRevisionHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit for `repository`
    pub fn add_commit(&self, repository: &str, id: &str, committed_at: DateTime<Utc>) {
        let mut commits = self.commits.write();
        let list = commits.entry(repository.to_string()).or_default();
        list.push(Commit::new(id, committed_at));
        list.sort_by_key(|c| c.committed_at);
    }

    /// Make every lookup for `repository` fail with a hard error
    pub fn fail_lookups_for(&self, repository: &str) {
        self.failing.write().insert(repository.to_string());
    }

    /// Number of lookups served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RevisionHistory for InMemoryRevisionHistory {
    async fn most_recent_commit_at_or_before(
        &self,
        repo: &Repo,
        at: DateTime<Utc>,
    ) -> Result<Commit, HistoryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if self.failing.read().contains(&repo.name) {
            return Err(HistoryError::Other(CollaboratorError::new(format!(
                "git log failed for {}",
                repo.name
            ))));
        }

        self.commits
            .read()
            .get(&repo.name)
            .and_then(|list| list.iter().rev().find(|c| c.committed_at <= at))
            .cloned()
            .ok_or(HistoryError::NoHistory)
    }
}

// ============================================================================
// Query builder
// ============================================================================

/// Query builder producing `repo:^name$@revision` scoped queries
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopedQueryBuilder;

impl QueryBuilder for ScopedQueryBuilder {
    fn scope_query(
        &self,
        base: &str,
        repository: &str,
        revision: &str,
        defaults: &QueryDefaults,
    ) -> Result<String, CollaboratorError> {
        let base = base.trim();
        if base.is_empty() {
            return Err(CollaboratorError::new("query is empty"));
        }
        if let Some(token) = base
            .split_whitespace()
            .find(|t| SCOPE_FILTERS.iter().any(|f| t.starts_with(f)))
        {
            return Err(CollaboratorError::new(format!(
                "query must not contain repository or revision filters, found '{}'",
                token
            )));
        }
        if revision.is_empty() {
            return Err(CollaboratorError::new("revision is empty"));
        }

        let mut parts = vec![
            format!("repo:^{}$@{}", regex::escape(repository), revision),
            format!("patterntype:{}", defaults.pattern_type),
            "count:all".to_string(),
        ];
        if defaults.case_sensitive {
            parts.push("case:yes".to_string());
        }
        if let Some(timeout) = defaults.timeout {
            parts.push(format!("timeout:{}s", timeout.as_secs().max(1)));
        }
        parts.push(base.to_string());
        Ok(parts.join(" "))
    }
}

/// Revision a query produced by [`ScopedQueryBuilder`] is scoped to
pub fn scoped_revision(query: &str) -> Option<&str> {
    query
        .split_whitespace()
        .find(|t| t.starts_with("repo:"))
        .and_then(|t| t.rsplit_once('@'))
        .map(|(_, rev)| rev)
}

// ============================================================================
// Search service
// ============================================================================

/// Search service replaying canned events per revision
///
/// Queries are matched by the revision embedded by [`ScopedQueryBuilder`].
/// Revisions without canned events return an empty stream.
#[derive(Default)]
pub struct InMemorySearchService {
    events: RwLock<HashMap<String, Vec<SearchEvent>>>,
    delays: RwLock<HashMap<String, Duration>>,
    queries: RwLock<Vec<String>>,
}

impl InMemorySearchService {
    /// Create a service with no canned results
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the events returned for searches at `revision`
    pub fn respond(&self, revision: &str, events: Vec<SearchEvent>) {
        self.events.write().insert(revision.to_string(), events);
    }

    /// Delay searches at `revision` before the stream is returned
    pub fn delay(&self, revision: &str, delay: Duration) {
        self.delays.write().insert(revision.to_string(), delay);
    }

    /// Queries received so far, in arrival order
    pub fn queries(&self) -> Vec<String> {
        self.queries.read().clone()
    }
}

#[async_trait]
impl SearchService for InMemorySearchService {
    async fn search(
        &self,
        query: &str,
        _deadline: Instant,
    ) -> Result<SearchStream, CollaboratorError> {
        self.queries.write().push(query.to_string());

        let revision = scoped_revision(query)
            .ok_or_else(|| CollaboratorError::new(format!("unscoped query: {}", query)))?
            .to_string();

        let delay = self.delays.read().get(&revision).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let events = self.events.read().get(&revision).cloned().unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scope_query_embeds_repository_and_revision() {
        let defaults = QueryDefaults::default().with_timeout(Duration::from_secs(61));
        let query = ScopedQueryBuilder
            .scope_query("fmt\\.Errorf\\(\"(\\w+)", "github.com/acme/api", "deadbeef", &defaults)
            .unwrap();
        assert!(query.starts_with("repo:^github\\.com/acme/api$@deadbeef "));
        assert!(query.contains("patterntype:regexp"));
        assert!(query.contains("timeout:61s"));
        assert_eq!(scoped_revision(&query), Some("deadbeef"));
    }

    #[test]
    fn test_scope_query_rejects_repo_filter() {
        let err = ScopedQueryBuilder
            .scope_query("repo:foo (\\w+)", "a", "abc", &QueryDefaults::default())
            .unwrap_err();
        assert!(err.message.contains("repo:foo"));
    }

    #[test]
    fn test_scope_query_rejects_empty() {
        assert!(ScopedQueryBuilder
            .scope_query("   ", "a", "abc", &QueryDefaults::default())
            .is_err());
    }

    #[tokio::test]
    async fn test_history_returns_most_recent_at_or_before() {
        let history = InMemoryRevisionHistory::new();
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        history.add_commit("a", "c2", feb);
        history.add_commit("a", "c1", jan);
        let repo = Repo::new(1, "a");

        let commit = history
            .most_recent_commit_at_or_before(&repo, feb - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(commit.id, "c1");
        let commit = history.most_recent_commit_at_or_before(&repo, feb).await.unwrap();
        assert_eq!(commit.id, "c2");

        let before_first = history
            .most_recent_commit_at_or_before(&repo, jan - chrono::Duration::days(1))
            .await;
        assert!(matches!(before_first, Err(HistoryError::NoHistory)));
        assert_eq!(history.lookup_count(), 3);
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = InMemoryRepoDirectory::new();
        let repo = directory.add("a");
        assert_eq!(directory.lookup_by_name("a").await.unwrap(), Some(repo));
        assert_eq!(directory.lookup_by_name("b").await.unwrap(), None);
        directory.fail_lookups_for("c");
        assert!(directory.lookup_by_name("c").await.is_err());
    }
}
