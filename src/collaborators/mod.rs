//! External collaborator interfaces
//!
//! The executor never talks to a repository store, git, or a search
//! backend directly. It is handed implementations of these traits at
//! construction time, which keeps the core free of global hooks and lets
//! tests run in parallel against [`memory`] implementations.

pub mod memory;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::time::Instant;

use crate::error::{CollaboratorError, HistoryError};
use crate::types::{Commit, Repo};

/// Resolves repository names to directory identities
#[async_trait]
pub trait RepoDirectory: Send + Sync {
    /// Look up a repository by name; `Ok(None)` if it does not exist
    async fn lookup_by_name(&self, name: &str) -> Result<Option<Repo>, CollaboratorError>;
}

/// Revision history of a repository
#[async_trait]
pub trait RevisionHistory: Send + Sync {
    /// Most recent commit at or before `at`
    ///
    /// Must return [`HistoryError::NoHistory`] when no such commit exists,
    /// including for repositories with no commits at all.
    async fn most_recent_commit_at_or_before(
        &self,
        repo: &Repo,
        at: DateTime<Utc>,
    ) -> Result<Commit, HistoryError>;
}

/// Defaults applied to every scoped query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    /// Pattern type of the base query (e.g. `regexp`)
    pub pattern_type: String,
    /// Whether matching is case sensitive
    pub case_sensitive: bool,
    /// Backend-side timeout to embed in the query
    pub timeout: Option<Duration>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            pattern_type: "regexp".to_string(),
            case_sensitive: false,
            timeout: None,
        }
    }
}

impl QueryDefaults {
    /// Set the backend-side timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Builds a query scoped to one repository at one revision
///
/// Implementations must be pure; a failure means the base query is
/// malformed.
pub trait QueryBuilder: Send + Sync {
    /// Scope `base` to `repository` at `revision`
    fn scope_query(
        &self,
        base: &str,
        repository: &str,
        revision: &str,
        defaults: &QueryDefaults,
    ) -> Result<String, CollaboratorError>;
}

/// A single match reported by the search backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Repository the match came from
    pub repository: String,
    /// File path of the match
    pub path: String,
    /// Matched content (line or chunk)
    pub content: String,
    /// Number of pattern matches the backend counted in this result
    pub match_count: u64,
}

/// Event emitted on a search stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// A search result
    Match(SearchMatch),
    /// Backend alert (e.g. query too broad); always fatal
    Alert {
        /// Alert title
        title: String,
        /// Alert description
        description: String,
    },
    /// Backend-reported partial failure; always fatal
    Error {
        /// Error message
        message: String,
    },
    /// Backend gave up because its own timeout elapsed
    Timeout,
}

/// Stream of search events
pub type SearchStream =
    Pin<Box<dyn Stream<Item = Result<SearchEvent, CollaboratorError>> + Send>>;

/// Streaming search backend
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Start a search for an executable query
    ///
    /// `deadline` is advisory for the backend; the caller enforces it
    /// independently.
    async fn search(&self, query: &str, deadline: Instant)
        -> Result<SearchStream, CollaboratorError>;
}
