//! Error types for insight computation
//!
//! Every failure that reaches the caller is an [`InsightsError`]. The only
//! condition absorbed internally is a repository having no history at a
//! sample point, which is modelled as a resolution outcome rather than an
//! error (see [`crate::history::Resolution`]).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::SamplePoint;

/// Main error type for insight computation
#[derive(Error, Debug)]
pub enum InsightsError {
    /// Malformed query, window or pattern
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Repository identity or revision history lookup failed
    #[error("Lookup failed for repository {repository} ({context}): {source}")]
    Lookup {
        /// Repository name
        repository: String,
        /// What was being looked up
        context: String,
        /// Error reported by the collaborator
        #[source]
        source: CollaboratorError,
    },

    /// Search backend reported an error or alert, or the stream failed
    #[error("Search failed for repository {repository} at revision {revision} (sample time {sample_time}): {message}")]
    Search {
        /// Repository name
        repository: String,
        /// Revision the search was scoped to
        revision: String,
        /// Sample point the search was run for
        sample_time: SamplePoint,
        /// Backend message
        message: String,
    },

    /// A single search did not finish before its deadline
    #[error("Search deadline exceeded for repository {repository} at revision {revision} (sample time {sample_time})")]
    DeadlineExceeded {
        /// Repository name
        repository: String,
        /// Revision the search was scoped to
        revision: String,
        /// Sample point the search was run for
        sample_time: SamplePoint,
    },

    /// The whole invocation ran past its overall deadline
    #[error("Invocation deadline exceeded after {0:?}")]
    InvocationTimeout(Duration),

    /// A worker task panicked or was torn down
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl InsightsError {
    /// Wrap a collaborator failure with repository context
    pub fn lookup(
        repository: impl Into<String>,
        context: impl Into<String>,
        source: CollaboratorError,
    ) -> Self {
        Self::Lookup {
            repository: repository.into(),
            context: context.into(),
            source,
        }
    }

    /// Category of this error for programmatic handling
    pub fn kind(&self) -> ErrorKind {
        match self {
            InsightsError::InvalidInput(_) | InsightsError::Configuration(_) => ErrorKind::Input,
            InsightsError::Lookup { .. } => ErrorKind::LookupFatal,
            InsightsError::Search { .. }
            | InsightsError::DeadlineExceeded { .. }
            | InsightsError::InvocationTimeout(_) => ErrorKind::SearchFatal,
            InsightsError::Worker(_) => ErrorKind::Internal,
        }
    }
}

/// Categories of insight errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad query, window or configuration; not retryable
    Input,
    /// Repository or revision lookup failed
    LookupFatal,
    /// Search failed, timed out or raised an alert
    SearchFatal,
    /// Internal failure (worker panic)
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Input => write!(f, "Input"),
            ErrorKind::LookupFatal => write!(f, "LookupFatal"),
            ErrorKind::SearchFatal => write!(f, "SearchFatal"),
            ErrorKind::Internal => write!(f, "Internal"),
        }
    }
}

/// Error reported by an external collaborator (directory, history, search)
#[derive(Debug)]
pub struct CollaboratorError {
    /// Human-readable message
    pub message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CollaboratorError {
    /// Create a new collaborator error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Add source error for error chaining
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CollaboratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Outcome of a failed revision history lookup
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The repository has no commit at or before the requested instant
    #[error("no history")]
    NoHistory,

    /// Any other failure (network, permissions, corrupt refs)
    #[error(transparent)]
    Other(#[from] CollaboratorError),
}

/// Result type alias for insight operations
pub type Result<T> = std::result::Result<T, InsightsError>;
