//! Kuba Insights - historical capture-group time series over code search
//!
//! Given a regular expression with a capture group, a set of repositories,
//! and a sampling window, this library computes one time series per
//! distinct captured value, counting occurrences at each sample point of
//! each repository's history:
//! - Sample planning over hour/day/week/month/year intervals
//! - Optional historical compression that skips searches at unchanged commits
//! - Bounded-memory aggregation of match counts
//! - Concurrent, deadline-bounded scoped searches
//! - Deterministic, zero-filled series assembly

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Collaborator interfaces and in-memory implementations
pub mod collaborators;

/// Sampling plans and compression strategies
pub mod sampling;

/// Commit resolution per repository and sample point
pub mod history;

/// Bounded aggregation and counting strategies
pub mod aggregation;

/// Deadline-bounded scoped search execution
pub mod search;

/// Pivot and assembly of generated series
pub mod series;

/// Executor entry point and builder
pub mod executor;

// Re-export main types
pub use config::InsightsConfig;
pub use error::{ErrorKind, InsightsError, Result};
pub use executor::{CaptureGroupExecutor, CaptureGroupExecutorBuilder};
pub use types::{GeneratedSeries, Interval, IntervalUnit, SamplePoint, TimeDataPoint, Window};
