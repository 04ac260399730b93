//! Nested deadline budgets
//!
//! An invocation has one overall deadline. Each search gets its own budget,
//! but never more than what is left of the invocation.

use std::time::Duration;

use tokio::time::Instant;

/// Overall invocation deadline plus the per-search budget
#[derive(Debug, Clone, Copy)]
pub struct DeadlineBudget {
    started: Instant,
    invocation: Instant,
    per_search: Duration,
}

impl DeadlineBudget {
    /// Start a budget now
    ///
    /// Timeouts too large to represent saturate at a far-future deadline.
    pub fn new(invocation_timeout: Duration, per_search: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            invocation: after(started, invocation_timeout),
            per_search,
        }
    }

    /// Deadline of the whole invocation
    pub fn invocation_deadline(&self) -> Instant {
        self.invocation
    }

    /// Deadline for a search starting now
    pub fn search_deadline(&self) -> Instant {
        after(Instant::now(), self.per_search).min(self.invocation)
    }

    /// Time since the budget started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// `from + timeout`, saturating at a far-future instant
fn after(from: Instant, timeout: Duration) -> Instant {
    from.checked_add(timeout).unwrap_or_else(|| from + FAR_FUTURE)
}

/// Stand-in for an unrepresentable deadline
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
