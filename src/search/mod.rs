//! Scoped search execution
//!
//! - [`SearchOrchestrator`]: one deadline-bounded search per (repository,
//!   revision), aggregated into sorted label counts
//! - [`DeadlineBudget`]: invocation deadline and per-search budget

pub mod deadline;
pub mod orchestrator;

pub use deadline::DeadlineBudget;
pub use orchestrator::SearchOrchestrator;
