//! Label aggregation for a single search
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌────────────────────┐
//! │ Search match │ → │ CountingStrategy  │ → │ BoundedAggregator  │ → sorted (label, count)
//! └──────────────┘   │ (label, increment)│   │ capped total       │
//!                    └───────────────────┘   └────────────────────┘
//! ```

pub mod bounded;
pub mod counting;

pub use bounded::{AddOutcome, BoundedAggregator, DEFAULT_AGGREGATION_CAPACITY};
pub use counting::{extract_pattern, CaptureGroupCounter, CountingStrategy, PathCounter};
