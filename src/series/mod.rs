//! Reshaping search results into charted time series
//!
//! ```text
//!   per (repository, execution)          per label                 output
//!  ┌──────────────────────────┐   fold  ┌──────────────────┐ assemble ┌─────────────────┐
//!  │ [(label, count), ...]    │ ──────► │ label → t → count│ ───────► │ GeneratedSeries │
//!  └──────────────────────────┘         └──────────────────┘          └─────────────────┘
//! ```

pub mod assembler;
pub mod pivot;

pub use assembler::{assemble, SERIES_ID_PREFIX};
pub use pivot::SeriesPivot;
