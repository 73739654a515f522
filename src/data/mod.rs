//! Data layer: core types, loading, cleaning and statistics.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .xlsx / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Table
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  cleaner  │  ordered steps on an owned copy → Table + CleaningReport
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ analyzer  │  summary, correlation, value counts → text report
//!   └──────────┘
//! ```

pub mod analyzer;
pub mod cleaner;
pub mod loader;
pub mod model;
pub mod report;
pub mod stats;
