//! # tidy-panda
//!
//! Batch pipeline for tabular files: load, clean, summarise.
//!
//! ```text
//!  file ──▶ loader ──▶ Table ──▶ Cleaner ──▶ Table + CleaningReport ──▶ Analyzer ──▶ report
//! ```
//!
//! ## Modules
//!
//! - [`data`] - table model, loader, cleaner, analyzer and numeric kernels
//! - [`pipeline`] - one-call driver used by the binary
//! - [`output`] - report files
//! - [`error`] - error types
//!
//! ## Quick Start
//!
//! ```
//! use tidy_panda::data::analyzer::Analyzer;
//! use tidy_panda::data::cleaner::Cleaner;
//! use tidy_panda::data::loader::table_from_json;
//!
//! let json = serde_json::json!({
//!     "records": [
//!         {"city": " NYC ", "temp": 21.5},
//!         {"city": "LA",    "temp": 25.0},
//!         {"city": "LA",    "temp": null}
//!     ]
//! });
//! let table = table_from_json(&json)?;
//!
//! let mut cleaner = Cleaner::new(&table);
//! let cleaned = cleaner.handle_missing("drop", None).clean_strings().cleaned_data();
//!
//! let stats = Analyzer::new(&cleaned).summary_statistics();
//! assert_eq!(stats.get("temp").map(|s| s.count), Some(2));
//! # Ok::<(), tidy_panda::PipelineError>(())
//! ```

pub mod data;
pub mod error;
pub mod output;
pub mod pipeline;

pub use data::analyzer::{Analyzer, ColumnSummary, CorrelationMatrix, SummaryStatistics};
pub use data::cleaner::{Cleaner, CleaningStep, LogObserver, MissingStrategy, OutlierMethod, StepObserver};
pub use data::loader::{load_file, DataLoader, DatasetInfo, FileFormat};
pub use data::model::{CellValue, Column, ColumnKind, Table};
pub use data::report::{CleaningReport, CleaningWarning, StepMetrics, StepRecord};
pub use error::{PipelineError, Result};
