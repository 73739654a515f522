//! End-to-end run: load → (clean) → (analyze) → report files.
//!
//! This is the contract the command-line driver relies on: a file path and
//! a few named options in, pass/fail plus the generated report out.

use std::path::PathBuf;
use std::time::Instant;

use crate::data::analyzer::Analyzer;
use crate::data::cleaner::{Cleaner, LogObserver, MissingStrategy, OutlierMethod};
use crate::data::loader::load_file;
use crate::data::report::CleaningReport;
use crate::error::Result;
use crate::output;

pub const ANALYSIS_REPORT_FILE: &str = "analysis_report.txt";
pub const CLEANING_REPORT_FILE: &str = "cleaning_report.json";

/// Which stages to run and where to write their output.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub file: PathBuf,
    pub clean: bool,
    /// Missing-value strategy name passed to `handle_missing`.
    pub strategy: String,
    /// Columns to run IQR outlier removal on, in order. Only used with `clean`.
    pub outlier_columns: Vec<String>,
    pub analyze: bool,
    pub output_dir: PathBuf,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            clean: false,
            strategy: MissingStrategy::Drop.to_string(),
            outlier_columns: Vec::new(),
            analyze: false,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineOptions {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub rows_loaded: usize,
    pub columns_loaded: usize,
    pub cleaning: Option<CleaningReport>,
    pub report: Option<String>,
    /// Files written, in the order they were written.
    pub written: Vec<PathBuf>,
}

pub fn run(options: &PipelineOptions) -> Result<PipelineOutcome> {
    let started = Instant::now();
    log::info!("Starting pipeline for {}", options.file.display());
    log::debug!("Options: {options:?}");

    let mut table = load_file(&options.file)?;
    let mut outcome = PipelineOutcome {
        rows_loaded: table.row_count(),
        columns_loaded: table.column_count(),
        cleaning: None,
        report: None,
        written: Vec::new(),
    };

    if options.clean {
        let mut cleaner = Cleaner::from_owned(table).with_observer(LogObserver);
        cleaner
            .handle_missing(&options.strategy, None)
            .remove_duplicates()?
            .clean_strings();
        for column in &options.outlier_columns {
            cleaner.remove_outliers(column, OutlierMethod::Iqr)?;
        }
        let (cleaned, report) = cleaner.into_parts();
        log::info!(
            "Cleaned: {} -> {} rows (removed {})",
            report.original_rows,
            cleaned.row_count(),
            report.rows_removed()
        );

        let path = options.output_dir.join(CLEANING_REPORT_FILE);
        output::write_json_report(&path, &report)?;
        outcome.written.push(path);
        outcome.cleaning = Some(report);
        table = cleaned;
    } else {
        log::info!("Data cleaning skipped");
    }

    if options.analyze {
        let report = Analyzer::new(&table).generate_report();
        let path = options.output_dir.join(ANALYSIS_REPORT_FILE);
        output::write_text_report(&path, &report)?;
        log::info!("Report exported to {}", path.display());
        outcome.written.push(path);
        outcome.report = Some(report);
    } else {
        log::info!("Data analysis skipped");
    }

    log::info!(
        "Pipeline completed in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(outcome)
}
