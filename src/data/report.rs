use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Warnings – recoverable anomalies inside a cleaning step
// ---------------------------------------------------------------------------

/// A data-level anomaly. The step that raised it still completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CleaningWarning {
    /// One column could not be recast; its data is unchanged.
    Conversion {
        column: String,
        target: String,
        message: String,
    },
    /// Unrecognised missing-value strategy; `drop` was applied instead.
    UnknownStrategy { requested: String },
}

impl fmt::Display for CleaningWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleaningWarning::Conversion {
                column,
                target,
                message,
            } => write!(f, "Could not convert {column} to {target}: {message}"),
            CleaningWarning::UnknownStrategy { requested } => {
                write!(f, "Unknown missing-value strategy '{requested}', falling back to drop")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Step records
// ---------------------------------------------------------------------------

/// Step-specific counters. Every removed or altered row/cell shows up here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepMetrics {
    HandleMissing {
        strategy: String,
        applied: String,
        missing_before: usize,
        missing_after: usize,
        rows_removed: usize,
    },
    RemoveDuplicates {
        subset: Option<Vec<String>>,
        rows_removed: usize,
    },
    CleanStrings {
        columns_cleaned: Vec<String>,
        cells_changed: usize,
    },
    ConvertTypes {
        conversions: Vec<(String, String)>,
        converted: Vec<String>,
    },
    RemoveOutliers {
        column: String,
        method: String,
        lower_bound: Option<f64>,
        upper_bound: Option<f64>,
        cells_coerced: usize,
        rows_removed: usize,
    },
}

impl StepMetrics {
    /// Rows this step dropped from the table.
    pub fn rows_removed(&self) -> usize {
        match self {
            StepMetrics::HandleMissing { rows_removed, .. }
            | StepMetrics::RemoveDuplicates { rows_removed, .. }
            | StepMetrics::RemoveOutliers { rows_removed, .. } => *rows_removed,
            StepMetrics::CleanStrings { .. } | StepMetrics::ConvertTypes { .. } => 0,
        }
    }
}

/// One applied cleaning operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    #[serde(flatten)]
    pub metrics: StepMetrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CleaningWarning>,
}

impl StepRecord {
    pub fn new(step: &'static str, metrics: StepMetrics) -> Self {
        Self {
            step,
            metrics,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<CleaningWarning>) -> Self {
        self.warnings = warnings;
        self
    }
}

// ---------------------------------------------------------------------------
// CleaningReport
// ---------------------------------------------------------------------------

/// Accumulates over the lifetime of a [`Cleaner`](super::cleaner::Cleaner).
///
/// Final counts stay `None` until the cleaned table is retrieved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningReport {
    pub original_rows: usize,
    pub original_columns: usize,
    pub steps_applied: Vec<StepRecord>,
    pub final_rows: Option<usize>,
    pub final_columns: Option<usize>,
}

impl CleaningReport {
    pub fn new(original_rows: usize, original_columns: usize) -> Self {
        Self {
            original_rows,
            original_columns,
            steps_applied: Vec::new(),
            final_rows: None,
            final_columns: None,
        }
    }

    pub fn push(&mut self, record: StepRecord) {
        self.steps_applied.push(record);
    }

    pub fn finalize(&mut self, rows: usize, columns: usize) {
        self.final_rows = Some(rows);
        self.final_columns = Some(columns);
    }

    /// All warnings raised so far, in step order.
    pub fn warnings(&self) -> impl Iterator<Item = &CleaningWarning> {
        self.steps_applied.iter().flat_map(|s| s.warnings.iter())
    }

    /// Sum of rows removed across every step.
    pub fn rows_removed(&self) -> usize {
        self.steps_applied
            .iter()
            .map(|s| s.metrics.rows_removed())
            .sum()
    }
}
