use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use super::model::{CellValue, Column, ColumnKind, Table};
use super::stats;
use crate::error::Result;
use crate::output;

// ---------------------------------------------------------------------------
// Result types handed to renderers
// ---------------------------------------------------------------------------

/// Descriptive statistics of one numeric column. Missing values are
/// excluded; undefined figures are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n − 1).
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
}

impl ColumnSummary {
    fn from_values(column: &str, values: &[f64]) -> Self {
        Self {
            column: column.to_string(),
            count: values.len(),
            mean: stats::mean(values),
            median: stats::quantile(values, 0.5),
            std: stats::sample_std(values),
            min: stats::min(values),
            max: stats::max(values),
            q25: stats::quantile(values, 0.25),
            q75: stats::quantile(values, 0.75),
        }
    }
}

/// Per-numeric-column summaries in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub columns: Vec<ColumnSummary>,
}

impl SummaryStatistics {
    pub fn get(&self, column: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|s| s.column == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Square, symmetric Pearson matrix over the numeric columns.
///
/// Empty when fewer than two numeric columns exist; that is a valid
/// "no correlation available" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }

    /// Upper-triangle pairs `(a, b, r)` ranked by `|r|` descending.
    ///
    /// The sort is stable, so equal magnitudes keep enumeration order
    /// (`i < j` over column order). Undefined coefficients rank last.
    pub fn ranked_pairs(&self) -> Vec<(&str, &str, f64)> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                pairs.push((self.columns[i].as_str(), self.columns[j].as_str(), self.values[i][j]));
            }
        }
        pairs.sort_by(|a, b| match (a.2.is_nan(), b.2.is_nan()) {
            (false, false) => b.2.abs().total_cmp(&a.2.abs()),
            (x, y) => x.cmp(&y),
        });
        pairs
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Read-only statistics over a table.
///
/// Column classification is taken once at construction. The shared borrow
/// keeps the table immutable for the analyzer's lifetime.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    table: &'a Table,
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(table: &'a Table) -> Self {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for (name, column) in table.columns() {
            match column.kind() {
                ColumnKind::Integer | ColumnKind::Float => numeric.push(name.to_string()),
                ColumnKind::Text => categorical.push(name.to_string()),
                ColumnKind::Boolean => {}
            }
        }
        Self {
            table,
            numeric,
            categorical,
        }
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical
    }

    pub fn summary_statistics(&self) -> SummaryStatistics {
        SummaryStatistics {
            columns: self
                .numeric_iter()
                .map(|(name, column)| ColumnSummary::from_values(name, &column.numeric_values()))
                .collect(),
        }
    }

    /// Pairwise-complete Pearson correlation over all numeric columns.
    pub fn correlation_matrix(&self) -> CorrelationMatrix {
        if self.numeric.len() < 2 {
            log::warn!("Need at least 2 numeric columns for correlation");
            return CorrelationMatrix::default();
        }

        let cells: Vec<Vec<Option<f64>>> = self
            .numeric_iter()
            .map(|(_, column)| column.numeric_cells())
            .collect();
        let n = cells.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            // 1.0 on the diagonal unless the column has no variance
            values[i][i] = if stats::pearson_pairwise(&cells[i], &cells[i]).is_nan() {
                f64::NAN
            } else {
                1.0
            };
            for j in (i + 1)..n {
                let r = stats::pearson_pairwise(&cells[i], &cells[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        CorrelationMatrix {
            columns: self.numeric.clone(),
            values,
        }
    }

    /// Most frequent values, descending by count, ties by first occurrence.
    pub fn value_counts(&self, column: &str, top_n: usize) -> Result<Vec<(CellValue, usize)>> {
        let column = self.table.require(column)?;
        let mut counts = frequencies(column);
        counts.truncate(top_n);
        Ok(counts)
    }

    /// Fixed-section plain-text analysis report.
    pub fn generate_report(&self) -> String {
        let mut report = Vec::new();
        let rule = "=".repeat(60);
        report.push(rule.clone());
        report.push("DATA ANALYSIS REPORT".to_string());
        report.push(rule.clone());

        report.push("\nDATASET OVERVIEW:".to_string());
        report.push(format!("   Rows: {}", self.table.row_count()));
        report.push(format!("   Columns: {}", self.table.column_count()));
        report.push(format!("   Numeric columns: {}", self.numeric.len()));
        report.push(format!("   Categorical columns: {}", self.categorical.len()));

        if !self.numeric.is_empty() {
            report.push("\nSUMMARY STATISTICS:".to_string());
            for s in self.summary_statistics().columns {
                report.push(format!("\n   {}:", s.column));
                report.push(format!("      Mean: {:.2}", s.mean));
                report.push(format!("      Median: {:.2}", s.median));
                report.push(format!("      Std Dev: {:.2}", s.std));
                report.push(format!("      Range: [{:.2}, {:.2}]", s.min, s.max));
            }
        }

        if !self.categorical.is_empty() {
            report.push("\nCATEGORICAL COLUMNS:".to_string());
            for name in &self.categorical {
                let Some(column) = self.table.column(name) else {
                    continue;
                };
                let counts = frequencies(column);
                let most_common = counts
                    .first()
                    .map_or_else(|| "N/A".to_string(), |(v, _)| v.to_string());
                report.push(format!("\n   {name}:"));
                report.push(format!("      Unique values: {}", counts.len()));
                report.push(format!("      Most common: {most_common}"));
            }
        }

        if self.numeric.len() >= 2 {
            report.push("\nCORRELATIONS:".to_string());
            report.push("\n   Strongest correlations:".to_string());
            let matrix = self.correlation_matrix();
            for (a, b, r) in matrix.ranked_pairs().into_iter().take(3) {
                report.push(format!("      {a} <-> {b}: {r:.2}"));
            }
        }

        report.push(format!("\n{rule}"));
        report.join("\n")
    }

    /// Write [`generate_report`](Self::generate_report) to `path`, creating
    /// the parent directory if needed.
    pub fn export_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        output::write_text_report(path, &self.generate_report())?;
        log::info!("Report exported to {}", path.display());
        Ok(())
    }

    fn numeric_iter(&self) -> impl Iterator<Item = (&str, &Column)> + '_ {
        self.numeric
            .iter()
            .filter_map(|name| self.table.column(name).map(|c| (name.as_str(), c)))
    }
}

/// Non-missing value counts, descending, ties by first occurrence.
fn frequencies(column: &Column) -> Vec<(CellValue, usize)> {
    let mut index: HashMap<CellValue, usize> = HashMap::new();
    let mut counts: Vec<(CellValue, usize)> = Vec::new();
    for value in column.values().filter(|v| !v.is_missing()) {
        match index.get(&value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }
    // stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
