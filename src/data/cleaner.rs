use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::model::{self, CellValue, Column, Table};
use super::report::{CleaningReport, CleaningWarning, StepMetrics, StepRecord};
use super::stats;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Step parameters
// ---------------------------------------------------------------------------

/// How `handle_missing` treats missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingStrategy {
    /// Remove every row holding at least one missing cell.
    Drop,
    /// Replace missing cells with a fill value.
    Fill,
    /// Carry the last present value down each column.
    ForwardFill,
}

impl MissingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MissingStrategy::Drop => "drop",
            MissingStrategy::Fill => "fill",
            MissingStrategy::ForwardFill => "forward_fill",
        }
    }
}

impl FromStr for MissingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "drop" => Ok(MissingStrategy::Drop),
            "fill" => Ok(MissingStrategy::Fill),
            "forward_fill" | "forwardFill" | "ffill" => Ok(MissingStrategy::ForwardFill),
            other => Err(format!("unknown missing-value strategy '{other}'")),
        }
    }
}

impl fmt::Display for MissingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outlier detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlierMethod {
    /// Tukey fences at 1.5 × IQR beyond the quartiles.
    #[default]
    Iqr,
}

impl FromStr for OutlierMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            other => Err(format!("unknown outlier method '{other}'")),
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Iqr => f.write_str("iqr"),
        }
    }
}

/// Target kind for `convert_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "int64" | "integer" => Ok(TargetType::Integer),
            "float" | "float64" | "numeric" | "number" => Ok(TargetType::Float),
            "str" | "string" | "text" | "object" | "category" => Ok(TargetType::Text),
            "bool" | "boolean" => Ok(TargetType::Boolean),
            other => Err(format!("data type '{other}' not understood")),
        }
    }
}

// ---------------------------------------------------------------------------
// CleaningStep – one transformation, usable on its own
// ---------------------------------------------------------------------------

/// A single cleaning operation.
///
/// [`apply`](CleaningStep::apply) is a pure transformation from one table to
/// the next plus the record of what changed; [`Cleaner`] chains them.
#[derive(Debug, Clone, PartialEq)]
pub enum CleaningStep {
    HandleMissing {
        strategy: String,
        fill_value: Option<CellValue>,
    },
    RemoveDuplicates {
        subset: Option<Vec<String>>,
    },
    CleanStrings {
        columns: Option<Vec<String>>,
    },
    ConvertTypes {
        conversions: Vec<(String, String)>,
    },
    RemoveOutliers {
        column: String,
        method: OutlierMethod,
    },
}

impl CleaningStep {
    pub fn name(&self) -> &'static str {
        match self {
            CleaningStep::HandleMissing { .. } => "handle_missing_values",
            CleaningStep::RemoveDuplicates { .. } => "remove_duplicates",
            CleaningStep::CleanStrings { .. } => "clean_strings",
            CleaningStep::ConvertTypes { .. } => "convert_types",
            CleaningStep::RemoveOutliers { .. } => "remove_outliers",
        }
    }

    /// Transform `table`, returning the new table and the step record.
    pub fn apply(&self, mut table: Table) -> Result<(Table, StepRecord)> {
        let record = self.apply_in_place(&mut table)?;
        Ok((table, record))
    }

    /// Transform `table` in place. On error the table is left untouched.
    pub fn apply_in_place(&self, table: &mut Table) -> Result<StepRecord> {
        match self {
            CleaningStep::HandleMissing {
                strategy,
                fill_value,
            } => Ok(handle_missing(table, strategy, fill_value.as_ref())),
            CleaningStep::RemoveDuplicates { subset } => remove_duplicates(table, subset.as_deref()),
            CleaningStep::CleanStrings { columns } => Ok(clean_strings(table, columns.as_deref())),
            CleaningStep::ConvertTypes { conversions } => Ok(convert_types(table, conversions)),
            CleaningStep::RemoveOutliers { column, method } => {
                remove_outliers(table, column, *method)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Missing values
// ---------------------------------------------------------------------------

fn handle_missing(table: &mut Table, requested: &str, fill_value: Option<&CellValue>) -> StepRecord {
    let mut warnings = Vec::new();
    let strategy = requested.parse::<MissingStrategy>().unwrap_or_else(|_| {
        warnings.push(CleaningWarning::UnknownStrategy {
            requested: requested.to_string(),
        });
        MissingStrategy::Drop
    });

    let missing_before = table.missing_count();
    let rows_before = table.row_count();

    match strategy {
        MissingStrategy::Drop => {
            let keep: Vec<bool> = (0..rows_before)
                .map(|r| !table.columns().any(|(_, c)| c.is_missing(r)))
                .collect();
            table.retain_rows(&keep);
        }
        MissingStrategy::Fill => {
            let value = fill_value.cloned().unwrap_or(CellValue::Integer(0));
            for column in table.columns_mut() {
                fill_column(column, &value);
            }
        }
        MissingStrategy::ForwardFill => {
            for column in table.columns_mut() {
                match column {
                    Column::Integer(cells) => forward_fill(cells),
                    Column::Float(cells) => forward_fill(cells),
                    Column::Text(cells) => forward_fill(cells),
                    Column::Boolean(cells) => forward_fill(cells),
                }
            }
        }
    }

    StepRecord::new(
        "handle_missing_values",
        StepMetrics::HandleMissing {
            strategy: requested.to_string(),
            applied: strategy.to_string(),
            missing_before,
            missing_after: table.missing_count(),
            rows_removed: rows_before - table.row_count(),
        },
    )
    .with_warnings(warnings)
}

fn forward_fill<T: Clone>(cells: &mut [Option<T>]) {
    let mut last: Option<T> = None;
    for cell in cells.iter_mut() {
        match cell {
            Some(v) => last = Some(v.clone()),
            None => *cell = last.clone(),
        }
    }
}

fn fill_with<T: Clone>(cells: &mut [Option<T>], value: T) {
    for cell in cells.iter_mut().filter(|c| c.is_none()) {
        *cell = Some(value.clone());
    }
}

fn is_integral(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64
}

/// Fill a column's missing cells, widening its kind when the fill value
/// does not fit: fractional into integer → float, non-numeric into numeric
/// (or non-bool into bool) → text.
fn fill_column(column: &mut Column, value: &CellValue) {
    if value.is_missing() || column.missing_count() == 0 {
        return;
    }

    let widened = match (&*column, value) {
        (Column::Integer(_), CellValue::Integer(_))
        | (Column::Float(_), CellValue::Integer(_) | CellValue::Float(_))
        | (Column::Boolean(_), CellValue::Bool(_))
        | (Column::Text(_), _) => None,
        (Column::Integer(_), CellValue::Float(f)) if is_integral(*f) => None,
        (Column::Integer(cells), CellValue::Float(_)) => Some(Column::Float(
            cells.iter().map(|c| c.map(|i| i as f64)).collect(),
        )),
        _ => Some(column.to_text()),
    };
    if let Some(widened) = widened {
        *column = widened;
    }

    match column {
        Column::Integer(cells) => {
            let fill = match value {
                CellValue::Integer(i) => Some(*i),
                other => other.as_f64().map(|f| f as i64),
            };
            if let Some(fill) = fill {
                fill_with(cells, fill);
            }
        }
        Column::Float(cells) => {
            if let Some(fill) = value.as_f64() {
                fill_with(cells, fill);
            }
        }
        Column::Text(cells) => fill_with(cells, value.to_string()),
        Column::Boolean(cells) => {
            if let CellValue::Bool(b) = value {
                fill_with(cells, *b);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

fn remove_duplicates(table: &mut Table, subset: Option<&[String]>) -> Result<StepRecord> {
    let keys: Vec<&Column> = match subset {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|n| table.require(n))
            .collect::<Result<_>>()?,
        _ => table.columns().map(|(_, c)| c).collect(),
    };

    let rows_before = table.row_count();
    let mut seen: HashSet<Vec<CellValue>> = HashSet::with_capacity(rows_before);
    let keep: Vec<bool> = (0..rows_before)
        .map(|r| seen.insert(keys.iter().map(|c| c.get(r)).collect()))
        .collect();
    table.retain_rows(&keep);

    Ok(StepRecord::new(
        "remove_duplicates",
        StepMetrics::RemoveDuplicates {
            subset: subset.map(<[String]>::to_vec),
            rows_removed: rows_before - table.row_count(),
        },
    ))
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

fn clean_strings(table: &mut Table, columns: Option<&[String]>) -> StepRecord {
    let targets: Vec<String> = match columns {
        Some(names) => names
            .iter()
            .filter(|n| {
                let present = table.has_column(n);
                if !present {
                    log::warn!("clean_strings: column '{n}' not found, skipping");
                }
                present
            })
            .cloned()
            .collect(),
        None => table
            .columns()
            .filter(|(_, c)| matches!(c, Column::Text(_)))
            .map(|(n, _)| n.to_string())
            .collect(),
    };

    let mut cells_changed = 0;
    for name in &targets {
        let Some(column) = table.column_mut(name) else {
            continue;
        };
        if !matches!(column, Column::Text(_)) {
            *column = column.to_text();
        }
        if let Column::Text(cells) = column {
            for cell in cells.iter_mut().flatten() {
                let trimmed = cell.trim();
                if trimmed.len() != cell.len() {
                    *cell = trimmed.to_string();
                    cells_changed += 1;
                }
            }
        }
    }

    StepRecord::new(
        "clean_strings",
        StepMetrics::CleanStrings {
            columns_cleaned: targets,
            cells_changed,
        },
    )
}

// ---------------------------------------------------------------------------
// Type conversion
// ---------------------------------------------------------------------------

fn convert_types(table: &mut Table, conversions: &[(String, String)]) -> StepRecord {
    let mut converted = Vec::new();
    let mut warnings = Vec::new();

    for (name, target) in conversions {
        let outcome = target
            .parse::<TargetType>()
            .and_then(|ty| {
                let column = table
                    .column(name)
                    .ok_or_else(|| format!("column '{name}' not found"))?;
                convert_column(column, ty)
            })
            .and_then(|column| table.replace_column(name, column).map_err(|e| e.to_string()));

        match outcome {
            Ok(()) => converted.push(name.clone()),
            Err(message) => warnings.push(CleaningWarning::Conversion {
                column: name.clone(),
                target: target.clone(),
                message,
            }),
        }
    }

    StepRecord::new(
        "convert_types",
        StepMetrics::ConvertTypes {
            conversions: conversions.to_vec(),
            converted,
        },
    )
    .with_warnings(warnings)
}

/// Recast a whole column or fail without touching it.
fn convert_column(column: &Column, target: TargetType) -> std::result::Result<Column, String> {
    match target {
        TargetType::Text => Ok(column.to_text()),
        TargetType::Integer => match column {
            Column::Integer(_) => Ok(column.clone()),
            Column::Float(cells) => cells
                .iter()
                .map(|c| match c {
                    Some(f) if !f.is_finite() => {
                        Err("cannot convert non-finite values to integer".to_string())
                    }
                    Some(f) => Ok(Some(f.trunc() as i64)),
                    None => Ok(None),
                })
                .collect::<std::result::Result<_, _>>()
                .map(Column::Integer),
            Column::Text(cells) => cells
                .iter()
                .map(|c| match c {
                    Some(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(Some)
                        .map_err(|_| format!("invalid literal for int: '{s}'")),
                    None => Ok(None),
                })
                .collect::<std::result::Result<_, _>>()
                .map(Column::Integer),
            Column::Boolean(cells) => Ok(Column::Integer(
                cells.iter().map(|c| c.map(i64::from)).collect(),
            )),
        },
        TargetType::Float => match column {
            Column::Float(_) => Ok(column.clone()),
            Column::Integer(_) => Ok(Column::Float(column.numeric_cells())),
            Column::Text(cells) => cells
                .iter()
                .map(|c| match c {
                    Some(s) => s
                        .trim()
                        .parse::<f64>()
                        .map(|f| model::present(Some(f)))
                        .map_err(|_| format!("could not convert string to float: '{s}'")),
                    None => Ok(None),
                })
                .collect::<std::result::Result<_, _>>()
                .map(Column::Float),
            Column::Boolean(cells) => Ok(Column::Float(
                cells.iter().map(|c| c.map(|b| if b { 1.0 } else { 0.0 })).collect(),
            )),
        },
        TargetType::Boolean => match column {
            Column::Boolean(_) => Ok(column.clone()),
            Column::Integer(cells) => Ok(Column::Boolean(
                cells.iter().map(|c| c.map(|i| i != 0)).collect(),
            )),
            Column::Float(cells) => Ok(Column::Boolean(
                cells.iter().map(|c| c.map(|f| f != 0.0)).collect(),
            )),
            Column::Text(cells) => cells
                .iter()
                .map(|c| match c {
                    Some(s) => parse_bool(s)
                        .map(Some)
                        .ok_or_else(|| format!("invalid literal for bool: '{s}'")),
                    None => Ok(None),
                })
                .collect::<std::result::Result<_, _>>()
                .map(Column::Boolean),
        },
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Outliers
// ---------------------------------------------------------------------------

/// Coerce a column to numeric storage. Unparseable text becomes missing;
/// the second value counts those cells.
fn coerce_numeric(column: &Column) -> (Column, usize) {
    match column {
        Column::Integer(_) | Column::Float(_) => (column.clone(), 0),
        Column::Boolean(cells) => (
            Column::Integer(cells.iter().map(|c| c.map(i64::from)).collect()),
            0,
        ),
        Column::Text(cells) => {
            let mut coerced = 0;
            let values = cells
                .iter()
                .map(|c| {
                    let parsed = c.as_ref().and_then(|s| s.trim().parse::<f64>().ok());
                    let parsed = model::present(parsed);
                    if c.is_some() && parsed.is_none() {
                        coerced += 1;
                    }
                    parsed
                })
                .collect();
            (Column::Float(values), coerced)
        }
    }
}

fn remove_outliers(table: &mut Table, name: &str, method: OutlierMethod) -> Result<StepRecord> {
    let (numeric, cells_coerced) = coerce_numeric(table.require(name)?);
    let cells = numeric.numeric_cells();
    table.replace_column(name, numeric)?;

    let rows_before = table.row_count();
    let (lower, upper) = match method {
        OutlierMethod::Iqr => {
            let values: Vec<f64> = cells.iter().flatten().copied().collect();
            let q1 = stats::quantile(&values, 0.25);
            let q3 = stats::quantile(&values, 0.75);
            let iqr = q3 - q1;
            (q1 - 1.5 * iqr, q3 + 1.5 * iqr)
        }
    };

    // Missing values fail both comparisons and are dropped with the outliers.
    let keep: Vec<bool> = cells
        .iter()
        .map(|c| c.is_some_and(|v| v >= lower && v <= upper))
        .collect();
    table.retain_rows(&keep);

    Ok(StepRecord::new(
        "remove_outliers",
        StepMetrics::RemoveOutliers {
            column: name.to_string(),
            method: method.to_string(),
            lower_bound: (!lower.is_nan()).then_some(lower),
            upper_bound: (!upper.is_nan()).then_some(upper),
            cells_coerced,
            rows_removed: rows_before - table.row_count(),
        },
    ))
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Notified after every completed cleaning step.
pub trait StepObserver {
    fn on_step(&self, record: &StepRecord, table: &Table);
}

impl<F> StepObserver for F
where
    F: Fn(&StepRecord, &Table),
{
    fn on_step(&self, record: &StepRecord, table: &Table) {
        self(record, table)
    }
}

/// Reports each step through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl StepObserver for LogObserver {
    fn on_step(&self, record: &StepRecord, table: &Table) {
        log::info!(
            "{}: removed {} rows, now {} rows x {} columns",
            record.step,
            record.metrics.rows_removed(),
            table.row_count(),
            table.column_count()
        );
        for warning in &record.warnings {
            log::warn!("{warning}");
        }
    }
}

// ---------------------------------------------------------------------------
// Cleaner – fluent, stateful pipeline over an owned table
// ---------------------------------------------------------------------------

/// Applies cleaning steps to its own copy of a table and records each one.
///
/// ```
/// use tidy_panda::data::cleaner::{Cleaner, OutlierMethod};
/// use tidy_panda::data::model::{Column, Table};
///
/// let table = Table::from_columns([
///     ("name", Column::Text(vec![Some(" Ann ".into()), Some("Bo".into()), None])),
///     ("age", Column::Integer(vec![Some(31), Some(28), Some(40)])),
/// ])?;
///
/// let mut cleaner = Cleaner::new(&table);
/// cleaner
///     .handle_missing("drop", None)
///     .clean_strings()
///     .remove_outliers("age", OutlierMethod::Iqr)?;
///
/// let cleaned = cleaner.cleaned_data();
/// assert_eq!(cleaned.row_count(), 2);
/// assert_eq!(cleaner.report().steps_applied.len(), 3);
/// # Ok::<(), tidy_panda::PipelineError>(())
/// ```
pub struct Cleaner {
    table: Table,
    report: CleaningReport,
    observer: Option<Box<dyn StepObserver>>,
}

impl Cleaner {
    /// Start from an independent copy of `table`.
    pub fn new(table: &Table) -> Self {
        Self::from_owned(table.clone())
    }

    pub fn from_owned(table: Table) -> Self {
        let report = CleaningReport::new(table.row_count(), table.column_count());
        Self {
            table,
            report,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl StepObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// `drop`, `fill` or `forward_fill`. Fill defaults to `0`.
    pub fn handle_missing(&mut self, strategy: &str, fill_value: Option<CellValue>) -> &mut Self {
        let record = handle_missing(&mut self.table, strategy, fill_value.as_ref());
        self.commit(record)
    }

    /// Drop rows equal to an earlier row across all columns.
    pub fn remove_duplicates(&mut self) -> Result<&mut Self> {
        let record = remove_duplicates(&mut self.table, None)?;
        Ok(self.commit(record))
    }

    /// Drop rows equal to an earlier row on the given columns.
    pub fn remove_duplicates_by(&mut self, subset: &[&str]) -> Result<&mut Self> {
        let subset = owned(subset);
        let record = remove_duplicates(&mut self.table, Some(&subset))?;
        Ok(self.commit(record))
    }

    /// Trim every text column.
    pub fn clean_strings(&mut self) -> &mut Self {
        let record = clean_strings(&mut self.table, None);
        self.commit(record)
    }

    /// Trim the given columns, rendering non-text ones to text first.
    pub fn clean_strings_in(&mut self, columns: &[&str]) -> &mut Self {
        let record = clean_strings(&mut self.table, Some(&owned(columns)));
        self.commit(record)
    }

    /// Recast columns by `(column, type)` pairs. Failures become warnings.
    pub fn convert_types(&mut self, conversions: &[(&str, &str)]) -> &mut Self {
        let conversions: Vec<(String, String)> = conversions
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect();
        let record = convert_types(&mut self.table, &conversions);
        self.commit(record)
    }

    pub fn remove_outliers(&mut self, column: &str, method: OutlierMethod) -> Result<&mut Self> {
        let record = remove_outliers(&mut self.table, column, method)?;
        Ok(self.commit(record))
    }

    /// Apply a prepared step.
    pub fn apply(&mut self, step: &CleaningStep) -> Result<&mut Self> {
        let record = step.apply_in_place(&mut self.table)?;
        Ok(self.commit(record))
    }

    /// Current table without finalising the report.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Fill in the report's final counts and hand back the cleaned table.
    pub fn cleaned_data(&mut self) -> Table {
        self.report
            .finalize(self.table.row_count(), self.table.column_count());
        self.table.clone()
    }

    pub fn report(&self) -> &CleaningReport {
        &self.report
    }

    pub fn into_parts(mut self) -> (Table, CleaningReport) {
        self.report
            .finalize(self.table.row_count(), self.table.column_count());
        (self.table, self.report)
    }

    fn commit(&mut self, record: StepRecord) -> &mut Self {
        if let Some(observer) = &self.observer {
            observer.on_step(&record, &self.table);
        }
        self.report.push(record);
        self
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleaner")
            .field("table", &self.table)
            .field("report", &self.report)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::PipelineError;

    fn text(cells: &[Option<&str>]) -> Column {
        Column::Text(cells.iter().map(|c| c.map(str::to_string)).collect())
    }

    /// name/age/salary/city with padding, a duplicate, gaps and an outlier.
    fn messy() -> Table {
        Table::from_columns([
            (
                "name",
                text(&[Some("  Alice  "), Some("Bob"), Some("Charlie"), Some("Alice"), Some("  David")]),
            ),
            (
                "age",
                Column::Float(vec![Some(25.0), Some(30.0), None, Some(25.0), Some(150.0)]),
            ),
            (
                "salary",
                Column::Integer(vec![Some(50000), Some(60000), Some(55000), Some(50000), Some(75000)]),
            ),
            ("city", text(&[Some("NYC"), Some("  LA  "), Some("NYC"), Some("NYC"), None])),
        ])
        .unwrap()
    }

    #[test]
    fn drop_removes_rows_with_any_missing_cell() {
        let table = messy();
        let expected_removed = table.rows_with_missing();
        let mut cleaner = Cleaner::new(&table);
        let cleaned = cleaner.handle_missing("drop", None).cleaned_data();

        assert_eq!(cleaned.missing_count(), 0);
        assert_eq!(cleaned.row_count(), 3);
        match &cleaner.report().steps_applied[0].metrics {
            StepMetrics::HandleMissing {
                missing_before,
                missing_after,
                rows_removed,
                ..
            } => {
                assert_eq!(*missing_before, 2);
                assert_eq!(*missing_after, 0);
                assert_eq!(*rows_removed, expected_removed);
            }
            other => panic!("unexpected metrics {other:?}"),
        }
        // caller's table untouched
        assert_eq!(table.row_count(), 5);
    }

    #[test]
    fn fill_defaults_to_zero_and_renders_text() {
        let mut cleaner = Cleaner::new(&messy());
        let cleaned = cleaner.handle_missing("fill", None).cleaned_data();

        assert_eq!(cleaned.missing_count(), 0);
        assert_eq!(cleaned.column("age").unwrap().get(2), CellValue::Float(0.0));
        assert_eq!(cleaned.column("city").unwrap().get(4), CellValue::Text("0".into()));
    }

    #[test]
    fn fill_widens_integer_column_for_fractional_value() {
        let table = Table::from_columns([("n", Column::Integer(vec![Some(1), None]))]).unwrap();
        let mut cleaner = Cleaner::new(&table);
        let cleaned = cleaner
            .handle_missing("fill", Some(CellValue::Float(0.5)))
            .cleaned_data();
        assert_eq!(cleaned.column("n"), Some(&Column::Float(vec![Some(1.0), Some(0.5)])));
    }

    #[test]
    fn forward_fill_leaves_leading_gaps() {
        let table = Table::from_columns([(
            "v",
            Column::Integer(vec![None, Some(1), None, None, Some(4), None]),
        )])
        .unwrap();
        let mut cleaner = Cleaner::new(&table);
        let cleaned = cleaner.handle_missing("forwardFill", None).cleaned_data();
        assert_eq!(
            cleaned.column("v"),
            Some(&Column::Integer(vec![None, Some(1), Some(1), Some(1), Some(4), Some(4)]))
        );
        match &cleaner.report().steps_applied[0].metrics {
            StepMetrics::HandleMissing {
                missing_before,
                missing_after,
                ..
            } => assert_eq!((*missing_before, *missing_after), (4, 1)),
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn unknown_strategy_falls_back_to_drop_with_warning() {
        let mut cleaner = Cleaner::new(&messy());
        let cleaned = cleaner.handle_missing("interpolate", None).cleaned_data();

        assert_eq!(cleaned.row_count(), 3);
        let report = cleaner.report();
        assert_eq!(
            report.warnings().collect::<Vec<_>>(),
            vec![&CleaningWarning::UnknownStrategy {
                requested: "interpolate".into()
            }]
        );
    }

    #[test]
    fn remove_duplicates_keeps_first_and_is_idempotent() {
        let mut cleaner = Cleaner::new(&messy());
        cleaner.clean_strings().remove_duplicates().unwrap();
        let once = cleaner.table().clone();
        assert_eq!(once.row_count(), 4);

        cleaner.remove_duplicates().unwrap();
        assert_eq!(cleaner.table(), &once);
        assert_eq!(cleaner.report().steps_applied[2].metrics.rows_removed(), 0);
    }

    #[test]
    fn remove_duplicates_by_subset() {
        let mut cleaner = Cleaner::new(&messy());
        cleaner.remove_duplicates_by(&["city"]).unwrap();
        // NYC, "  LA  ", missing
        assert_eq!(cleaner.table().row_count(), 3);

        let err = cleaner.remove_duplicates_by(&["nope"]).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound { .. }));
        assert_eq!(cleaner.report().steps_applied.len(), 1);
    }

    #[test]
    fn clean_strings_trims_outer_whitespace_only() {
        let table = Table::from_columns([("s", text(&[Some("  a b  "), Some("\tc\n"), None]))]).unwrap();
        let mut cleaner = Cleaner::new(&table);
        cleaner.clean_strings();
        let once = cleaner.table().clone();
        assert_eq!(once.column("s"), Some(&text(&[Some("a b"), Some("c"), None])));

        cleaner.clean_strings();
        assert_eq!(cleaner.table(), &once);
        assert_eq!(once.row_count(), 3);
        match &cleaner.report().steps_applied[1].metrics {
            StepMetrics::CleanStrings { cells_changed, .. } => assert_eq!(*cells_changed, 0),
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn clean_strings_in_renders_numeric_columns_as_text() {
        let mut cleaner = Cleaner::new(&messy());
        cleaner.clean_strings_in(&["salary", "missing"]);
        let table = cleaner.table();
        assert_eq!(table.column("salary").unwrap().get(0), CellValue::Text("50000".into()));
        match &cleaner.report().steps_applied[0].metrics {
            StepMetrics::CleanStrings { columns_cleaned, .. } => {
                assert_eq!(columns_cleaned, &vec!["salary".to_string()])
            }
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn convert_types_continues_past_a_failing_column() {
        let table = Table::from_columns([
            ("a", text(&[Some("1"), Some(" 2 "), None])),
            ("b", text(&[Some("x"), Some("2"), Some("3")])),
            ("c", Column::Float(vec![Some(1.9), Some(2.0), None])),
        ])
        .unwrap();
        let mut cleaner = Cleaner::new(&table);
        cleaner.convert_types(&[("a", "int"), ("b", "float"), ("c", "int"), ("d", "int")]);

        let t = cleaner.table();
        assert_eq!(t.column("a"), Some(&Column::Integer(vec![Some(1), Some(2), None])));
        assert_eq!(t.column("b"), table.column("b"));
        assert_eq!(t.column("c"), Some(&Column::Integer(vec![Some(1), Some(2), None])));

        let record = &cleaner.report().steps_applied[0];
        match &record.metrics {
            StepMetrics::ConvertTypes {
                conversions,
                converted,
            } => {
                assert_eq!(conversions.len(), 4);
                assert_eq!(conversions[1], ("b".to_string(), "float".to_string()));
                assert_eq!(converted, &vec!["a".to_string(), "c".to_string()]);
            }
            other => panic!("unexpected metrics {other:?}"),
        }
        assert_eq!(record.warnings.len(), 2);
    }

    #[test]
    fn nan_text_converts_to_missing() {
        let table = Table::from_columns([("v", text(&[Some("1.5"), Some("nan"), None]))]).unwrap();
        let mut cleaner = Cleaner::new(&table);
        cleaner.convert_types(&[("v", "float")]);
        let v = cleaner.table().column("v").unwrap();
        assert_eq!(v, &Column::Float(vec![Some(1.5), None, None]));
        assert_eq!(v.missing_count(), 2);

        cleaner.handle_missing("fill", Some(CellValue::Float(f64::NAN)));
        assert_eq!(cleaner.table().column("v").unwrap().missing_count(), 2);
    }

    #[test]
    fn remove_outliers_treats_nan_text_as_uncoercible() {
        let table = Table::from_columns([("v", text(&[Some("1"), Some("NaN"), Some("2"), Some("3")]))]).unwrap();
        let mut cleaner = Cleaner::new(&table);
        cleaner.remove_outliers("v", OutlierMethod::Iqr).unwrap();

        assert_eq!(cleaner.table().row_count(), 3);
        match &cleaner.report().steps_applied[0].metrics {
            StepMetrics::RemoveOutliers { cells_coerced, .. } => assert_eq!(*cells_coerced, 1),
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn remove_outliers_drops_values_outside_fences() {
        let mut cleaner = Cleaner::new(&messy());
        cleaner.remove_outliers("age", OutlierMethod::Iqr).unwrap();
        let t = cleaner.table();

        // 150 is an outlier, the missing age is dropped too
        assert_eq!(t.row_count(), 3);
        let ages = t.column("age").unwrap().numeric_values();
        assert!(ages.iter().all(|a| *a < 150.0));
    }

    #[test]
    fn remove_outliers_stays_within_pre_removal_fences() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 2.5, 3.0, 3.5, 4.0, 40.0, -30.0]
            .into_iter()
            .map(Some)
            .collect();
        let pre: Vec<f64> = values.iter().flatten().copied().collect();
        let q1 = stats::quantile(&pre, 0.25);
        let q3 = stats::quantile(&pre, 0.75);
        let (lo, hi) = (q1 - 1.5 * (q3 - q1), q3 + 1.5 * (q3 - q1));

        let table = Table::from_columns([("v", Column::Float(values))]).unwrap();
        let (after, record) = CleaningStep::RemoveOutliers {
            column: "v".into(),
            method: OutlierMethod::Iqr,
        }
        .apply(table)
        .unwrap();

        let kept = after.column("v").unwrap().numeric_values();
        assert!(kept.iter().all(|v| *v >= lo && *v <= hi));
        assert_eq!(record.metrics.rows_removed(), 2);
    }

    #[test]
    fn remove_outliers_coerces_text_and_counts_failures() {
        let table = Table::from_columns([("v", text(&[Some("1"), Some("2"), Some("oops"), Some("3")]))]).unwrap();
        let mut cleaner = Cleaner::new(&table);
        cleaner.remove_outliers("v", OutlierMethod::Iqr).unwrap();

        assert_eq!(cleaner.table().row_count(), 3);
        match &cleaner.report().steps_applied[0].metrics {
            StepMetrics::RemoveOutliers {
                cells_coerced,
                rows_removed,
                ..
            } => assert_eq!((*cells_coerced, *rows_removed), (1, 1)),
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn remove_outliers_on_missing_column_fails() {
        let mut cleaner = Cleaner::new(&messy());
        let err = cleaner.remove_outliers("height", OutlierMethod::Iqr).unwrap_err();
        assert_eq!(err.to_string(), "Column 'height' not found");
        assert!(cleaner.report().steps_applied.is_empty());
    }

    #[test]
    fn report_tracks_steps_and_final_counts() {
        let mut cleaner = Cleaner::new(&messy());
        cleaner.handle_missing("drop", None).remove_duplicates().unwrap();

        let report = cleaner.report();
        assert_eq!(report.original_rows, 5);
        assert_eq!(report.original_columns, 4);
        assert_eq!(report.steps_applied.len(), 2);
        assert_eq!(report.final_rows, None);

        let (table, report) = cleaner.into_parts();
        assert_eq!(report.final_rows, Some(table.row_count()));
        assert_eq!(report.final_columns, Some(4));
    }

    #[test]
    fn observer_sees_every_step() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut cleaner = Cleaner::new(&messy()).with_observer(move |r: &StepRecord, t: &Table| {
            sink.borrow_mut().push((r.step, t.row_count()));
        });
        cleaner.handle_missing("drop", None).clean_strings();

        assert_eq!(
            *seen.borrow(),
            vec![("handle_missing_values", 3), ("clean_strings", 3)]
        );
    }
}
