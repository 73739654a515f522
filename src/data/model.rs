use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value. `Missing` is the missing marker and is
/// distinct from every valid value regardless of the column kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Missing,
}

// -- Manual Eq/Ord/Hash so cells can key sets and maps --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Missing => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Missing, Missing) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            // -0.0 == 0.0, so they must hash alike
            CellValue::Float(f) => {
                let f = if *f == 0.0 { 0.0 } else { *f };
                f.to_bits().hash(state)
            }
            CellValue::Bool(b) => b.hash(state),
            CellValue::Missing => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{}", format_float(*v)),
            CellValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            CellValue::Missing => write!(f, "NaN"),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

/// `NaN` is the missing marker for floats.
impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            CellValue::Missing
        } else {
            CellValue::Float(v)
        }
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// `Missing`, or a float that is `NaN`.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }
}

/// Store a float cell, treating `NaN` as missing.
pub fn present(v: Option<f64>) -> Option<f64> {
    v.filter(|f| !f.is_nan())
}

/// Render a float the way tabular tools print it: integral values keep a
/// trailing `.0` so `25.0` never reads as an integer.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// Column – tagged storage, one variant per kind
// ---------------------------------------------------------------------------

/// The value kind a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "int64",
            ColumnKind::Float => "float64",
            ColumnKind::Text => "object",
            ColumnKind::Boolean => "bool",
        };
        write!(f, "{name}")
    }
}

/// A homogeneous column. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
}

impl Column {
    /// Build a column from loosely-typed cells, choosing the narrowest kind
    /// that holds every non-missing value:
    ///
    /// * all missing          → `Float`
    /// * integers only        → `Integer`
    /// * integers and floats  → `Float`
    /// * booleans only        → `Boolean`
    /// * anything else        → `Text` (values rendered to text)
    pub fn from_values(values: Vec<CellValue>) -> Self {
        let mut has_int = false;
        let mut has_float = false;
        let mut has_bool = false;
        let mut has_text = false;
        for v in &values {
            match v {
                CellValue::Integer(_) => has_int = true,
                CellValue::Float(f) => has_float |= !f.is_nan(),
                CellValue::Bool(_) => has_bool = true,
                CellValue::Text(_) => has_text = true,
                CellValue::Missing => {}
            }
        }

        if has_text || (has_bool && (has_int || has_float)) {
            return Column::Text(
                values
                    .into_iter()
                    .map(|v| (!v.is_missing()).then(|| v.to_string()))
                    .collect(),
            );
        }
        if has_bool {
            return Column::Boolean(
                values
                    .into_iter()
                    .map(|v| match v {
                        CellValue::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect(),
            );
        }
        if has_int && !has_float {
            return Column::Integer(
                values
                    .into_iter()
                    .map(|v| match v {
                        CellValue::Integer(i) => Some(i),
                        _ => None,
                    })
                    .collect(),
            );
        }
        Column::Float(values.iter().map(CellValue::as_f64).map(present).collect())
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Integer(_) => ColumnKind::Integer,
            Column::Float(_) => ColumnKind::Float,
            Column::Text(_) => ColumnKind::Text,
            Column::Boolean(_) => ColumnKind::Boolean,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Integer(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Integer(v) => v[row].is_none(),
            Column::Float(v) => v[row].is_none(),
            Column::Text(v) => v[row].is_none(),
            Column::Boolean(v) => v[row].is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    /// The cell at `row` as a [`CellValue`].
    pub fn get(&self, row: usize) -> CellValue {
        match self {
            Column::Integer(v) => v[row].map_or(CellValue::Missing, CellValue::Integer),
            Column::Float(v) => v[row].map_or(CellValue::Missing, CellValue::Float),
            Column::Text(v) => v[row]
                .as_ref()
                .map_or(CellValue::Missing, |s| CellValue::Text(s.clone())),
            Column::Boolean(v) => v[row].map_or(CellValue::Missing, CellValue::Bool),
        }
    }

    /// Iterate over all cells in row order.
    pub fn values(&self) -> impl Iterator<Item = CellValue> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Non-missing values as `f64`; empty for non-numeric columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.numeric_cells().into_iter().flatten().collect()
    }

    /// Every cell as `Option<f64>`, keeping row positions.
    pub fn numeric_cells(&self) -> Vec<Option<f64>> {
        match self {
            Column::Integer(v) => v.iter().map(|c| c.map(|i| i as f64)).collect(),
            Column::Float(v) => v.clone(),
            Column::Text(v) => vec![None; v.len()],
            Column::Boolean(v) => vec![None; v.len()],
        }
    }

    /// Keep only the rows whose flag in `keep` is `true`.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        fn retain<T>(cells: &mut Vec<T>, keep: &[bool]) {
            let mut flags = keep.iter();
            cells.retain(|_| flags.next().copied().unwrap_or(false));
        }
        match self {
            Column::Integer(v) => retain(v, keep),
            Column::Float(v) => retain(v, keep),
            Column::Text(v) => retain(v, keep),
            Column::Boolean(v) => retain(v, keep),
        }
    }

    /// Render every cell to text, keeping missing cells missing.
    pub fn to_text(&self) -> Column {
        Column::Text(
            self.values()
                .map(|v| (!v.is_missing()).then(|| v.to_string()))
                .collect(),
        )
    }

    /// Rough heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        let cell = match self {
            Column::Integer(_) => std::mem::size_of::<Option<i64>>(),
            Column::Float(_) => std::mem::size_of::<Option<f64>>(),
            Column::Text(_) => std::mem::size_of::<Option<String>>(),
            Column::Boolean(_) => std::mem::size_of::<Option<bool>>(),
        };
        let payload: usize = match self {
            Column::Text(v) => v.iter().flatten().map(String::len).sum(),
            _ => 0,
        };
        cell * self.len() + payload
    }
}

// ---------------------------------------------------------------------------
// Table – ordered, uniquely named columns with a uniform row count
// ---------------------------------------------------------------------------

/// An in-memory columnar dataset.
///
/// Columns keep insertion order, names are unique and every column has the
/// same number of rows. All mutators uphold these invariants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, column)` pairs.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Table::new();
        for (name, column) in columns {
            table.add_column(name, column)?;
        }
        Ok(table)
    }

    /// Append a column, rejecting a duplicate name or a row-count mismatch.
    pub fn add_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(PipelineError::DuplicateColumn { name });
        }
        if !self.columns.is_empty() && column.len() != self.row_count() {
            return Err(PipelineError::LengthMismatch {
                name,
                expected: self.row_count(),
                actual: column.len(),
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Look up a column, failing with `ColumnNotFound`.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| PipelineError::column_not_found(name))
    }

    /// `(name, column)` pairs in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Swap in a replacement for an existing column of the same length.
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PipelineError::column_not_found(name))?;
        if column.len() != self.columns[idx].len() {
            return Err(PipelineError::LengthMismatch {
                name: name.to_string(),
                expected: self.columns[idx].len(),
                actual: column.len(),
            });
        }
        self.columns[idx] = column;
        Ok(())
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    /// In-place access for transformations that keep the row count.
    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.position(name).map(|i| &mut self.columns[i])
    }

    /// Keep only the rows flagged `true`, across every column.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            column.retain_rows(keep);
        }
    }

    /// The cells of one row, in column order.
    pub fn row(&self, row: usize) -> Vec<CellValue> {
        self.columns.iter().map(|c| c.get(row)).collect()
    }

    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    /// Number of rows with at least one missing cell.
    pub fn rows_with_missing(&self) -> usize {
        (0..self.row_count())
            .filter(|&r| self.columns.iter().any(|c| c.is_missing(r)))
            .count()
    }

    pub fn memory_usage(&self) -> usize {
        self.columns.iter().map(Column::memory_usage).sum::<usize>()
            + self.names.iter().map(String::len).sum::<usize>()
    }

    /// Render the first `n` rows as an aligned text grid.
    pub fn head(&self, n: usize) -> String {
        let rows = n.min(self.row_count());
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(rows + 1);
        let mut header = vec![String::new()];
        header.extend(self.names.iter().cloned());
        grid.push(header);
        for r in 0..rows {
            let mut line = vec![r.to_string()];
            line.extend(self.columns.iter().map(|c| c.get(r).to_string()));
            grid.push(line);
        }

        let widths: Vec<usize> = (0..grid[0].len())
            .map(|c| grid.iter().map(|l| l[c].chars().count()).max().unwrap_or(0))
            .collect();
        grid.iter()
            .map(|line| {
                line.iter()
                    .zip(&widths)
                    .map(|(cell, w)| format!("{cell:>w$}"))
                    .collect::<Vec<_>>()
                    .join("  ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 1;
            while seen.contains(&candidate) {
                candidate = format!("{name}.{n}");
                n += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_values_picks_narrowest_kind() {
        let ints = Column::from_values(vec![1i64.into(), CellValue::Missing, 3i64.into()]);
        assert_eq!(ints, Column::Integer(vec![Some(1), None, Some(3)]));

        let floats = Column::from_values(vec![1i64.into(), 2.5f64.into()]);
        assert_eq!(floats, Column::Float(vec![Some(1.0), Some(2.5)]));

        let mixed = Column::from_values(vec![1i64.into(), "x".into(), CellValue::Missing]);
        assert_eq!(
            mixed,
            Column::Text(vec![Some("1".into()), Some("x".into()), None])
        );

        let empty = Column::from_values(vec![CellValue::Missing, CellValue::Missing]);
        assert_eq!(empty.kind(), ColumnKind::Float);
    }

    #[test]
    fn nan_cells_count_as_missing() {
        assert!(CellValue::from(f64::NAN).is_missing());
        assert!(CellValue::Float(f64::NAN).is_missing());

        let ints = Column::from_values(vec![CellValue::Float(f64::NAN), 1i64.into()]);
        assert_eq!(ints, Column::Integer(vec![None, Some(1)]));
        assert_eq!(ints.missing_count(), 1);

        let floats = Column::from_values(vec![CellValue::Float(f64::NAN), 0.5f64.into()]);
        assert_eq!(floats, Column::Float(vec![None, Some(0.5)]));

        let mixed = Column::from_values(vec![CellValue::Float(f64::NAN), "x".into()]);
        assert_eq!(mixed, Column::Text(vec![None, Some("x".into())]));
    }

    #[test]
    fn add_column_rejects_duplicates_and_ragged_columns() {
        let mut t = Table::new();
        t.add_column("a", Column::Integer(vec![Some(1), Some(2)])).unwrap();
        assert!(matches!(
            t.add_column("a", Column::Integer(vec![Some(1), Some(2)])),
            Err(PipelineError::DuplicateColumn { .. })
        ));
        assert!(matches!(
            t.add_column("b", Column::Integer(vec![Some(1)])),
            Err(PipelineError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
        assert_eq!(t.column_count(), 1);
    }

    #[test]
    fn retain_rows_keeps_columns_aligned() {
        let mut t = Table::from_columns([
            ("a", Column::Integer(vec![Some(1), Some(2), Some(3)])),
            ("b", Column::Text(vec![Some("x".into()), None, Some("z".into())])),
        ])
        .unwrap();
        t.retain_rows(&[true, false, true]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.row(1), vec![CellValue::Integer(3), CellValue::Text("z".into())]);
    }

    #[test]
    fn negative_zero_hashes_like_zero() {
        let set: HashSet<CellValue> = [CellValue::Float(0.0), CellValue::Float(-0.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn dedupe_names_suffixes_repeats() {
        let names = dedupe_names(vec!["a".into(), "b".into(), "a".into(), "a".into()]);
        assert_eq!(names, vec!["a", "b", "a.1", "a.2"]);
    }

    #[test]
    fn float_rendering_keeps_decimal_point() {
        assert_eq!(format_float(25.0), "25.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(CellValue::Float(-3.0).to_string(), "-3.0");
    }
}
