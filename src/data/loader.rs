use std::fmt;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{open_workbook_auto, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::cleaner::parse_bool;
use super::model::{self, dedupe_names, CellValue, Column, Table};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Input formats, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileFormat {
    Csv,
    Json,
    Excel,
    Parquet,
}

impl FileFormat {
    /// Map a lower-cased, dot-free extension to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(FileFormat::Csv),
            "json" => Some(FileFormat::Json),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(FileFormat::Excel),
            "parquet" | "pq" => Some(FileFormat::Parquet),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Csv => "CSV",
            FileFormat::Json => "JSON",
            FileFormat::Excel => "Excel",
            FileFormat::Parquet => "Parquet",
        };
        f.write_str(name)
    }
}

/// Extension of `path`, lower-cased with the dot stripped.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – comma-separated with a header row
/// * `.json`    – array of objects, or an envelope object (see [`table_from_json`])
/// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – first sheet, first row is the header
/// * `.parquet` / `.pq` – flat columns of numbers, strings and booleans
pub fn load_file(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(PipelineError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let ext = file_extension(path);
    let format = FileFormat::from_extension(&ext)
        .ok_or(PipelineError::UnsupportedFormat { extension: ext })?;

    log::info!("Loading {format} file: {}", path.display());
    let table = match format {
        FileFormat::Csv => load_csv(path),
        FileFormat::Json => load_json(path),
        FileFormat::Excel => load_excel(path),
        FileFormat::Parquet => load_parquet(path),
    }?;
    log::info!(
        "Loaded {} rows and {} columns",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Summary of a loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    /// Rough in-memory footprint estimate.
    pub memory_usage_bytes: usize,
    /// Missing-cell count per column, in column order.
    pub missing_values: Vec<(String, usize)>,
}

impl DatasetInfo {
    pub fn of(table: &Table) -> Self {
        Self {
            rows: table.row_count(),
            columns: table.column_count(),
            column_names: table.column_names().to_vec(),
            memory_usage_bytes: table.memory_usage(),
            missing_values: table
                .columns()
                .map(|(n, c)| (n.to_string(), c.missing_count()))
                .collect(),
        }
    }

    pub fn memory_usage_kb(&self) -> String {
        format!("{:.2} KB", self.memory_usage_bytes as f64 / 1024.0)
    }
}

/// Stateful loader: remembers the path and the loaded table.
#[derive(Debug, Clone)]
pub struct DataLoader {
    path: PathBuf,
    data: Option<Table>,
}

impl DataLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased extension of the input path, without the dot.
    pub fn file_type(&self) -> String {
        file_extension(&self.path)
    }

    pub fn load(&mut self) -> Result<&Table> {
        let table = load_file(&self.path)?;
        Ok(&*self.data.insert(table))
    }

    /// The loaded table, or `None` before [`load`](Self::load).
    pub fn data(&self) -> Option<&Table> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Table> {
        self.data
    }

    pub fn info(&self) -> Result<DatasetInfo> {
        Ok(DatasetInfo::of(self.loaded()?))
    }

    /// First `n` rows as an aligned text grid.
    pub fn preview(&self, n: usize) -> Result<String> {
        Ok(self.loaded()?.head(n))
    }

    fn loaded(&self) -> Result<&Table> {
        self.data
            .as_ref()
            .ok_or_else(|| PipelineError::State("No data loaded. Call load() first.".into()))
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Cell texts read as missing.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn load_csv(path: &Path) -> Result<Table> {
    let fail = |e: csv::Error| PipelineError::parse(FileFormat::Csv, e);
    let mut reader = csv::Reader::from_path(path).map_err(fail)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(fail)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result.map_err(fail)?;
        for (col, value) in raw.iter_mut().zip(record.iter()) {
            col.push((!NA_TOKENS.contains(&value)).then(|| value.to_string()));
        }
    }

    let table = Table::from_columns(
        dedupe_names(headers)
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| (name, infer_text_column(cells))),
    )?;
    Ok(table)
}

/// Infer a column kind from raw text cells:
/// all `i64` → `Integer`, all `f64` → `Float` (`NaN` stored as missing),
/// all `true`/`false` → `Boolean`, otherwise `Text` with the strings
/// untouched.
pub fn infer_text_column(cells: Vec<Option<String>>) -> Column {
    let present = || cells.iter().flatten();

    if present().all(|s| s.trim().parse::<i64>().is_ok()) && present().next().is_some() {
        return Column::Integer(
            cells
                .iter()
                .map(|c| c.as_ref().and_then(|s| s.trim().parse().ok()))
                .collect(),
        );
    }
    if present().all(|s| s.trim().parse::<f64>().is_ok()) {
        return Column::Float(
            cells
                .iter()
                .map(|c| model::present(c.as_ref().and_then(|s| s.trim().parse().ok())))
                .collect(),
        );
    }
    if present().all(|s| parse_bool(s).is_some()) {
        return Column::Boolean(
            cells
                .iter()
                .map(|c| c.as_deref().and_then(parse_bool))
                .collect(),
        );
    }
    Column::Text(cells)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::parse(FileFormat::Json, e))?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| PipelineError::parse(FileFormat::Json, e))?;
    table_from_json(&root)
}

/// Normalise a JSON document into a flat table.
///
/// * Array root: each element is a row object.
/// * Object root: the **first** value (in document order) that is an array
///   becomes the row sequence. This is a compatibility shim for envelope
///   objects such as `{"meta": {...}, "records": [...]}`, not a general
///   mapping; later arrays are ignored.
/// * Object root without any array value: the object itself is one row.
///
/// Row keys become columns (union in first-seen order); absent keys and
/// `null` are missing. Nested objects/arrays are kept as JSON text.
pub fn table_from_json(root: &JsonValue) -> Result<Table> {
    match root {
        JsonValue::Array(rows) => rows_to_table(rows),
        JsonValue::Object(obj) => match obj.values().find_map(JsonValue::as_array) {
            Some(rows) => rows_to_table(rows),
            None => objects_to_table(&[obj]),
        },
        other => Err(PipelineError::parse(
            FileFormat::Json,
            format!("expected a JSON array or object at the root, found {other}"),
        )),
    }
}

/// Rows are either all objects (keyed columns), all arrays (positional
/// columns `0`, `1`, ...) or all scalars (one column `0`). Mixing kinds is
/// a parse error.
fn rows_to_table(rows: &[JsonValue]) -> Result<Table> {
    if let Some(objects) = rows.iter().map(JsonValue::as_object).collect::<Option<Vec<_>>>() {
        return objects_to_table(&objects);
    }
    if let Some(arrays) = rows.iter().map(JsonValue::as_array).collect::<Option<Vec<_>>>() {
        let width = arrays.iter().map(|a| a.len()).max().unwrap_or(0);
        return Table::from_columns((0..width).map(|i| {
            let values = arrays
                .iter()
                .map(|row| row.get(i).map_or(CellValue::Missing, json_to_cell))
                .collect();
            (i.to_string(), Column::from_values(values))
        }));
    }
    if let Some(i) = rows.iter().position(|r| r.is_object() || r.is_array()) {
        return Err(PipelineError::parse(
            FileFormat::Json,
            format!("row {i} mixes nested rows with scalar values"),
        ));
    }
    Table::from_columns([("0", Column::from_values(rows.iter().map(json_to_cell).collect()))])
}

fn objects_to_table(objects: &[&Map<String, JsonValue>]) -> Result<Table> {
    let mut names: Vec<&String> = Vec::new();
    for obj in objects {
        for key in obj.keys() {
            if !names.contains(&key) {
                names.push(key);
            }
        }
    }

    Table::from_columns(names.into_iter().map(|name| {
        let values = objects
            .iter()
            .map(|obj| obj.get(name).map_or(CellValue::Missing, json_to_cell))
            .collect();
        (name.clone(), Column::from_values(values))
    }))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Missing,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// First worksheet only; its first row holds the column names.
fn load_excel(path: &Path) -> Result<Table> {
    let fail = |e: calamine::Error| PipelineError::parse(FileFormat::Excel, e);
    let mut workbook = open_workbook_auto(path).map_err(fail)?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::parse(FileFormat::Excel, "workbook has no sheets"))?;
    let range = workbook.worksheet_range(&first).map_err(fail)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::new());
    };
    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("Unnamed: {i}"),
            other => other.to_string(),
        })
        .collect();

    let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, col) in values.iter_mut().enumerate() {
            col.push(row.get(i).map_or(CellValue::Missing, excel_to_cell));
        }
    }

    Table::from_columns(
        dedupe_names(headers)
            .into_iter()
            .zip(values)
            .map(|(name, cells)| (name, Column::from_values(cells))),
    )
}

fn excel_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Integer(*i),
        // spreadsheets store every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => CellValue::Integer(*f as i64),
        Data::Float(f) => (*f).into(),
        Data::String(s) if NA_TOKENS.contains(&s.as_str()) => CellValue::Missing,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Empty | Data::Error(_) => CellValue::Missing,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of flat columns.
///
/// Integer, float, string and boolean Arrow types map onto the matching
/// column kinds; anything else is rendered as text.
fn load_parquet(path: &Path) -> Result<Table> {
    let fail = |e: &dyn fmt::Display| PipelineError::parse(FileFormat::Parquet, e);
    let file = std::fs::File::open(path).map_err(|e| fail(&e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| fail(&e))?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().map_err(|e| fail(&e))?;

    let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];
    for batch_result in reader {
        let batch = batch_result.map_err(|e| fail(&e))?;
        for (i, col) in values.iter_mut().enumerate() {
            col.extend(arrow_to_cells(batch.column(i))?);
        }
    }

    Table::from_columns(
        dedupe_names(names)
            .into_iter()
            .zip(values)
            .map(|(name, cells)| (name, Column::from_values(cells))),
    )
}

/// Convert one Arrow column to cells.
///
/// Numeric, string and boolean types keep their values; `UInt64` beyond
/// `i64::MAX` becomes a float. Every other type (dates, timestamps,
/// decimals, ...) is rendered as text by Arrow's display formatter.
fn arrow_to_cells(col: &ArrayRef) -> Result<Vec<CellValue>> {
    let cells = match col.data_type() {
        DataType::Utf8 => {
            let a = col.as_string::<i32>();
            cells_with(col, |r| CellValue::Text(a.value(r).to_string()))
        }
        DataType::LargeUtf8 => {
            let a = col.as_string::<i64>();
            cells_with(col, |r| CellValue::Text(a.value(r).to_string()))
        }
        DataType::Int8 => integers(col.as_primitive::<Int8Type>()),
        DataType::Int16 => integers(col.as_primitive::<Int16Type>()),
        DataType::Int32 => integers(col.as_primitive::<Int32Type>()),
        DataType::Int64 => integers(col.as_primitive::<Int64Type>()),
        DataType::UInt8 => integers(col.as_primitive::<UInt8Type>()),
        DataType::UInt16 => integers(col.as_primitive::<UInt16Type>()),
        DataType::UInt32 => integers(col.as_primitive::<UInt32Type>()),
        DataType::UInt64 => {
            let a = col.as_primitive::<UInt64Type>();
            cells_with(col, |r| {
                let v = a.value(r);
                i64::try_from(v).map_or(CellValue::Float(v as f64), CellValue::Integer)
            })
        }
        DataType::Float32 => {
            let a = col.as_primitive::<Float32Type>();
            cells_with(col, |r| f64::from(a.value(r)).into())
        }
        DataType::Float64 => {
            let a = col.as_primitive::<Float64Type>();
            cells_with(col, |r| a.value(r).into())
        }
        DataType::Boolean => {
            let a = col.as_boolean();
            cells_with(col, |r| CellValue::Bool(a.value(r)))
        }
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(col.as_ref(), &options)
                .map_err(|e| PipelineError::parse(FileFormat::Parquet, e))?;
            cells_with(col, |r| CellValue::Text(formatter.value(r).to_string()))
        }
    };
    Ok(cells)
}

fn cells_with(col: &ArrayRef, value: impl Fn(usize) -> CellValue) -> Vec<CellValue> {
    (0..col.len())
        .map(|row| {
            if col.is_null(row) {
                CellValue::Missing
            } else {
                value(row)
            }
        })
        .collect()
}

fn integers<T>(array: &PrimitiveArray<T>) -> Vec<CellValue>
where
    T: ArrowPrimitiveType,
    T::Native: Into<i64>,
{
    array
        .iter()
        .map(|v| v.map_or(CellValue::Missing, |v| CellValue::Integer(v.into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_object_uses_first_array() {
        let t = table_from_json(&json!({"records": [{"a": 1}, {"a": 2}]})).unwrap();
        assert_eq!((t.row_count(), t.column_count()), (2, 1));

        let t = table_from_json(&json!({
            "meta": {"source": "x"},
            "first": [{"a": 1}],
            "second": [{"b": 1}, {"b": 2}]
        }))
        .unwrap();
        assert_eq!(t.column_names(), &["a".to_string()]);
        assert_eq!(t.row_count(), 1);
    }

    #[test]
    fn object_without_array_is_single_row() {
        let t = table_from_json(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!((t.row_count(), t.column_count()), (1, 2));
        assert_eq!(t.column_names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn array_rows_union_keys_in_first_seen_order() {
        let t = table_from_json(&json!([
            {"name": "Ann", "age": 31},
            {"age": 28, "city": "LA"},
            {"name": null, "age": 40.5}
        ]))
        .unwrap();

        assert_eq!(t.column_names(), &["name", "age", "city"].map(String::from));
        assert_eq!(
            t.column("name"),
            Some(&Column::Text(vec![Some("Ann".into()), None, None]))
        );
        assert_eq!(
            t.column("age"),
            Some(&Column::Float(vec![Some(31.0), Some(28.0), Some(40.5)]))
        );
        assert_eq!(t.column("city").unwrap().missing_count(), 2);
    }

    #[test]
    fn scalar_rows_form_column_zero() {
        let t = table_from_json(&json!({"tags": ["a", "b"], "records": [{"a": 1}]})).unwrap();
        assert_eq!(t.column_names(), &["0".to_string()]);
        assert_eq!(
            t.column("0"),
            Some(&Column::Text(vec![Some("a".into()), Some("b".into())]))
        );

        let t = table_from_json(&json!([1, null, 3])).unwrap();
        assert_eq!(t.column("0"), Some(&Column::Integer(vec![Some(1), None, Some(3)])));
    }

    #[test]
    fn array_rows_form_positional_columns() {
        let t = table_from_json(&json!([[1, "x"], [2]])).unwrap();
        assert_eq!(t.column_names(), &["0".to_string(), "1".to_string()]);
        assert_eq!(t.column("1"), Some(&Column::Text(vec![Some("x".into()), None])));
    }

    #[test]
    fn mixed_rows_and_scalar_roots_are_parse_errors() {
        assert!(matches!(
            table_from_json(&json!([{"a": 1}, 2])),
            Err(PipelineError::Parse { format: FileFormat::Json, .. })
        ));
        assert!(matches!(
            table_from_json(&json!("text")),
            Err(PipelineError::Parse { .. })
        ));
    }

    #[test]
    fn nan_tokens_and_values_are_missing() {
        let raw: Vec<Option<String>> = ["1.5", "-nan", "NaN", "2.5"]
            .iter()
            .map(|c| (!NA_TOKENS.contains(c)).then(|| c.to_string()))
            .collect();
        assert_eq!(
            infer_text_column(raw),
            Column::Float(vec![Some(1.5), None, None, Some(2.5)])
        );

        // spellings outside the token list still parse to NaN
        let col = infer_text_column(vec![Some("1.5".into()), Some("nAn".into())]);
        assert_eq!(col, Column::Float(vec![Some(1.5), None]));
    }

    #[test]
    fn nested_values_become_json_text() {
        let t = table_from_json(&json!([{"tags": ["a", "b"]}])).unwrap();
        assert_eq!(t.column("tags").unwrap().get(0), CellValue::Text("[\"a\",\"b\"]".into()));
    }

    #[test]
    fn text_inference_prefers_narrowest_kind() {
        let cells = |v: &[Option<&str>]| v.iter().map(|c| c.map(String::from)).collect::<Vec<_>>();

        assert_eq!(
            infer_text_column(cells(&[Some("1"), None, Some(" 3")])),
            Column::Integer(vec![Some(1), None, Some(3)])
        );
        assert_eq!(
            infer_text_column(cells(&[Some("1"), Some("2.5")])),
            Column::Float(vec![Some(1.0), Some(2.5)])
        );
        assert_eq!(
            infer_text_column(cells(&[Some("True"), Some("false")])),
            Column::Boolean(vec![Some(true), Some(false)])
        );
        assert_eq!(
            infer_text_column(cells(&[Some(" Alice "), Some("3")])),
            Column::Text(vec![Some(" Alice ".into()), Some("3".into())])
        );
        assert_eq!(infer_text_column(cells(&[None, None])).kind(), crate::data::model::ColumnKind::Float);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_extension("csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("xlsx"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_extension("xyz"), None);
        assert_eq!(file_extension(Path::new("data/Report.JSON")), "json");
    }

    #[test]
    fn info_before_load_is_a_state_error() {
        let loader = DataLoader::new("data/sample.csv");
        assert!(matches!(loader.info(), Err(PipelineError::State(_))));
        assert!(matches!(loader.preview(5), Err(PipelineError::State(_))));
    }
}
