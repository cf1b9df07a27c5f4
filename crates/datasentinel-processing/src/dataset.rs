//! In-memory columnar dataset
//!
//! A [`Dataset`] is an ordered list of equally long, uniquely named
//! [`Column`]s. Every column carries a single [`DType`]; its non-null cells
//! are of that type.

use crate::error::{ProcessingError, ProcessingResult};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Strings read as missing values
pub const NULL_TOKENS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

const DATETIME_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

/// A single value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// `Null` and NaN floats are both missing values.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the cell (ints widened, NaN is `None`).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Hashable identity used for duplicate and distinct counting.
    pub fn key(&self) -> CellKey {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Int(v) => CellKey::Int(*v),
            Cell::Float(v) if v.is_nan() => CellKey::Null,
            // -0.0 and 0.0 are the same value
            Cell::Float(v) => CellKey::Float(if *v == 0.0 { 0 } else { v.to_bits() }),
            Cell::Bool(v) => CellKey::Bool(*v),
            Cell::Text(s) => CellKey::Text(s.clone()),
            Cell::DateTime(dt) => CellKey::DateTime(*dt),
        }
    }

    /// JSON representation. Datetimes are written as ISO-8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Int(v) => serde_json::Value::from(*v),
            Cell::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Bool(v) => serde_json::Value::Bool(*v),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }

    fn kind(&self) -> Option<DType> {
        match self {
            _ if self.is_null() => None,
            Cell::Int(_) => Some(DType::Int64),
            Cell::Float(_) => Some(DType::Float64),
            Cell::Bool(_) => Some(DType::Bool),
            Cell::Text(_) => Some(DType::Text),
            Cell::DateTime(_) => Some(DType::DateTime),
            Cell::Null => None,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) if v.is_nan() => Ok(()),
            Cell::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{:.1}", v)
            }
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

/// Column type, named after the pandas dtypes the reports expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Text,
    DateTime,
}

impl DType {
    pub fn pandas_name(&self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Text => "object",
            DType::DateTime => "datetime64[ns]",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int64 | DType::Float64)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.pandas_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    dtype: DType,
    cells: Vec<Cell>,
}

impl Column {
    /// Build a column from typed cells, inferring the dtype.
    ///
    /// Ints mixed with floats widen to `Float64`; any other mix falls back to
    /// `Text` using each value's display form.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let kinds: HashSet<DType> = cells.iter().filter_map(Cell::kind).collect();

        let dtype = if kinds.is_empty() {
            DType::Float64
        } else if kinds.len() == 1 {
            kinds.into_iter().next().unwrap_or(DType::Text)
        } else if kinds.iter().all(|k| k.is_numeric()) {
            DType::Float64
        } else {
            DType::Text
        };

        Self::with_dtype(name, dtype, cells)
    }

    /// Build a column from raw text values such as CSV fields.
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let present: Vec<&str> = values
            .iter()
            .map(|v| v.as_ref())
            .filter(|v| !is_null_token(v))
            .collect();

        let dtype = if present.is_empty() {
            DType::Float64
        } else if present.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
            DType::Int64
        } else if present.iter().all(|v| parse_float(v).is_some()) {
            DType::Float64
        } else if present.iter().all(|v| parse_bool(v).is_some()) {
            DType::Bool
        } else {
            DType::Text
        };

        let cells = values
            .iter()
            .map(|v| {
                let v = v.as_ref();
                if is_null_token(v) {
                    return Cell::Null;
                }
                match dtype {
                    DType::Int64 => v.trim().parse().map(Cell::Int).unwrap_or(Cell::Null),
                    DType::Float64 => parse_float(v)
                        .filter(|f| f.is_finite())
                        .map(Cell::Float)
                        .unwrap_or(Cell::Null),
                    DType::Bool => parse_bool(v).map(Cell::Bool).unwrap_or(Cell::Null),
                    _ => Cell::Text(v.to_string()),
                }
            })
            .collect();

        Column {
            name: name.into(),
            dtype,
            cells,
        }
    }

    /// Build a column with an explicit dtype, coercing cells that do not fit.
    pub fn with_dtype(name: impl Into<String>, dtype: DType, cells: Vec<Cell>) -> Self {
        let cells = cells
            .into_iter()
            .map(|cell| coerce(cell, dtype))
            .collect();
        Column {
            name: name.into(),
            dtype,
            cells,
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_null()).count()
    }

    /// Number of distinct non-null values
    pub fn unique_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| !c.is_null())
            .map(Cell::key)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Per-row numeric view; `None` for nulls and non-numeric cells.
    pub fn numeric(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(Cell::as_f64).collect()
    }

    /// Non-null numeric values in row order
    pub fn numeric_values(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_f64).collect()
    }
}

/// Coerce a cell into `dtype`; anything that cannot be represented becomes null,
/// including infinite floats.
fn coerce(cell: Cell, dtype: DType) -> Cell {
    if cell.is_null() {
        return Cell::Null;
    }
    match (dtype, cell) {
        (DType::Int64, Cell::Int(v)) => Cell::Int(v),
        (DType::Int64, Cell::Float(v)) if v.fract() == 0.0 => Cell::Int(v as i64),
        (DType::Float64, Cell::Int(v)) => Cell::Float(v as f64),
        (DType::Float64, Cell::Float(v)) if v.is_finite() => Cell::Float(v),
        (DType::Bool, Cell::Bool(v)) => Cell::Bool(v),
        (DType::DateTime, Cell::DateTime(v)) => Cell::DateTime(v),
        (DType::Text, Cell::Text(s)) => Cell::Text(s),
        (DType::Text, other) => Cell::Text(other.to_string()),
        _ => Cell::Null,
    }
}

pub fn is_null_token(value: &str) -> bool {
    NULL_TOKENS.contains(&value.trim())
}

/// Infinity tokens parse so the column stays numeric; callers null them.
fn parse_float(value: &str) -> Option<f64> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        _ => value.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Ordered collection of equally long columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Assemble a dataset, rejecting ragged columns and duplicate names.
    pub fn new(columns: Vec<Column>) -> ProcessingResult<Self> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
                return Err(ProcessingError::InvalidInput(format!(
                    "Column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    rows
                )));
            }
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ProcessingError::InvalidInput(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Dataset { columns })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Append a column at the end.
    pub fn push_column(&mut self, column: Column) -> ProcessingResult<()> {
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(ProcessingError::InvalidInput(format!(
                "Column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.n_rows()
            )));
        }
        if self.column(&column.name).is_some() {
            return Err(ProcessingError::InvalidInput(format!(
                "Duplicate column name '{}'",
                column.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_key(&self, row: usize) -> Vec<CellKey> {
        self.columns.iter().map(|c| c.cells[row].key()).collect()
    }

    /// Rows identical to an earlier row
    pub fn duplicate_row_count(&self) -> usize {
        let mut seen = HashSet::new();
        (0..self.n_rows())
            .filter(|&row| !seen.insert(self.row_key(row)))
            .count()
    }

    /// Approximate deep memory footprint in bytes, in the spirit of
    /// `DataFrame.memory_usage(deep=True)`.
    pub fn memory_usage_bytes(&self) -> usize {
        const INDEX_BYTES: usize = 128;
        const PY_STR_OVERHEAD: usize = 49;
        const PY_FLOAT_OBJECT: usize = 24;

        let columns: usize = self
            .columns
            .iter()
            .map(|column| match column.dtype {
                DType::Bool => column.len(),
                DType::Int64 | DType::Float64 | DType::DateTime => column.len() * 8,
                DType::Text => column
                    .cells
                    .iter()
                    .map(|cell| {
                        8 + match cell {
                            Cell::Text(s) => PY_STR_OVERHEAD + s.len(),
                            _ => PY_FLOAT_OBJECT,
                        }
                    })
                    .sum(),
            })
            .sum();

        INDEX_BYTES + columns
    }

    /// New dataset holding the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                dtype: c.dtype,
                cells: rows.iter().map(|&r| c.cells[r].clone()).collect(),
            })
            .collect();
        Dataset { columns }
    }
}
