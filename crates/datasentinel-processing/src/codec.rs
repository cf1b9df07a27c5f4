//! Dataset readers and writers for every supported format

use crate::columnar::{read_parquet, write_parquet};
use crate::dataset::{Cell, Column, Dataset};
use crate::error::{ProcessingError, ProcessingResult};
use crate::format::FileFormat;
use serde_json::{Map, Value};
use std::collections::HashMap;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse `bytes` as a dataset in `format`.
pub fn read_dataset(bytes: &[u8], format: FileFormat) -> ProcessingResult<Dataset> {
    let dataset = match format {
        FileFormat::Csv => read_csv(bytes)?,
        FileFormat::Json => read_json(bytes)?,
        FileFormat::Parquet => read_parquet(bytes)?,
        FileFormat::Excel => {
            return Err(ProcessingError::UnsupportedFormat(format!(
                "{} files are not supported; use CSV, JSON or Parquet",
                format
            )))
        }
    };

    tracing::debug!(
        format = %format,
        rows = dataset.n_rows(),
        columns = dataset.n_columns(),
        "Dataset parsed"
    );

    Ok(dataset)
}

/// Serialize `dataset` in `format`.
pub fn write_dataset(dataset: &Dataset, format: FileFormat) -> ProcessingResult<Vec<u8>> {
    match format {
        FileFormat::Csv => write_csv(dataset),
        FileFormat::Json => write_json(dataset),
        FileFormat::Parquet => write_parquet(dataset),
        FileFormat::Excel => Err(ProcessingError::UnsupportedFormat(format!(
            "{} output is not supported; use CSV, JSON or Parquet",
            format
        ))),
    }
}

fn read_csv(bytes: &[u8]) -> ProcessingResult<Dataset> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ProcessingError::parse("csv", e))?
        .iter()
        .map(String::from)
        .collect();
    let headers = dedupe_headers(headers);

    let mut values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ProcessingError::parse("csv", e))?;
        if record.len() > headers.len() {
            return Err(ProcessingError::parse(
                "csv",
                format!(
                    "row {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    headers.len()
                ),
            ));
        }
        // Short rows are padded with missing values
        for (i, column) in values.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(values)
        .map(|(name, raw)| Column::from_raw(name, &raw))
        .collect();

    Dataset::new(columns)
}

/// Rename blank and repeated headers the way pandas does (`Unnamed: 2`, `a.1`).
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: Vec<String> = Vec::with_capacity(headers.len());

    for (i, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            header
        };

        let mut name = base.clone();
        while taken.contains(&name) {
            let n = counts.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{}.{}", base, n);
        }
        taken.push(name);
    }

    taken
}

fn read_json(bytes: &[u8]) -> ProcessingResult<Dataset> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| ProcessingError::parse("json", e))?;

    match value {
        Value::Array(records) => from_records(records),
        Value::Object(map) => {
            if map.values().all(Value::is_array) {
                from_column_arrays(map)
            } else if map.values().all(Value::is_object) {
                from_column_objects(map)
            } else {
                Err(ProcessingError::parse(
                    "json",
                    "object values must be all arrays or all objects",
                ))
            }
        }
        _ => Err(ProcessingError::parse(
            "json",
            "expected an array of records or an object of columns",
        )),
    }
}

fn from_records(records: Vec<Value>) -> ProcessingResult<Dataset> {
    let mut names: Vec<String> = Vec::new();
    let mut rows: Vec<Map<String, Value>> = Vec::with_capacity(records.len());

    for (i, record) in records.into_iter().enumerate() {
        let Value::Object(row) = record else {
            return Err(ProcessingError::parse(
                "json",
                format!("record {} is not an object", i),
            ));
        };
        for key in row.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
        rows.push(row);
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let cells = rows
                .iter()
                .map(|row| row.get(&name).map(json_to_cell).unwrap_or(Cell::Null))
                .collect();
            Column::new(name, cells)
        })
        .collect();

    Dataset::new(columns)
}

fn from_column_arrays(map: Map<String, Value>) -> ProcessingResult<Dataset> {
    let columns = map
        .into_iter()
        .map(|(name, values)| {
            let cells = match values {
                Value::Array(items) => items.iter().map(json_to_cell).collect(),
                _ => Vec::new(),
            };
            Column::new(name, cells)
        })
        .collect();

    Dataset::new(columns)
}

/// `{"col": {"0": v, "1": v}}`, the pandas default JSON layout
fn from_column_objects(map: Map<String, Value>) -> ProcessingResult<Dataset> {
    let mut index: Vec<String> = Vec::new();
    for column in map.values() {
        if let Value::Object(entries) = column {
            for key in entries.keys() {
                if !index.contains(key) {
                    index.push(key.clone());
                }
            }
        }
    }

    let columns = map
        .into_iter()
        .map(|(name, column)| {
            let cells = index
                .iter()
                .map(|key| column.get(key).map(json_to_cell).unwrap_or(Cell::Null))
                .collect();
            Column::new(name, cells)
        })
        .collect();

    Dataset::new(columns)
}

fn json_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        },
        Value::String(s) => Cell::Text(s.clone()),
        nested => Cell::Text(nested.to_string()),
    }
}

fn write_csv(dataset: &Dataset) -> ProcessingResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(dataset.columns().iter().map(|c| c.name.as_str()))
        .map_err(|e| ProcessingError::serialize("csv", e))?;

    for row in 0..dataset.n_rows() {
        writer
            .write_record(dataset.columns().iter().map(|c| c.cells()[row].to_string()))
            .map_err(|e| ProcessingError::serialize("csv", e))?;
    }

    writer
        .into_inner()
        .map_err(|e| ProcessingError::serialize("csv", e))
}

/// Rows as `[{"col": value, ...}]`, keys in column order.
pub fn dataset_to_records(dataset: &Dataset) -> Vec<Value> {
    (0..dataset.n_rows())
        .map(|row| {
            let record: Map<String, Value> = dataset
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.cells()[row].to_json()))
                .collect();
            Value::Object(record)
        })
        .collect()
}

fn write_json(dataset: &Dataset) -> ProcessingResult<Vec<u8>> {
    serde_json::to_vec(&Value::Array(dataset_to_records(dataset)))
        .map_err(|e| ProcessingError::serialize("json", e))
}
