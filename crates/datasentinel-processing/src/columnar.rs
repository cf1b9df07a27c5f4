//! Parquet reader and writer over Arrow record batches

use crate::dataset::{Cell, Column, DType, Dataset};
use crate::error::{ProcessingError, ProcessingResult};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, TimeUnit, TimestampMicrosecondType,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

const FORMAT: &str = "parquet";

pub(crate) fn read_parquet(bytes: &[u8]) -> ProcessingResult<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))
        .map_err(|e| ProcessingError::parse(FORMAT, e))?;

    let schema = builder.schema().clone();
    let targets: Vec<(DType, DataType)> = schema
        .fields()
        .iter()
        .map(|field| target_type(field.as_ref()))
        .collect::<ProcessingResult<_>>()?;

    let reader = builder
        .build()
        .map_err(|e| ProcessingError::parse(FORMAT, e))?;

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); targets.len()];
    for batch in reader {
        let batch = batch.map_err(|e| ProcessingError::parse(FORMAT, e))?;
        for (i, (dtype, arrow_type)) in targets.iter().enumerate() {
            let array = cast(batch.column(i).as_ref(), arrow_type)
                .map_err(|e| ProcessingError::parse(FORMAT, e))?;
            cells[i].extend(array_cells(&array, *dtype));
        }
    }

    let columns = schema
        .fields()
        .iter()
        .zip(targets)
        .zip(cells)
        .map(|((field, (dtype, _)), cells)| Column::with_dtype(field.name(), dtype, cells))
        .collect();

    Dataset::new(columns)
}

/// Dataset dtype for a Parquet column, and the Arrow type its values are
/// cast to before conversion.
fn target_type(field: &Field) -> ProcessingResult<(DType, DataType)> {
    let timestamp = DataType::Timestamp(TimeUnit::Microsecond, None);
    let target = match field.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => (DType::Int64, DataType::Int64),
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _)
        | DataType::Null => (DType::Float64, DataType::Float64),
        DataType::Boolean => (DType::Bool, DataType::Boolean),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            (DType::DateTime, timestamp)
        }
        other if can_cast_types(other, &DataType::Utf8) => (DType::Text, DataType::Utf8),
        other => {
            return Err(ProcessingError::UnsupportedFormat(format!(
                "parquet column '{}' has unsupported type {}",
                field.name(),
                other
            )))
        }
    };
    Ok(target)
}

fn array_cells(array: &ArrayRef, dtype: DType) -> Vec<Cell> {
    (0..array.len())
        .map(|row| {
            if array.is_null(row) {
                return Cell::Null;
            }
            match dtype {
                DType::Int64 => Cell::Int(array.as_primitive::<Int64Type>().value(row)),
                DType::Float64 => Cell::Float(array.as_primitive::<Float64Type>().value(row)),
                DType::Bool => Cell::Bool(array.as_boolean().value(row)),
                DType::Text => Cell::Text(array.as_string::<i32>().value(row).to_string()),
                DType::DateTime => {
                    let micros = array.as_primitive::<TimestampMicrosecondType>().value(row);
                    DateTime::from_timestamp_micros(micros)
                        .map(|dt| Cell::DateTime(dt.naive_utc()))
                        .unwrap_or(Cell::Null)
                }
            }
        })
        .collect()
}

/// Snappy-compressed Parquet, one row group.
pub(crate) fn write_parquet(dataset: &Dataset) -> ProcessingResult<Vec<u8>> {
    let fields: Vec<Field> = dataset
        .columns()
        .iter()
        .map(|c| Field::new(c.name.as_str(), arrow_type(c.dtype()), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = dataset.columns().iter().map(column_array).collect();
    let options = RecordBatchOptions::new().with_row_count(Some(dataset.n_rows()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)
        .map_err(|e| ProcessingError::serialize(FORMAT, e))?;

    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(Vec::new(), schema, Some(properties))
        .map_err(|e| ProcessingError::serialize(FORMAT, e))?;
    writer
        .write(&batch)
        .map_err(|e| ProcessingError::serialize(FORMAT, e))?;
    writer
        .into_inner()
        .map_err(|e| ProcessingError::serialize(FORMAT, e))
}

fn arrow_type(dtype: DType) -> DataType {
    match dtype {
        DType::Int64 => DataType::Int64,
        DType::Float64 => DataType::Float64,
        DType::Bool => DataType::Boolean,
        DType::Text => DataType::Utf8,
        DType::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
    }
}

fn column_array(column: &Column) -> ArrayRef {
    let cells = column.cells();
    match column.dtype() {
        DType::Int64 => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Int(v) => Some(*v),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DType::Float64 => Arc::new(cells.iter().map(Cell::as_f64).collect::<Float64Array>()),
        DType::Bool => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Bool(v) => Some(*v),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        DType::Text => Arc::new(cells.iter().map(Cell::as_text).collect::<StringArray>()),
        DType::DateTime => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::DateTime(dt) => Some(dt.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>(),
        ),
    }
}
