//! Dataset normalization pipeline
//!
//! [`normalize`] runs, in order: drop empty columns, detect datetime text,
//! fill numeric gaps with the median, detect and treat outliers, encode
//! categorical text, and min-max scale every numeric column.

use crate::dataset::{Cell, Column, DType, Dataset};
use crate::error::ProcessingResult;
use crate::stats;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeSet;

pub const SAMPLE_SEED: u64 = 42;
const SAMPLE_FRACTION: f64 = 0.1;
const MIN_NORMALTEST_SAMPLES: usize = 8;
const NORMALITY_ALPHA: f64 = 0.05;
pub const OUTLIER_THRESHOLD: f64 = 1.5;
/// Columns with at most this share of outliers are cleaned, others winsorized
const CLEAN_MAX_PERCENT: f64 = 5.0;
const WINSOR_LIMIT: f64 = 0.05;
const ONE_HOT_MAX_CATEGORIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Iqr,
    Zscore,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlierSummary {
    pub method: OutlierMethod,
    /// Percentage of all rows flagged, per numeric column
    pub percentages: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
pub struct NormalizationOutcome {
    pub dataset: Dataset,
    pub outliers: OutlierSummary,
}

pub fn normalize(dataset: Dataset) -> ProcessingResult<NormalizationOutcome> {
    let dataset = drop_empty_columns(dataset)?;
    let dataset = convert_datetimes(dataset)?;
    let dataset = fill_numeric_medians(dataset)?;
    let outliers = detect_outliers(&dataset, None, OUTLIER_THRESHOLD);
    let dataset = clean_or_winsorize(dataset, &outliers.percentages)?;
    let dataset = encode_categorical(dataset)?;
    let dataset = scale_numeric(dataset)?;

    tracing::info!(
        rows = dataset.n_rows(),
        columns = dataset.n_columns(),
        outlier_method = ?outliers.method,
        "Dataset normalized"
    );

    Ok(NormalizationOutcome { dataset, outliers })
}

/// Output key: `raw/` becomes `normalized/`, extension becomes `_normalized.parquet`.
pub fn normalized_key(key: &str) -> String {
    let key = key.replacen("raw/", "normalized/", 1);
    let name_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem = match key[name_start..].rfind('.') {
        Some(idx) if idx > 0 => &key[..name_start + idx],
        _ => key.as_str(),
    };
    format!("{}_normalized.parquet", stem)
}

pub fn drop_empty_columns(dataset: Dataset) -> ProcessingResult<Dataset> {
    let columns = dataset
        .into_columns()
        .into_iter()
        .filter(|c| c.null_count() < c.len())
        .collect();
    Dataset::new(columns)
}

/// Parse common date and datetime spellings.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Text columns where more than half of all rows parse as datetimes become
/// datetime columns; unparsed values turn null.
pub fn convert_datetimes(dataset: Dataset) -> ProcessingResult<Dataset> {
    let rows = dataset.n_rows();
    let columns = dataset
        .into_columns()
        .into_iter()
        .map(|column| {
            if column.dtype() != DType::Text {
                return column;
            }
            let parsed: Vec<Option<NaiveDateTime>> = column
                .cells()
                .iter()
                .map(|c| c.as_text().and_then(parse_datetime))
                .collect();
            let hits = parsed.iter().filter(|p| p.is_some()).count();

            if hits as f64 > 0.5 * rows as f64 {
                let cells = parsed
                    .into_iter()
                    .map(|p| p.map(Cell::DateTime).unwrap_or(Cell::Null))
                    .collect();
                Column::with_dtype(column.name, DType::DateTime, cells)
            } else {
                column
            }
        })
        .collect();
    Dataset::new(columns)
}

pub fn fill_numeric_medians(dataset: Dataset) -> ProcessingResult<Dataset> {
    let columns = dataset
        .into_columns()
        .into_iter()
        .map(|column| {
            if !column.dtype().is_numeric() || column.null_count() == 0 {
                return column;
            }
            let Some(median) = stats::median(&column.numeric_values()) else {
                return column;
            };
            let dtype = if column.dtype() == DType::Int64 && median.fract() == 0.0 {
                DType::Int64
            } else {
                DType::Float64
            };
            let cells = column
                .cells()
                .iter()
                .map(|c| {
                    if c.is_null() {
                        Cell::Float(median)
                    } else {
                        c.clone()
                    }
                })
                .collect();
            Column::with_dtype(column.name, dtype, cells)
        })
        .collect();
    Dataset::new(columns)
}

/// Flag outliers in every numeric column.
///
/// Without an explicit method, a seeded 10% row sample is tested for
/// normality: z-score is used when every testable column looks normal,
/// IQR otherwise.
pub fn detect_outliers(
    dataset: &Dataset,
    method: Option<OutlierMethod>,
    threshold: f64,
) -> OutlierSummary {
    let numeric: Vec<&Column> = dataset
        .columns()
        .iter()
        .filter(|c| c.dtype().is_numeric())
        .collect();

    let method = method.unwrap_or_else(|| choose_method(dataset, &numeric));
    let rows = dataset.n_rows();

    let percentages = numeric
        .iter()
        .map(|column| {
            let values = column.numeric_values();
            let flagged = match method {
                OutlierMethod::Iqr => match stats::iqr_bounds(&values, threshold) {
                    Some((lo, hi)) => values.iter().filter(|&&v| v < lo || v > hi).count(),
                    None => 0,
                },
                OutlierMethod::Zscore => match (stats::mean(&values), stats::std(&values, 1)) {
                    (Some(m), Some(s)) if s > 0.0 => values
                        .iter()
                        .filter(|&&v| ((v - m) / s).abs() > threshold)
                        .count(),
                    _ => 0,
                },
            };
            let pct = if rows == 0 {
                0.0
            } else {
                flagged as f64 / rows as f64 * 100.0
            };
            (column.name.clone(), pct)
        })
        .collect();

    OutlierSummary {
        method,
        percentages,
    }
}

fn choose_method(dataset: &Dataset, numeric: &[&Column]) -> OutlierMethod {
    let rows = dataset.n_rows();
    let amount = ((rows as f64) * SAMPLE_FRACTION).round() as usize;
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let sample = rand::seq::index::sample(&mut rng, rows, amount.min(rows)).into_vec();

    let p_values: Vec<f64> = numeric
        .iter()
        .filter_map(|column| {
            let values: Vec<f64> = sample
                .iter()
                .filter_map(|&row| column.cells()[row].as_f64())
                .collect();
            if values.len() > MIN_NORMALTEST_SAMPLES {
                stats::normaltest(&values)
            } else {
                None
            }
        })
        .collect();

    if !p_values.is_empty() && p_values.iter().all(|&p| p > NORMALITY_ALPHA) {
        OutlierMethod::Zscore
    } else {
        OutlierMethod::Iqr
    }
}

/// Null out IQR outliers in lightly affected columns; winsorize the rest.
pub fn clean_or_winsorize(
    dataset: Dataset,
    percentages: &[(String, f64)],
) -> ProcessingResult<Dataset> {
    let columns = dataset
        .into_columns()
        .into_iter()
        .map(|column| {
            let Some(&(_, pct)) = percentages.iter().find(|(name, _)| *name == column.name) else {
                return column;
            };
            let dtype = column.dtype();
            let name = column.name.clone();
            let values = column.numeric_values();

            if pct <= CLEAN_MAX_PERCENT {
                let Some((lo, hi)) = stats::iqr_bounds(&values, OUTLIER_THRESHOLD) else {
                    return column;
                };
                let cells = column
                    .into_cells()
                    .into_iter()
                    .map(|c| match c.as_f64() {
                        Some(v) if v < lo || v > hi => Cell::Null,
                        _ => c,
                    })
                    .collect();
                Column::with_dtype(name, dtype, cells)
            } else {
                let mut clipped = stats::winsorize(&values, WINSOR_LIMIT, WINSOR_LIMIT).into_iter();
                let cells = column
                    .into_cells()
                    .into_iter()
                    .map(|c| {
                        if c.is_null() {
                            c
                        } else {
                            clipped.next().map(Cell::Float).unwrap_or(Cell::Null)
                        }
                    })
                    .collect();
                Column::with_dtype(name, dtype, cells)
            }
        })
        .collect();
    Dataset::new(columns)
}

/// One-hot encode low-cardinality text columns (appended at the end) and
/// label-encode the rest in place.
pub fn encode_categorical(dataset: Dataset) -> ProcessingResult<Dataset> {
    let mut kept = Vec::new();
    let mut appended = Vec::new();

    for column in dataset.into_columns() {
        if column.dtype() != DType::Text {
            kept.push(column);
            continue;
        }

        let has_null = column.null_count() > 0;
        let categories: BTreeSet<String> = column
            .cells()
            .iter()
            .filter_map(|c| c.as_text().map(String::from))
            .collect();

        if categories.len() <= ONE_HOT_MAX_CATEGORIES {
            appended.extend(one_hot(&column, &categories, has_null));
        } else {
            kept.push(label_encode(column));
        }
    }

    let mut result = Dataset::new(kept)?;
    for column in appended {
        result.push_column(column)?;
    }
    Ok(result)
}

fn one_hot(column: &Column, categories: &BTreeSet<String>, has_null: bool) -> Vec<Column> {
    let mut levels: Vec<Option<&str>> = categories.iter().map(|s| Some(s.as_str())).collect();
    if has_null {
        levels.push(None);
    }

    levels
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let cells = column
                .cells()
                .iter()
                .map(|c| {
                    let hit = match (level, c.as_text()) {
                        (Some(l), Some(v)) => *l == v,
                        (None, None) => true,
                        _ => false,
                    };
                    Cell::Float(if hit { 1.0 } else { 0.0 })
                })
                .collect();
            Column::with_dtype(format!("{}_{}", column.name, i), DType::Float64, cells)
        })
        .collect()
}

fn label_encode(column: Column) -> Column {
    let labels: Vec<String> = column
        .cells()
        .iter()
        .map(|c| if c.is_null() { "nan".to_string() } else { c.to_string() })
        .collect();
    let classes: Vec<&String> = labels.iter().collect::<BTreeSet<_>>().into_iter().collect();

    let cells = labels
        .iter()
        .map(|label| {
            let idx = classes.binary_search(&label).unwrap_or(0);
            Cell::Int(idx as i64)
        })
        .collect();
    Column::with_dtype(column.name, DType::Int64, cells)
}

/// Min-max scale numeric columns into `[0, 1]`; constant columns become 0.
/// Non-finite values are nulled before the bounds are taken.
pub fn scale_numeric(dataset: Dataset) -> ProcessingResult<Dataset> {
    let columns = dataset
        .into_columns()
        .into_iter()
        .map(|column| {
            if !column.dtype().is_numeric() {
                return column;
            }
            let values: Vec<f64> = column
                .numeric_values()
                .into_iter()
                .filter(|v| v.is_finite())
                .collect();
            let (Some(lo), Some(hi)) = (stats::min(&values), stats::max(&values)) else {
                let name = column.name.clone();
                return Column::with_dtype(name, DType::Float64, column.into_cells());
            };
            let range = if hi - lo == 0.0 { 1.0 } else { hi - lo };
            let cells = column
                .cells()
                .iter()
                .map(|c| match c.as_f64() {
                    Some(v) if v.is_finite() => Cell::Float((v - lo) / range),
                    _ => Cell::Null,
                })
                .collect();
            Column::with_dtype(column.name, DType::Float64, cells)
        })
        .collect();
    Dataset::new(columns)
}
