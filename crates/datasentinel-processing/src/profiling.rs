//! Dataset profiling and drift detection

use crate::dataset::{Cell, CellKey, Column, DType, Dataset};
use crate::stats;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;

pub const PROFILE_PREFIX: &str = "profiling/";
const TOP_VALUES: usize = 5;
const PSI_BINS: usize = 10;
const PSI_DRIFT_THRESHOLD: f64 = 0.2;
const KS_DRIFT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetProfile {
    pub total_rows: usize,
    pub total_columns: usize,
    pub duplicate_rows: usize,
    pub memory_usage_mb: f64,
    #[serde(serialize_with = "ordered_map")]
    pub columns: Vec<(String, ColumnProfile)>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, profile)| profile)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub dtype: String,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    #[serde(flatten)]
    pub stats: Option<ColumnStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ColumnStats {
    Numeric {
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
        std: Option<f64>,
    },
    Text {
        min_length: usize,
        max_length: usize,
        avg_length: f64,
        #[serde(serialize_with = "ordered_map")]
        top_values: Vec<(String, usize)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDrift {
    pub psi_score: f64,
    pub drift_by_psi: bool,
    pub ks_p_value: f64,
    pub drift_by_ks: bool,
}

/// Drift results per column, in baseline column order
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport(#[serde(serialize_with = "ordered_map")] pub Vec<(String, ColumnDrift)>);

impl DriftReport {
    pub fn column(&self, name: &str) -> Option<&ColumnDrift> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[allow(clippy::ptr_arg)]
fn ordered_map<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

pub fn profile_dataframe(dataset: &Dataset) -> DatasetProfile {
    let columns = dataset
        .columns()
        .iter()
        .map(|c| (c.name.clone(), profile_column(c)))
        .collect();

    DatasetProfile {
        total_rows: dataset.n_rows(),
        total_columns: dataset.n_columns(),
        duplicate_rows: dataset.duplicate_row_count(),
        memory_usage_mb: dataset.memory_usage_bytes() as f64 / (1024.0 * 1024.0),
        columns,
    }
}

pub fn profile_column(column: &Column) -> ColumnProfile {
    let null_count = column.null_count();
    let null_percentage = if column.is_empty() {
        0.0
    } else {
        null_count as f64 / column.len() as f64 * 100.0
    };

    let stats = match column.dtype() {
        DType::Int64 | DType::Float64 | DType::Bool => {
            let values = measured_values(column);
            Some(ColumnStats::Numeric {
                min: stats::min(&values),
                max: stats::max(&values),
                mean: stats::mean(&values),
                std: stats::std(&values, 1),
            })
        }
        DType::Text => Some(text_stats(column)),
        DType::DateTime => None,
    };

    ColumnProfile {
        dtype: column.dtype().pandas_name().to_string(),
        null_count,
        null_percentage,
        unique_count: column.unique_count(),
        stats,
    }
}

/// Numeric values for stats and drift; booleans count as 1 and 0.
fn measured_values(column: &Column) -> Vec<f64> {
    match column.dtype() {
        DType::Bool => column
            .cells()
            .iter()
            .filter_map(|c| match c {
                Cell::Bool(b) => Some(f64::from(u8::from(*b))),
                _ => None,
            })
            .collect(),
        _ => column.numeric_values(),
    }
}

fn is_measured(dtype: DType) -> bool {
    dtype.is_numeric() || dtype == DType::Bool
}

fn text_stats(column: &Column) -> ColumnStats {
    let present: Vec<&Cell> = column.cells().iter().filter(|c| !c.is_null()).collect();
    let lengths: Vec<usize> = present
        .iter()
        .map(|c| c.to_string().chars().count())
        .collect();

    let avg_length = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    };

    ColumnStats::Text {
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        avg_length,
        top_values: top_values(&present, TOP_VALUES),
    }
}

/// Most frequent values, ties broken by first appearance.
fn top_values(cells: &[&Cell], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<CellKey, (usize, usize, String)> = HashMap::new();
    for (position, cell) in cells.iter().enumerate() {
        counts
            .entry(cell.key())
            .or_insert_with(|| (0, position, cell.to_string()))
            .0 += 1;
    }

    let mut ranked: Vec<(usize, usize, String)> = counts.into_values().collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(count, _, value)| (value, count))
        .collect()
}

/// Compare numeric and boolean columns shared by both datasets.
pub fn detect_drift(baseline: &Dataset, current: &Dataset) -> DriftReport {
    let mut results = Vec::new();

    for base_col in baseline.columns() {
        let Some(cur_col) = current.column(&base_col.name) else {
            continue;
        };
        if !is_measured(cur_col.dtype()) {
            continue;
        }

        let expected = measured_values(base_col);
        let actual = measured_values(cur_col);

        let psi = stats::psi(&expected, &actual, PSI_BINS);
        let (_, ks_p) = stats::ks_2samp(&expected, &actual);

        results.push((
            base_col.name.clone(),
            ColumnDrift {
                psi_score: stats::round_to(psi, 4),
                drift_by_psi: psi > PSI_DRIFT_THRESHOLD,
                ks_p_value: stats::round_to(ks_p, 4),
                drift_by_ks: ks_p < KS_DRIFT_ALPHA,
            },
        ));
    }

    tracing::debug!(columns = results.len(), "Drift computed");
    DriftReport(results)
}

fn stem(blob: &str) -> &str {
    let name = blob.rsplit('/').next().unwrap_or(blob);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// `profiling/{stem}_profile.json`
pub fn profile_key(current_blob: &str) -> String {
    format!("{}{}_profile.json", PROFILE_PREFIX, stem(current_blob))
}

/// `profiling/{stem}_drift.json`
pub fn drift_key(current_blob: &str) -> String {
    format!("{}{}_drift.json", PROFILE_PREFIX, stem(current_blob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read_dataset;
    use crate::format::FileFormat;
    use serde_json::json;

    fn load(csv: &str) -> Dataset {
        read_dataset(csv.as_bytes(), FileFormat::Csv).unwrap()
    }

    #[test]
    fn test_profile_counts() {
        let dataset = load("id,city,score\n1,Paris,1.0\n2,Lyon,\n3,Paris,3.0\n3,Paris,3.0\n");
        let profile = profile_dataframe(&dataset);

        assert_eq!(profile.total_rows, 4);
        assert_eq!(profile.total_columns, 3);
        assert_eq!(profile.duplicate_rows, 1);
        assert!(profile.memory_usage_mb > 0.0);

        let score = profile.column("score").unwrap();
        assert_eq!(score.dtype, "float64");
        assert_eq!(score.null_count, 1);
        assert_eq!(score.null_percentage, 25.0);
        assert_eq!(score.unique_count, 2);

        let city = profile.column("city").unwrap();
        assert_eq!(city.dtype, "object");
        match city.stats.as_ref().unwrap() {
            ColumnStats::Text {
                min_length,
                max_length,
                top_values,
                ..
            } => {
                assert_eq!(*min_length, 4);
                assert_eq!(*max_length, 5);
                assert_eq!(top_values[0], ("Paris".to_string(), 3));
                assert_eq!(top_values[1], ("Lyon".to_string(), 1));
            }
            other => panic!("unexpected stats {:?}", other),
        }
    }

    #[test]
    fn test_numeric_std_uses_sample_ddof() {
        let dataset = load("x\n2\n4\n4\n4\n5\n5\n7\n9\n");
        let profile = profile_dataframe(&dataset);
        let value = serde_json::to_value(profile.column("x").unwrap()).unwrap();
        assert_eq!(value["min"], json!(2.0));
        assert_eq!(value["max"], json!(9.0));
        assert_eq!(value["mean"], json!(5.0));
        assert!((value["std"].as_f64().unwrap() - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn test_profile_json_keeps_column_order() {
        let dataset = load("zeta,alpha\n1,a\n");
        let text = serde_json::to_string(&profile_dataframe(&dataset)).unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn test_drift_identical_and_shifted() {
        let base: String = (0..100).map(|i| format!("{},t\n", i)).collect();
        let shifted: String = (60..160).map(|i| format!("{},t\n", i)).collect();
        let baseline = load(&format!("v,tag\n{}", base));
        let same = load(&format!("v,tag\n{}", base));
        let moved = load(&format!("v,tag\n{}", shifted));

        let report = detect_drift(&baseline, &same);
        let v = report.column("v").unwrap();
        assert_eq!(v.psi_score, 0.0);
        assert_eq!(v.ks_p_value, 1.0);
        assert!(!v.drift_by_psi && !v.drift_by_ks);
        assert!(report.column("tag").is_none());

        let report = detect_drift(&baseline, &moved);
        let v = report.column("v").unwrap();
        assert!(v.drift_by_psi);
        assert!(v.drift_by_ks);
    }

    #[test]
    fn test_bool_columns_are_profiled_and_compared() {
        let baseline = load("flag\ntrue\nfalse\ntrue\ntrue\n");
        let profile = profile_dataframe(&baseline);
        let flag = profile.column("flag").unwrap();
        assert_eq!(flag.dtype, "bool");
        match flag.stats.as_ref().unwrap() {
            ColumnStats::Numeric { min, max, mean, .. } => {
                assert_eq!(*min, Some(0.0));
                assert_eq!(*max, Some(1.0));
                assert_eq!(*mean, Some(0.75));
            }
            other => panic!("unexpected stats {:?}", other),
        }

        let same = load("flag\ntrue\nfalse\ntrue\ntrue\n");
        let report = detect_drift(&baseline, &same);
        let drift = report.column("flag").unwrap();
        assert_eq!(drift.ks_p_value, 1.0);
        assert!(!drift.drift_by_ks);
    }

    #[test]
    fn test_profile_keys() {
        assert_eq!(profile_key("raw/2024/sales.csv"), "profiling/sales_profile.json");
        assert_eq!(drift_key("sales.v2.json"), "profiling/sales.v2_drift.json");
    }
}
