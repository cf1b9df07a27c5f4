//! Supervised prediction over a tabular dataset
//!
//! The target column is learned from every other column with a random
//! forest; the fitted model then predicts every row.

mod forest;
mod report;

pub use forest::{ForestParams, RandomForest};
pub use report::{classification_report, ClassMetrics, ClassificationReport};

use crate::dataset::{Cell, Column, DType, Dataset};
use crate::error::{ProcessingError, ProcessingResult};
use crate::stats;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

pub const PREDICTION_COLUMN: &str = "prediction";
pub const DEFAULT_SEED: u64 = 42;
const TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    /// Input rows with the `prediction` column set
    pub dataset: Dataset,
    pub report: ClassificationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl PredictionOutcome {
    /// `[{"prediction": value}, ...]`
    pub fn prediction_records(&self) -> Vec<serde_json::Value> {
        self.dataset
            .column(PREDICTION_COLUMN)
            .map(|c| {
                c.cells()
                    .iter()
                    .map(|cell| serde_json::json!({ PREDICTION_COLUMN: cell.to_json() }))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Train on a shuffled 80% split and predict every row.
pub fn predict_from_dataset(
    dataset: &Dataset,
    target: &str,
    seed: u64,
) -> ProcessingResult<PredictionOutcome> {
    let target_column = dataset
        .column(target)
        .ok_or_else(|| ProcessingError::ColumnNotFound(target.to_string()))?;

    let feature_columns: Vec<&Column> = dataset
        .columns()
        .iter()
        .filter(|c| c.name != target)
        .collect();
    if feature_columns.is_empty() {
        return Err(ProcessingError::InvalidInput(
            "Prediction needs at least one feature column besides the target".to_string(),
        ));
    }

    let n = dataset.n_rows();
    let test_rows = (n as f64 * TEST_FRACTION).ceil() as usize;
    let train_rows = n.saturating_sub(test_rows);
    if train_rows == 0 {
        return Err(ProcessingError::InvalidInput(format!(
            "Not enough rows to train a model ({} rows)",
            n
        )));
    }

    let encoded: Vec<Vec<f64>> = feature_columns.iter().map(|c| encode_feature(c)).collect();
    let x: Vec<Vec<f64>> = (0..n)
        .map(|row| encoded.iter().map(|f| f[row]).collect())
        .collect();

    let (labels, representatives, y) = encode_target(target_column);

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = &order[test_rows..];

    let x_train: Vec<Vec<f64>> = train.iter().map(|&r| x[r].clone()).collect();
    let y_train: Vec<usize> = train.iter().map(|&r| y[r]).collect();

    let params = ForestParams {
        seed,
        ..ForestParams::default()
    };
    let forest = RandomForest::fit(&x_train, &y_train, labels.len(), &params);
    let predicted: Vec<usize> = x.iter().map(|row| forest.predict(row)).collect();

    let report = classification_report(&y, &predicted, &labels);

    let prediction_cells: Vec<Cell> = predicted
        .iter()
        .map(|&class| representatives[class].clone())
        .collect();
    let prediction = Column::with_dtype(PREDICTION_COLUMN, target_column.dtype(), prediction_cells);

    let mut columns: Vec<Column> = dataset
        .columns()
        .iter()
        .filter(|c| c.name != PREDICTION_COLUMN)
        .cloned()
        .collect();
    columns.push(prediction);
    let dataset = Dataset::new(columns)?;

    tracing::info!(
        target = %target,
        rows = n,
        train_rows,
        test_rows,
        classes = labels.len(),
        accuracy = report.accuracy,
        "Prediction model trained"
    );

    Ok(PredictionOutcome {
        dataset,
        report,
        train_rows,
        test_rows,
    })
}

/// Numeric encoding of a feature column; nulls take the column median.
fn encode_feature(column: &Column) -> Vec<f64> {
    let raw: Vec<Option<f64>> = match column.dtype() {
        DType::Int64 | DType::Float64 => column.numeric(),
        DType::Bool => column
            .cells()
            .iter()
            .map(|c| match c {
                Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            })
            .collect(),
        DType::DateTime => column
            .cells()
            .iter()
            .map(|c| match c {
                Cell::DateTime(dt) => Some(dt.and_utc().timestamp() as f64),
                _ => None,
            })
            .collect(),
        DType::Text => {
            let categories: Vec<&str> = column
                .cells()
                .iter()
                .filter_map(Cell::as_text)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            column
                .cells()
                .iter()
                .map(|c| {
                    c.as_text()
                        .and_then(|s| categories.binary_search(&s).ok())
                        .map(|i| i as f64)
                })
                .collect()
        }
    };

    let present: Vec<f64> = raw.iter().flatten().copied().collect();
    let fill = stats::median(&present).unwrap_or(0.0);
    raw.into_iter().map(|v| v.unwrap_or(fill)).collect()
}

/// Sorted class labels, one representative cell per class, and each row's
/// class index.
fn encode_target(column: &Column) -> (Vec<String>, Vec<Cell>, Vec<usize>) {
    let as_label = |cell: &Cell| {
        if cell.is_null() {
            "nan".to_string()
        } else {
            cell.to_string()
        }
    };

    let mut representatives: HashMap<String, Cell> = HashMap::new();
    for cell in column.cells() {
        representatives
            .entry(as_label(cell))
            .or_insert_with(|| cell.clone());
    }

    let mut labels: Vec<String> = representatives.keys().cloned().collect();
    let numeric = labels.iter().all(|l| l.parse::<f64>().is_ok());
    labels.sort_by(|a, b| {
        if numeric {
            let (x, y) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        } else {
            a.cmp(b)
        }
    });

    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let y = column
        .cells()
        .iter()
        .map(|c| index.get(as_label(c).as_str()).copied().unwrap_or(0))
        .collect();

    let cells = labels
        .iter()
        .map(|l| representatives.get(l).cloned().unwrap_or(Cell::Null))
        .collect();

    (labels, cells, y)
}

/// Output keys next to the input, named after it:
/// `{dir}/{stem}_predictions.parquet` and `{dir}/{stem}_predictions.json`.
pub fn prediction_keys(blob: &str) -> (String, String) {
    let (dir, name) = match blob.rfind('/') {
        Some(idx) => (&blob[..=idx], &blob[idx + 1..]),
        None => ("", blob),
    };
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    (
        format!("{}{}_predictions.parquet", dir, stem),
        format!("{}{}_predictions.json", dir, stem),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read_dataset;
    use crate::format::FileFormat;

    fn separable() -> Dataset {
        let mut csv = String::from("size,color,label\n");
        for i in 0..20 {
            csv.push_str(&format!("{},red,small\n", i));
            csv.push_str(&format!("{},blue,large\n", 100 + i));
        }
        read_dataset(csv.as_bytes(), FileFormat::Csv).unwrap()
    }

    #[test]
    fn test_separable_training_data_is_predicted_exactly() {
        let outcome = predict_from_dataset(&separable(), "label", DEFAULT_SEED).unwrap();

        assert_eq!(outcome.report.accuracy, 1.0);
        assert_eq!(outcome.train_rows, 32);
        assert_eq!(outcome.test_rows, 8);
        assert_eq!(
            outcome.dataset.column_names(),
            vec!["size", "color", "label", "prediction"]
        );
        let label = outcome.dataset.column("label").unwrap();
        let prediction = outcome.dataset.column(PREDICTION_COLUMN).unwrap();
        assert_eq!(label.cells(), prediction.cells());
        assert_eq!(outcome.report.class("large").unwrap().support, 20);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let a = predict_from_dataset(&separable(), "color", 7).unwrap();
        let b = predict_from_dataset(&separable(), "color", 7).unwrap();
        assert_eq!(a.report, b.report);
        assert_eq!(a.prediction_records(), b.prediction_records());
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let result = predict_from_dataset(&separable(), "price", DEFAULT_SEED);
        assert!(matches!(result, Err(ProcessingError::ColumnNotFound(c)) if c == "price"));
    }

    #[test]
    fn test_target_only_dataset_is_rejected() {
        let dataset = Dataset::new(vec![Column::from_raw("y", &["a", "b", "a"])]).unwrap();
        assert!(matches!(
            predict_from_dataset(&dataset, "y", DEFAULT_SEED),
            Err(ProcessingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_numeric_labels_sort_numerically() {
        let column = Column::from_raw("y", &["10", "9", "10", "2"]);
        let (labels, cells, y) = encode_target(&column);
        assert_eq!(labels, vec!["2", "9", "10"]);
        assert_eq!(cells, vec![Cell::Int(2), Cell::Int(9), Cell::Int(10)]);
        assert_eq!(y, vec![2, 1, 2, 0]);
    }

    #[test]
    fn test_prediction_records_shape() {
        let outcome = predict_from_dataset(&separable(), "label", DEFAULT_SEED).unwrap();
        let records = outcome.prediction_records();
        assert_eq!(records.len(), 40);
        assert_eq!(records[0], serde_json::json!({"prediction": "small"}));
    }

    #[test]
    fn test_prediction_keys() {
        assert_eq!(
            prediction_keys("normalized/sales_normalized.parquet"),
            (
                "normalized/sales_normalized_predictions.parquet".to_string(),
                "normalized/sales_normalized_predictions.json".to_string()
            )
        );
        assert_eq!(prediction_keys("top.csv").0, "top_predictions.parquet");
    }

    #[test]
    fn test_uploads_in_one_prefix_get_distinct_outputs() {
        let alice = prediction_keys("uploads/0b9f_alice.csv");
        let bob = prediction_keys("uploads/7c21_bob.csv");
        assert_ne!(alice.0, bob.0);
        assert_ne!(alice.1, bob.1);
        assert_eq!(alice.0, "uploads/0b9f_alice_predictions.parquet");
    }
}
