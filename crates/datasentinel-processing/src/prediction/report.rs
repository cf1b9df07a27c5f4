use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 plus accuracy and macro/weighted averages,
/// laid out like scikit-learn's dictionary report.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<(String, ClassMetrics)>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, m)| m)
    }
}

impl Serialize for ClassificationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.classes.len() + 3))?;
        for (label, metrics) in &self.classes {
            map.serialize_entry(label, metrics)?;
        }
        map.serialize_entry("accuracy", &self.accuracy)?;
        map.serialize_entry("macro avg", &self.macro_avg)?;
        map.serialize_entry("weighted avg", &self.weighted_avg)?;
        map.end()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Score predicted class indices against true ones. Undefined ratios are 0.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    labels: &[String],
) -> ClassificationReport {
    let total = y_true.len();

    let classes: Vec<(String, ClassMetrics)> = labels
        .iter()
        .enumerate()
        .map(|(class, label)| {
            let pairs = || y_true.iter().zip(y_pred);
            let tp = pairs().filter(|&(&t, &p)| t == class && p == class).count();
            let predicted = y_pred.iter().filter(|&&p| p == class).count();
            let support = y_true.iter().filter(|&&t| t == class).count();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };

            (
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support,
                },
            )
        })
        .collect();

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

    let n_labels = classes.len().max(1) as f64;
    let macro_avg = ClassMetrics {
        precision: classes.iter().map(|(_, m)| m.precision).sum::<f64>() / n_labels,
        recall: classes.iter().map(|(_, m)| m.recall).sum::<f64>() / n_labels,
        f1_score: classes.iter().map(|(_, m)| m.f1_score).sum::<f64>() / n_labels,
        support: total,
    };

    let weight = |m: &ClassMetrics, v: f64| v * m.support as f64 / total.max(1) as f64;
    let weighted_avg = ClassMetrics {
        precision: classes.iter().map(|(_, m)| weight(m, m.precision)).sum(),
        recall: classes.iter().map(|(_, m)| weight(m, m.recall)).sum(),
        f1_score: classes.iter().map(|(_, m)| weight(m, m.f1_score)).sum(),
        support: total,
    };

    ClassificationReport {
        classes,
        accuracy: ratio(correct, total),
        macro_avg,
        weighted_avg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["cat".to_string(), "dog".to_string()]
    }

    #[test]
    fn test_perfect_predictions() {
        let y = [0, 1, 1, 0];
        let report = classification_report(&y, &y, &labels());
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.macro_avg.f1_score, 1.0);
        assert_eq!(report.class("dog").unwrap().support, 2);
    }

    #[test]
    fn test_mixed_predictions() {
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 1, 1, 1];
        let report = classification_report(&y_true, &y_pred, &labels());

        let cat = report.class("cat").unwrap();
        assert_eq!(cat.precision, 1.0);
        assert_eq!(cat.recall, 0.5);

        let dog = report.class("dog").unwrap();
        assert!((dog.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(dog.recall, 1.0);
        assert_eq!(dog.f1_score, 0.8);

        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.weighted_avg.support, 4);
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let report = classification_report(&[0, 1], &[0, 0], &labels());
        let dog = report.class("dog").unwrap();
        assert_eq!(dog.precision, 0.0);
        assert_eq!(dog.f1_score, 0.0);
    }

    #[test]
    fn test_serialized_layout() {
        let report = classification_report(&[0, 1], &[0, 1], &labels());
        let value = serde_json::to_value(&report).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["cat", "dog", "accuracy", "macro avg", "weighted avg"]);
        assert_eq!(value["cat"]["f1-score"], 1.0);
    }
}
