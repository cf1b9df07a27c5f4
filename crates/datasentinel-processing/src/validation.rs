//! Rule-based dataset validation
//!
//! Rules are loaded from JSON (see [`ValidationRules`]) and applied by
//! [`validate`], which reports every check rather than stopping at the first
//! failure.

use crate::dataset::{Cell, CellKey, Column, Dataset};
use crate::error::{ProcessingError, ProcessingResult};
use crate::normalization::parse_datetime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

pub const RESULTS_PREFIX: &str = "validation-results/";

/// Dataset-wide and per-column validation rules
///
/// Fields omitted from the JSON take their [`Default`] values; an explicit
/// `"max_null_percentage": null` disables the null check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationRules {
    pub required_columns: Vec<String>,

    /// Fail any column whose null share exceeds this percentage
    pub max_null_percentage: Option<f64>,

    pub allow_duplicate_rows: bool,

    pub columns: BTreeMap<String, ColumnRule>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        ValidationRules {
            required_columns: Vec::new(),
            max_null_percentage: Some(50.0),
            allow_duplicate_rows: false,
            columns: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnRule {
    #[serde(default)]
    pub dtype: Option<ExpectedType>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedType {
    Numeric,
    Integer,
    String,
    Boolean,
    Datetime,
}

impl ExpectedType {
    fn matches(&self, cell: &Cell) -> bool {
        match (self, cell) {
            (ExpectedType::Numeric, Cell::Int(_) | Cell::Float(_)) => true,
            (ExpectedType::Integer, Cell::Int(_)) => true,
            (ExpectedType::Integer, Cell::Float(v)) => v.fract() == 0.0,
            (ExpectedType::String, Cell::Text(_)) => true,
            (ExpectedType::Boolean, Cell::Bool(_)) => true,
            (ExpectedType::Datetime, Cell::DateTime(_)) => true,
            (ExpectedType::Datetime, Cell::Text(s)) => parse_datetime(s).is_some(),
            _ => false,
        }
    }
}

impl ValidationRules {
    pub fn from_json(bytes: &[u8]) -> ProcessingResult<Self> {
        let rules: ValidationRules = serde_json::from_slice(bytes)
            .map_err(|e| ProcessingError::InvalidRules(e.to_string()))?;
        rules.compile()?;
        Ok(rules)
    }

    /// Load rules from `path`, falling back to the defaults when the file is
    /// absent.
    pub fn load(path: impl AsRef<Path>) -> ProcessingResult<Self> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => Self::from_json(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "Validation rules file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(ProcessingError::InvalidRules(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Compile every pattern, rejecting invalid regular expressions.
    fn compile(&self) -> ProcessingResult<HashMap<&str, Regex>> {
        let mut patterns = HashMap::new();
        for (name, rule) in &self.columns {
            if let Some(pattern) = &rule.pattern {
                let regex = Regex::new(pattern).map_err(|e| {
                    ProcessingError::InvalidRules(format!("Column '{}': {}", name, e))
                })?;
                patterns.insert(name.as_str(), regex);
            }
            if let (Some(min), Some(max)) = (rule.min, rule.max) {
                if min > max {
                    return Err(ProcessingError::InvalidRules(format!(
                        "Column '{}': min {} is greater than max {}",
                        name, min, max
                    )));
                }
            }
        }
        Ok(patterns)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub passed: bool,
    pub failed_count: usize,
    pub message: String,
}

impl CheckResult {
    fn new(check: &str, column: Option<&str>, failed_count: usize, message: String) -> Self {
        CheckResult {
            check: check.to_string(),
            column: column.map(String::from),
            passed: failed_count == 0,
            failed_count,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Passed => "passed",
            ValidationStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub total_rows: usize,
    pub total_columns: usize,
    pub checks: Vec<CheckResult>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

pub fn validate(dataset: &Dataset, rules: &ValidationRules) -> ProcessingResult<ValidationReport> {
    let patterns = rules.compile()?;
    let rows = dataset.n_rows();
    let mut checks = Vec::new();

    for name in &rules.required_columns {
        let missing = dataset.column(name).is_none();
        let message = if missing {
            format!("Required column '{}' is missing", name)
        } else {
            format!("Required column '{}' is present", name)
        };
        checks.push(CheckResult::new(
            "required_column",
            Some(name),
            usize::from(missing),
            message,
        ));
    }

    if let Some(max_pct) = rules.max_null_percentage {
        for column in dataset.columns() {
            let nulls = column.null_count();
            let pct = if rows == 0 {
                0.0
            } else {
                nulls as f64 / rows as f64 * 100.0
            };
            let failed = if pct > max_pct { nulls } else { 0 };
            checks.push(CheckResult::new(
                "null_percentage",
                Some(&column.name),
                failed,
                format!("{:.2}% null (max {:.2}%)", pct, max_pct),
            ));
        }
    }

    if !rules.allow_duplicate_rows {
        let duplicates = dataset.duplicate_row_count();
        checks.push(CheckResult::new(
            "duplicate_rows",
            None,
            duplicates,
            format!("{} duplicate rows", duplicates),
        ));
    }

    for (name, rule) in &rules.columns {
        let Some(column) = dataset.column(name) else {
            checks.push(CheckResult::new(
                "column_exists",
                Some(name),
                1,
                format!("Column '{}' referenced by rules is missing", name),
            ));
            continue;
        };
        check_column(column, rule, patterns.get(name.as_str()), &mut checks);
    }

    let failed = checks.iter().filter(|c| !c.passed).count();
    let report = ValidationReport {
        status: if failed == 0 {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        },
        total_rows: rows,
        total_columns: dataset.n_columns(),
        summary: ValidationSummary {
            passed: checks.len() - failed,
            failed,
        },
        checks,
    };

    tracing::info!(
        status = report.status.as_str(),
        checks = report.checks.len(),
        failed = failed,
        "Dataset validated"
    );

    Ok(report)
}

fn check_column(
    column: &Column,
    rule: &ColumnRule,
    pattern: Option<&Regex>,
    checks: &mut Vec<CheckResult>,
) {
    let name = Some(column.name.as_str());
    let present: Vec<&Cell> = column.cells().iter().filter(|c| !c.is_null()).collect();

    if rule.not_null {
        let nulls = column.null_count();
        checks.push(CheckResult::new(
            "not_null",
            name,
            nulls,
            format!("{} null values", nulls),
        ));
    }

    if let Some(expected) = rule.dtype {
        let bad = present.iter().filter(|c| !expected.matches(c)).count();
        checks.push(CheckResult::new(
            "dtype",
            name,
            bad,
            format!("{} values are not {:?}", bad, expected).to_lowercase(),
        ));
    }

    if rule.min.is_some() || rule.max.is_some() {
        let min = rule.min.unwrap_or(f64::NEG_INFINITY);
        let max = rule.max.unwrap_or(f64::INFINITY);
        let bad = present
            .iter()
            .filter_map(|c| c.as_f64())
            .filter(|v| *v < min || *v > max)
            .count();
        checks.push(CheckResult::new(
            "range",
            name,
            bad,
            format!("{} values outside [{}, {}]", bad, min, max),
        ));
    }

    if let Some(allowed) = &rule.allowed_values {
        let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
        let bad = present
            .iter()
            .filter(|c| !allowed.contains(c.to_string().as_str()))
            .count();
        checks.push(CheckResult::new(
            "allowed_values",
            name,
            bad,
            format!("{} values not in the allowed set", bad),
        ));
    }

    if let Some(regex) = pattern {
        let bad = present
            .iter()
            .filter(|c| !regex.is_match(&c.to_string()))
            .count();
        checks.push(CheckResult::new(
            "pattern",
            name,
            bad,
            format!("{} values do not match '{}'", bad, regex.as_str()),
        ));
    }

    if rule.unique {
        let mut seen: HashSet<CellKey> = HashSet::new();
        let repeats = present.iter().filter(|c| !seen.insert(c.key())).count();
        checks.push(CheckResult::new(
            "unique",
            name,
            repeats,
            format!("{} repeated values", repeats),
        ));
    }
}

/// `validation-results/{name}.results.json`
pub fn results_key(name: &str) -> String {
    format!("{}{}.results.json", RESULTS_PREFIX, name)
}
