use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Engine that produced an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditModule {
    Validation,
    Normalization,
    Conversion,
    Profiling,
    Prediction,
}

impl AuditModule {
    pub const ALL: [AuditModule; 5] = [
        AuditModule::Validation,
        AuditModule::Normalization,
        AuditModule::Conversion,
        AuditModule::Profiling,
        AuditModule::Prediction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditModule::Validation => "validation",
            AuditModule::Normalization => "normalization",
            AuditModule::Conversion => "conversion",
            AuditModule::Profiling => "profiling",
            AuditModule::Prediction => "prediction",
        }
    }
}

impl FromStr for AuditModule {
    type Err = crate::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditModule::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| crate::AppError::NotFound(format!("Unknown module: {}", s)))
    }
}

impl Display for AuditModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ValidationRecord {
    pub id: i64,
    pub email: String,
    pub input_file: String,
    pub status: String,
    pub result_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct NormalizationRecord {
    pub id: i64,
    pub email: String,
    pub input_file: String,
    pub normalized_file: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ConversionRecord {
    pub id: i64,
    pub email: String,
    pub original_file: String,
    pub converted_path: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProfileRecord {
    pub id: i64,
    pub email: String,
    pub input_file: String,
    pub profile_url: String,
    pub drift_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PredictionRecord {
    pub id: i64,
    pub email: String,
    pub input_file: String,
    pub status: String,
    pub target_column: String,
    pub result_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Common view over the five audit record kinds
pub trait AuditRecord {
    const MODULE: AuditModule;

    fn id(&self) -> i64;
    fn file(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;

    fn status(&self) -> &str {
        "success"
    }

    fn history_entry(&self, base_path: &str) -> HistoryEntry {
        HistoryEntry {
            module: Self::MODULE,
            id: self.id(),
            file: self.file().to_string(),
            status: self.status().to_string(),
            created_at: self.created_at(),
            view: format!("{}/view/{}/{}", base_path, Self::MODULE, self.id()),
        }
    }
}

impl AuditRecord for ValidationRecord {
    const MODULE: AuditModule = AuditModule::Validation;

    fn id(&self) -> i64 {
        self.id
    }
    fn file(&self) -> &str {
        &self.input_file
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status(&self) -> &str {
        &self.status
    }
}

impl AuditRecord for NormalizationRecord {
    const MODULE: AuditModule = AuditModule::Normalization;

    fn id(&self) -> i64 {
        self.id
    }
    fn file(&self) -> &str {
        &self.input_file
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl AuditRecord for ConversionRecord {
    const MODULE: AuditModule = AuditModule::Conversion;

    fn id(&self) -> i64 {
        self.id
    }
    fn file(&self) -> &str {
        &self.original_file
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl AuditRecord for ProfileRecord {
    const MODULE: AuditModule = AuditModule::Profiling;

    fn id(&self) -> i64 {
        self.id
    }
    fn file(&self) -> &str {
        &self.input_file
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl AuditRecord for PredictionRecord {
    const MODULE: AuditModule = AuditModule::Prediction;

    fn id(&self) -> i64 {
        self.id
    }
    fn file(&self) -> &str {
        &self.input_file
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status(&self) -> &str {
        &self.status
    }
}

/// One line of the merged report history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub module: AuditModule,
    pub id: i64,
    pub file: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub view: String,
}

/// Sort history entries newest first; ties keep module order.
pub fn sort_history(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Per-module record counts shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardStats {
    pub validation: i64,
    pub normalization: i64,
    pub conversion: i64,
    pub profiling: i64,
    pub prediction: i64,
}
