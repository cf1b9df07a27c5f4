//! Storage-backed engine runs shared by the engine API and the web pages
//!
//! Each run downloads its input, does the CPU work on the blocking pool, and
//! writes its artifacts back next to the other outputs.

use crate::error::HttpAppError;
use datasentinel_core::AppError;
use datasentinel_processing::normalization::{self, OutlierSummary};
use datasentinel_processing::prediction::{self, ClassificationReport, DEFAULT_SEED};
use datasentinel_processing::profiling;
use datasentinel_processing::validation::{self, ValidationReport, ValidationRules};
use datasentinel_processing::{
    conversion, read_dataset, write_dataset, Dataset, FileFormat, ProcessingError,
};
use datasentinel_storage::Storage;
use serde::Serialize;
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Run CPU-bound engine work off the async workers.
pub async fn blocking<T, F>(work: F) -> Result<T, HttpAppError>
where
    F: FnOnce() -> Result<T, ProcessingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Engine task failed: {}", e)))?
        .map_err(HttpAppError::from)
}

/// Format of a stored key, rejecting anything the codecs cannot read.
pub fn supported_format(key: &str) -> Result<FileFormat, AppError> {
    match FileFormat::from_path(key) {
        Some(format) if format.is_supported() => Ok(format),
        Some(format) => Err(AppError::UnsupportedFormat(format!(
            "{} files are not supported: {}",
            format, key
        ))),
        None => Err(AppError::UnsupportedFormat(format!(
            "Unsupported file type: {}",
            key
        ))),
    }
}

pub async fn load_dataset(
    storage: &dyn Storage,
    key: &str,
    format: FileFormat,
) -> Result<Dataset, HttpAppError> {
    let bytes = storage.download(key).await?;
    blocking(move || read_dataset(&bytes, format)).await
}

async fn upload_json<T: Serialize>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<String, HttpAppError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::Processing(format!("Failed to serialize output: {}", e)))?;
    Ok(storage.upload(key, body, JSON_CONTENT_TYPE).await?)
}

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub key: String,
    pub uri: String,
}

pub async fn convert(
    storage: &dyn Storage,
    key: &str,
    source: FileFormat,
    target: FileFormat,
) -> Result<StoredArtifact, HttpAppError> {
    let bytes = storage.download(key).await?;
    let output = blocking(move || conversion::convert(&bytes, source, target)).await?;

    let output_key = conversion::converted_key(key, target);
    let uri = storage
        .upload(&output_key, output, target.content_type())
        .await?;
    Ok(StoredArtifact {
        key: output_key,
        uri,
    })
}

#[derive(Debug, Clone)]
pub struct ProfileArtifacts {
    pub profile: StoredArtifact,
    pub drift: Option<StoredArtifact>,
}

pub async fn profile(
    storage: &dyn Storage,
    current_key: &str,
    baseline_key: Option<&str>,
) -> Result<ProfileArtifacts, HttpAppError> {
    let current = load_dataset(storage, current_key, supported_format(current_key)?).await?;
    let baseline = match baseline_key {
        Some(key) => Some(load_dataset(storage, key, supported_format(key)?).await?),
        None => None,
    };

    let (profile, drift) = blocking(move || {
        let profile = profiling::profile_dataframe(&current);
        let drift = baseline
            .as_ref()
            .map(|baseline| profiling::detect_drift(baseline, &current));
        Ok((profile, drift))
    })
    .await?;

    let profile_key = profiling::profile_key(current_key);
    let profile_uri = upload_json(storage, &profile_key, &profile).await?;

    let drift = match drift {
        Some(report) => {
            let drift_key = profiling::drift_key(current_key);
            let uri = upload_json(storage, &drift_key, &report).await?;
            Some(StoredArtifact {
                key: drift_key,
                uri,
            })
        }
        None => None,
    };

    Ok(ProfileArtifacts {
        profile: StoredArtifact {
            key: profile_key,
            uri: profile_uri,
        },
        drift,
    })
}

#[derive(Debug, Clone)]
pub struct NormalizedArtifact {
    pub output: StoredArtifact,
    pub outliers: OutlierSummary,
}

/// Normalize a stored dataset; the caller has checked its format.
pub async fn normalize(
    storage: &dyn Storage,
    key: &str,
    format: FileFormat,
) -> Result<NormalizedArtifact, HttpAppError> {
    let dataset = load_dataset(storage, key, format).await?;
    let (bytes, outliers) = blocking(move || {
        let outcome = normalization::normalize(dataset)?;
        let bytes = write_dataset(&outcome.dataset, FileFormat::Parquet)?;
        Ok((bytes, outcome.outliers))
    })
    .await?;

    let output_key = normalization::normalized_key(key);
    let uri = storage
        .upload(&output_key, bytes, FileFormat::Parquet.content_type())
        .await?;
    Ok(NormalizedArtifact {
        output: StoredArtifact {
            key: output_key,
            uri,
        },
        outliers,
    })
}

#[derive(Debug, Clone)]
pub struct ValidationArtifact {
    pub report: ValidationReport,
    pub results: StoredArtifact,
}

/// Validate a stored dataset; the report lands at `validation-results/{key}.results.json`.
pub async fn validate(
    storage: &dyn Storage,
    key: &str,
    format: FileFormat,
    rules: Arc<ValidationRules>,
) -> Result<ValidationArtifact, HttpAppError> {
    let dataset = load_dataset(storage, key, format).await?;
    let report = blocking(move || validation::validate(&dataset, &rules)).await?;

    let results_key = validation::results_key(key);
    let uri = upload_json(storage, &results_key, &report).await?;

    tracing::info!(
        key = %key,
        status = report.status.as_str(),
        failed = report.summary.failed,
        "Dataset validated"
    );

    Ok(ValidationArtifact {
        report,
        results: StoredArtifact {
            key: results_key,
            uri,
        },
    })
}

pub async fn columns(storage: &dyn Storage, key: &str) -> Result<Vec<String>, HttpAppError> {
    let dataset = load_dataset(storage, key, supported_format(key)?).await?;
    Ok(dataset.column_names())
}

#[derive(Debug, Clone)]
pub struct PredictionArtifacts {
    pub target: String,
    pub parquet: StoredArtifact,
    pub json: StoredArtifact,
    pub report: ClassificationReport,
}

pub async fn predict(
    storage: &dyn Storage,
    key: &str,
    target: &str,
) -> Result<PredictionArtifacts, HttpAppError> {
    let dataset = load_dataset(storage, key, supported_format(key)?).await?;

    let target_column = target.to_string();
    let (parquet_bytes, records, report) = blocking(move || {
        let outcome = prediction::predict_from_dataset(&dataset, &target_column, DEFAULT_SEED)?;
        let parquet_bytes = write_dataset(&outcome.dataset, FileFormat::Parquet)?;
        let records = outcome.prediction_records();
        Ok((parquet_bytes, records, outcome.report))
    })
    .await?;

    let (parquet_key, json_key) = prediction::prediction_keys(key);
    let parquet_uri = storage
        .upload(&parquet_key, parquet_bytes, FileFormat::Parquet.content_type())
        .await?;
    let json_uri = upload_json(storage, &json_key, &records).await?;

    Ok(PredictionArtifacts {
        target: target.to_string(),
        parquet: StoredArtifact {
            key: parquet_key,
            uri: parquet_uri,
        },
        json: StoredArtifact {
            key: json_key,
            uri: json_uri,
        },
        report,
    })
}
