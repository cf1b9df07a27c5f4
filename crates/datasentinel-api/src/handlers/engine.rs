//! Bucket-addressed engine endpoints under `{base}/api`
//!
//! These are called by pipelines rather than browsers, so they need no
//! session. Every request names the bucket it expects; only the configured
//! data bucket is accepted.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::pipeline;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use datasentinel_core::AppError;
use datasentinel_processing::FileFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct EngineHealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConvertQuery {
    /// Object key of the source file
    pub filename: Option<String>,
    /// csv, json, excel or parquet
    pub source_format: Option<String>,
    pub target_format: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConvertResponse {
    pub message: String,
    pub converted_file_path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileRequest {
    pub bucket_name: Option<String>,
    pub current_blob: Option<String>,
    pub baseline_blob: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub profile_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NormalizeRequest {
    pub name: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NormalizeResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateRequest {
    pub bucket: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateResponse {
    pub status: String,
    pub file: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ColumnsRequest {
    pub bucket_name: Option<String>,
    pub scaled_blob_path: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ColumnsResponse {
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PredictRequest {
    pub bucket_name: Option<String>,
    pub scaled_blob_path: Option<String>,
    pub target_column: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictResponse {
    pub message: String,
    pub target_used: String,
    pub parquet: String,
    pub json: String,
    /// Per-class precision, recall, f1-score and support, plus accuracy and averages
    #[schema(value_type = Object)]
    pub report: serde_json::Value,
}

/// Value of a required request field, trimmed.
pub(crate) fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing required field: {}", name)))
}

fn check_bucket(state: &AppState, bucket: &str) -> Result<(), AppError> {
    let expected = state.config.data_bucket();
    if bucket != expected {
        return Err(AppError::BadRequest(format!(
            "Unknown bucket '{}'; this service reads from '{}'",
            bucket, expected
        )));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/datasentinel/api/",
    tag = "engine",
    responses(
        (status = 200, description = "Engine API is up", body = EngineHealthResponse)
    )
)]
pub async fn engine_health() -> Json<EngineHealthResponse> {
    Json(EngineHealthResponse {
        status: "ok".to_string(),
        message: "Service is healthy".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/datasentinel/api/convert-and-upload",
    tag = "engine",
    params(ConvertQuery),
    responses(
        (status = 200, description = "File converted", body = ConvertResponse),
        (status = 400, description = "Missing parameter or unknown format", body = ErrorResponse),
        (status = 404, description = "Source file not found", body = ErrorResponse),
        (status = 415, description = "Format recognized but not supported", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "convert_and_upload"))]
pub async fn convert_and_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConvertResponse>, HttpAppError> {
    let filename = required(query.filename, "filename")?;
    let source = FileFormat::from_name(&required(query.source_format, "source_format")?)?;
    let target = FileFormat::from_name(&required(query.target_format, "target_format")?)?;

    let artifact = pipeline::convert(state.storage.as_ref(), &filename, source, target).await?;
    tracing::info!(source = %filename, output = %artifact.key, "File converted");

    Ok(Json(ConvertResponse {
        message: "Conversion successful".to_string(),
        converted_file_path: artifact.uri,
    }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/api/profile",
    tag = "engine",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile written", body = ProfileResponse),
        (status = 400, description = "Missing field or wrong bucket", body = ErrorResponse),
        (status = 404, description = "Blob not found", body = ErrorResponse),
        (status = 415, description = "Unsupported file type", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "profile"))]
pub async fn profile(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ProfileRequest>,
) -> Result<Json<ProfileResponse>, HttpAppError> {
    let bucket = required(request.bucket_name, "bucket_name")?;
    let current = required(request.current_blob, "current_blob")?;
    check_bucket(&state, &bucket)?;
    let baseline = request
        .baseline_blob
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    let artifacts =
        pipeline::profile(state.storage.as_ref(), &current, baseline.as_deref()).await?;

    Ok(Json(ProfileResponse {
        profile_url: artifacts.profile.uri,
        drift_url: artifacts.drift.map(|d| d.uri),
    }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/api/normalize",
    tag = "engine",
    request_body = NormalizeRequest,
    responses(
        (status = 200, description = "Normalized, or ignored as unsupported", body = NormalizeResponse),
        (status = 400, description = "Missing field or wrong bucket", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "normalize"))]
pub async fn normalize(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<NormalizeRequest>,
) -> Result<(StatusCode, Json<NormalizeResponse>), HttpAppError> {
    let name = required(request.name, "name")?;
    let bucket = required(request.bucket, "bucket")?;
    check_bucket(&state, &bucket)?;

    let format = match FileFormat::from_path(&name).filter(FileFormat::is_supported) {
        Some(format) => format,
        None => {
            tracing::info!(key = %name, "Skipping unsupported file");
            return Ok((
                StatusCode::OK,
                Json(NormalizeResponse {
                    message: format!("Ignored unsupported file: {}", name),
                    output_path: None,
                }),
            ));
        }
    };

    let normalized = pipeline::normalize(state.storage.as_ref(), &name, format).await?;
    tracing::info!(
        key = %name,
        output = %normalized.output.key,
        method = ?normalized.outliers.method,
        "Dataset normalized"
    );

    Ok((
        StatusCode::OK,
        Json(NormalizeResponse {
            message: "Normalization complete".to_string(),
            output_path: Some(normalized.output.uri),
        }),
    ))
}

/// Extensions the validate endpoint recognizes, readable or not.
const VALIDATE_EXTENSIONS: [&str; 4] = ["csv", "json", "xlsx", "parquet"];

#[utoipa::path(
    post,
    path = "/datasentinel/api/validate",
    tag = "engine",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation report written", body = ValidateResponse),
        (status = 400, description = "Missing field, wrong bucket or unsupported extension", body = ErrorResponse),
        (status = 404, description = "Object not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "validate"))]
pub async fn validate(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ValidateRequest>,
) -> Result<Json<ValidateResponse>, HttpAppError> {
    let bucket = required(request.bucket, "bucket")?;
    let name = required(request.name, "name")?;
    check_bucket(&state, &bucket)?;

    let format = FileFormat::from_path(&name)
        .filter(|f| VALIDATE_EXTENSIONS.contains(&f.extension()))
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported file extension: {}", name)))?;
    if !format.is_supported() {
        return Err(AppError::BadRequest(format!("{} files cannot be validated", format)).into());
    }

    pipeline::validate(state.storage.as_ref(), &name, format, state.rules.clone()).await?;

    Ok(Json(ValidateResponse {
        status: "success".to_string(),
        file: name,
    }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/api/columns",
    tag = "engine",
    request_body = ColumnsRequest,
    responses(
        (status = 200, description = "Column names in file order", body = ColumnsResponse),
        (status = 400, description = "Missing field or wrong bucket", body = ErrorResponse),
        (status = 404, description = "Blob not found", body = ErrorResponse)
    )
)]
pub async fn columns(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ColumnsRequest>,
) -> Result<Json<ColumnsResponse>, HttpAppError> {
    let bucket = required(request.bucket_name, "bucket_name")?;
    let blob = required(request.scaled_blob_path, "scaled_blob_path")?;
    check_bucket(&state, &bucket)?;

    let columns = pipeline::columns(state.storage.as_ref(), &blob).await?;
    Ok(Json(ColumnsResponse { columns }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/api/predict",
    tag = "engine",
    request_body = PredictRequest,
    responses(
        (status = 200, description = "Predictions written", body = PredictResponse),
        (status = 400, description = "Missing field, wrong bucket or unknown target", body = ErrorResponse),
        (status = 404, description = "Blob not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "predict"))]
pub async fn predict(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PredictRequest>,
) -> Result<Json<PredictResponse>, HttpAppError> {
    let bucket = required(request.bucket_name, "bucket_name")?;
    let blob = required(request.scaled_blob_path, "scaled_blob_path")?;
    let target = required(request.target_column, "target_column")?;
    check_bucket(&state, &bucket)?;

    let artifacts = pipeline::predict(state.storage.as_ref(), &blob, &target).await?;
    Ok(Json(prediction_response(artifacts)?))
}

pub(crate) fn prediction_response(
    artifacts: pipeline::PredictionArtifacts,
) -> Result<PredictResponse, AppError> {
    Ok(PredictResponse {
        message: "Prediction completed".to_string(),
        target_used: artifacts.target,
        parquet: artifacts.parquet.uri,
        json: artifacts.json.uri,
        report: serde_json::to_value(&artifacts.report)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required(Some(" a.csv ".to_string()), "name").unwrap(), "a.csv");
        assert!(matches!(
            required(Some("  ".to_string()), "name"),
            Err(AppError::BadRequest(msg)) if msg.contains("name")
        ));
        assert!(required(None, "bucket").is_err());
    }
}
