//! Upload-driven engine pages
//!
//! Each page lists the user's records on GET. On POST it stores the uploaded
//! file under `uploads/`, runs the engine, records the run, and redirects
//! back to the page. Uploads whose engine run fails are removed again. Prediction answers with its result instead, since the
//! classification report is the page's content.

use crate::auth::SessionUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::engine::{prediction_response, PredictResponse};
use crate::handlers::web::current_user;
use crate::services::pipeline;
use crate::state::AppState;
use crate::utils::upload::{upload_key, UploadForm, UploadedFile};
use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use datasentinel_core::models::{
    ConversionRecord, NormalizationRecord, PredictionRecord, ProfileRecord, User,
    ValidationRecord,
};
use datasentinel_core::AppError;
use datasentinel_processing::FileFormat;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize)]
pub struct RecordList<T> {
    pub records: Vec<T>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LockedResponse {
    pub locked: bool,
    pub upgrade_url: String,
}

struct StoredUpload {
    key: String,
    filename: String,
    format: FileFormat,
}

/// Upload a file the engines can read.
async fn store_upload(state: &AppState, file: UploadedFile) -> Result<StoredUpload, HttpAppError> {
    let format = pipeline::supported_format(&file.filename)?;
    let key = upload_key(&file.filename)?;
    state
        .storage
        .upload(&key, file.data, &file.content_type)
        .await?;
    tracing::debug!(key = %key, "Upload stored");

    Ok(StoredUpload {
        key,
        filename: file.filename,
        format,
    })
}

/// Remove uploads whose engine run failed and hand back the run's error.
async fn discard_uploads(
    state: &AppState,
    uploads: &[&StoredUpload],
    err: HttpAppError,
) -> HttpAppError {
    for upload in uploads {
        match state.storage.delete(&upload.key).await {
            Ok(()) => tracing::debug!(key = %upload.key, "Upload removed after failed run"),
            Err(e) => tracing::warn!(
                key = %upload.key,
                error = %e,
                "Failed to remove upload after failed run"
            ),
        }
    }
    err
}

async fn read_form(state: &AppState, multipart: Multipart) -> Result<UploadForm, AppError> {
    UploadForm::read(multipart, state.config.max_upload_size_bytes()).await
}

async fn require_pro(state: &AppState, session: &SessionUser) -> Result<User, AppError> {
    let user = current_user(state, session).await?;
    if !user.is_pro {
        return Err(AppError::SubscriptionRequired(
            "Prediction requires a pro subscription".to_string(),
        ));
    }
    Ok(user)
}

#[utoipa::path(
    get,
    path = "/datasentinel/convert",
    tag = "pages",
    responses(
        (status = 200, description = "Conversion records"),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn convert_page(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<RecordList<ConversionRecord>>, HttpAppError> {
    let records = state.audit.list(session.email()).await?;
    Ok(Json(RecordList { records }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/convert",
    tag = "pages",
    request_body(content_type = "multipart/form-data", description = "`file` and `target_format`"),
    responses(
        (status = 303, description = "Converted; back to the page"),
        (status = 400, description = "Missing file or format", body = ErrorResponse),
        (status = 415, description = "Unsupported file type", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(user = %session.email()))]
pub async fn convert_upload(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    multipart: Multipart,
) -> Result<Redirect, HttpAppError> {
    let mut form = read_form(&state, multipart).await?;
    let target = FileFormat::from_name(form.require_field("target_format")?)?;
    let upload = store_upload(&state, form.require_file("file")?).await?;

    let artifact =
        match pipeline::convert(state.storage.as_ref(), &upload.key, upload.format, target).await {
            Ok(artifact) => artifact,
            Err(err) => return Err(discard_uploads(&state, &[&upload], err).await),
        };
    state
        .audit
        .record_conversion(session.email(), &upload.filename, &artifact.uri, target.name())
        .await?;

    Ok(Redirect::to(&state.url("/convert")))
}

#[utoipa::path(
    get,
    path = "/datasentinel/validation",
    tag = "pages",
    responses(
        (status = 200, description = "Validation records"),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn validation_page(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<RecordList<ValidationRecord>>, HttpAppError> {
    let records = state.audit.list(session.email()).await?;
    Ok(Json(RecordList { records }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/validation",
    tag = "pages",
    request_body(content_type = "multipart/form-data", description = "`file`"),
    responses(
        (status = 303, description = "Validated; back to the page"),
        (status = 415, description = "Unsupported file type", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(user = %session.email()))]
pub async fn validation_upload(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    multipart: Multipart,
) -> Result<Redirect, HttpAppError> {
    let mut form = read_form(&state, multipart).await?;
    let upload = store_upload(&state, form.require_file("file")?).await?;

    let validated = match pipeline::validate(
        state.storage.as_ref(),
        &upload.key,
        upload.format,
        state.rules.clone(),
    )
    .await
    {
        Ok(validated) => validated,
        Err(err) => return Err(discard_uploads(&state, &[&upload], err).await),
    };
    state
        .audit
        .record_validation(
            session.email(),
            &upload.filename,
            validated.report.status.as_str(),
            Some(&validated.results.uri),
        )
        .await?;

    Ok(Redirect::to(&state.url("/validation")))
}

#[utoipa::path(
    get,
    path = "/datasentinel/normalization",
    tag = "pages",
    responses(
        (status = 200, description = "Normalization records"),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn normalization_page(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<RecordList<NormalizationRecord>>, HttpAppError> {
    let records = state.audit.list(session.email()).await?;
    Ok(Json(RecordList { records }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/normalization",
    tag = "pages",
    request_body(content_type = "multipart/form-data", description = "`file`"),
    responses(
        (status = 303, description = "Normalized; back to the page"),
        (status = 415, description = "Unsupported file type", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(user = %session.email()))]
pub async fn normalization_upload(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    multipart: Multipart,
) -> Result<Redirect, HttpAppError> {
    let mut form = read_form(&state, multipart).await?;
    let upload = store_upload(&state, form.require_file("file")?).await?;

    let normalized =
        match pipeline::normalize(state.storage.as_ref(), &upload.key, upload.format).await {
            Ok(normalized) => normalized,
            Err(err) => return Err(discard_uploads(&state, &[&upload], err).await),
        };
    state
        .audit
        .record_normalization(session.email(), &upload.filename, &normalized.output.uri)
        .await?;

    Ok(Redirect::to(&state.url("/normalization")))
}

#[utoipa::path(
    get,
    path = "/datasentinel/profiling",
    tag = "pages",
    responses(
        (status = 200, description = "Profiling records"),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn profiling_page(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<RecordList<ProfileRecord>>, HttpAppError> {
    let records = state.audit.list(session.email()).await?;
    Ok(Json(RecordList { records }))
}

#[utoipa::path(
    post,
    path = "/datasentinel/profiling",
    tag = "pages",
    request_body(content_type = "multipart/form-data", description = "`file`, optionally a `baseline` file for drift"),
    responses(
        (status = 303, description = "Profiled; back to the page"),
        (status = 415, description = "Unsupported file type", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(user = %session.email()))]
pub async fn profiling_upload(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    multipart: Multipart,
) -> Result<Redirect, HttpAppError> {
    let mut form = read_form(&state, multipart).await?;
    let current = store_upload(&state, form.require_file("file")?).await?;
    let baseline = match form.take_file("baseline") {
        Some(file) => match store_upload(&state, file).await {
            Ok(stored) => Some(stored),
            Err(err) => return Err(discard_uploads(&state, &[&current], err).await),
        },
        None => None,
    };

    let artifacts = match pipeline::profile(
        state.storage.as_ref(),
        &current.key,
        baseline.as_ref().map(|b| b.key.as_str()),
    )
    .await
    {
        Ok(artifacts) => artifacts,
        Err(err) => {
            let stored: Vec<&StoredUpload> = std::iter::once(&current).chain(&baseline).collect();
            return Err(discard_uploads(&state, &stored, err).await);
        }
    };
    state
        .audit
        .record_profile(
            session.email(),
            &current.filename,
            &artifacts.profile.uri,
            artifacts.drift.as_ref().map(|d| d.uri.as_str()),
        )
        .await?;

    Ok(Redirect::to(&state.url("/profiling")))
}

#[utoipa::path(
    get,
    path = "/datasentinel/prediction",
    tag = "pages",
    responses(
        (status = 200, description = "Prediction records"),
        (status = 302, description = "Not pro; redirects to the locked page"),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn prediction_page(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Response, HttpAppError> {
    let user = current_user(&state, &session).await?;
    if !user.is_pro {
        return Ok((
            StatusCode::FOUND,
            [(header::LOCATION, state.url("/prediction/locked"))],
        )
            .into_response());
    }

    let records: Vec<PredictionRecord> = state.audit.list(&user.email).await?;
    Ok(Json(RecordList { records }).into_response())
}

#[utoipa::path(
    post,
    path = "/datasentinel/prediction",
    tag = "pages",
    request_body(content_type = "multipart/form-data", description = "`file` and `target_column`"),
    responses(
        (status = 200, description = "Prediction result", body = PredictResponse),
        (status = 400, description = "Missing target or unknown column", body = ErrorResponse),
        (status = 402, description = "Pro subscription required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(user = %session.email()))]
pub async fn prediction_upload(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, HttpAppError> {
    let user = require_pro(&state, &session).await?;

    let mut form = read_form(&state, multipart).await?;
    let target = form.require_field("target_column")?.to_string();
    let upload = store_upload(&state, form.require_file("file")?).await?;

    match pipeline::predict(state.storage.as_ref(), &upload.key, &target).await {
        Ok(artifacts) => {
            state
                .audit
                .record_prediction(
                    &user.email,
                    &upload.filename,
                    "success",
                    &target,
                    Some(&artifacts.parquet.uri),
                )
                .await?;
            Ok(Json(prediction_response(artifacts)?))
        }
        Err(err) => {
            let err = discard_uploads(&state, &[&upload], err).await;
            state
                .audit
                .record_prediction(&user.email, &upload.filename, "failed", &target, None)
                .await?;
            Err(err)
        }
    }
}

#[utoipa::path(
    get,
    path = "/datasentinel/prediction/locked",
    tag = "pages",
    responses((status = 200, description = "Upgrade prompt", body = LockedResponse))
)]
pub async fn prediction_locked(State(state): State<Arc<AppState>>) -> Json<LockedResponse> {
    Json(LockedResponse {
        locked: true,
        upgrade_url: state.url("/subscribe/pro"),
    })
}
