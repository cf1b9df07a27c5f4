//! Session pages: login, dashboard, reports and record views

use crate::auth::session::{clear_cookie, session_cookie};
use crate::auth::SessionUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{rejection::FormRejection, FromRequest, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::{DateTime, Utc};
use datasentinel_core::models::{
    AuditModule, ConversionRecord, DashboardStats, HistoryEntry, LoginRequest,
    NormalizationRecord, PredictionRecord, ProfileRecord, User, ValidationRecord,
};
use datasentinel_core::AppError;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub email: String,
    pub name: String,
    pub is_pro: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IndexResponse {
    pub service: String,
    pub user: Option<SessionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub user: User,
    pub stats: DashboardStats,
    pub history: Vec<HistoryEntry>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportsResponse {
    pub history: Vec<HistoryEntry>,
}

/// Login body, accepted as a urlencoded form or as JSON.
pub struct LoginForm(pub LoginRequest);

impl<S> FromRequest<S> for LoginForm
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let login = if is_json {
            let Json(body) = Json::<LoginRequest>::from_request(req, state).await?;
            body
        } else {
            let Form(body) = Form::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|e: FormRejection| {
                    AppError::InvalidInput(format!("Invalid form body: {}", e.body_text()))
                })?;
            body
        };
        Ok(LoginForm(login))
    }
}

/// Load the account behind a session. A deleted account ends the session.
pub(crate) async fn current_user(state: &AppState, session: &SessionUser) -> Result<User, AppError> {
    state
        .users
        .get_by_email(session.email())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))
}

/// Redirect that also replaces the session cookie.
pub(crate) fn redirect_with_session(
    state: &AppState,
    location: &str,
    user: &User,
) -> Result<Response, AppError> {
    let token = state.sessions.issue(user)?;
    let cookie = session_cookie(
        &token,
        state.base_path(),
        state.sessions.ttl_seconds(),
        state.config.is_production(),
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to(location),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/datasentinel/",
    tag = "web",
    responses((status = 200, description = "Service banner and current user", body = IndexResponse))
)]
pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<IndexResponse> {
    let user = state.sessions.from_headers(&headers).map(|claims| SessionView {
        email: claims.sub,
        name: claims.name,
        is_pro: claims.is_pro,
    });

    Json(IndexResponse {
        service: "DataSentinel".to_string(),
        user,
    })
}

#[utoipa::path(
    post,
    path = "/datasentinel/login",
    tag = "web",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in; redirects to the dashboard"),
        (status = 400, description = "Invalid email", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    LoginForm(login): LoginForm,
) -> Result<Response, HttpAppError> {
    login.validate().map_err(AppError::from)?;
    let email = login.normalized_email();

    let user = state.users.find_or_create(&email).await?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(redirect_with_session(&state, &state.url("/dashboard"), &user)?)
}

#[utoipa::path(
    get,
    path = "/datasentinel/logout",
    tag = "web",
    responses((status = 302, description = "Session cleared"))
)]
pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, state.base_path().to_string()),
            (header::SET_COOKIE, clear_cookie(state.base_path())),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/datasentinel/dashboard",
    tag = "web",
    responses(
        (status = 200, description = "Stats and history", body = DashboardResponse),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<DashboardResponse>, HttpAppError> {
    let user = current_user(&state, &session).await?;
    let stats = state.audit.stats(&user.email).await?;
    let history = state.audit.history(&user.email, state.base_path()).await?;

    Ok(Json(DashboardResponse {
        user,
        stats,
        history,
        now: Utc::now(),
    }))
}

#[utoipa::path(
    get,
    path = "/datasentinel/settings",
    tag = "web",
    responses(
        (status = 200, description = "Account profile", body = User),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn settings(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<User>, HttpAppError> {
    Ok(Json(current_user(&state, &session).await?))
}

#[utoipa::path(
    get,
    path = "/datasentinel/reports",
    tag = "web",
    responses(
        (status = 200, description = "Audit history, newest first", body = ReportsResponse),
        (status = 401, description = "Login required", body = ErrorResponse)
    )
)]
pub async fn reports(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<ReportsResponse>, HttpAppError> {
    let history = state
        .audit
        .history(session.email(), state.base_path())
        .await?;
    Ok(Json(ReportsResponse { history }))
}

#[utoipa::path(
    get,
    path = "/datasentinel/view/{module}/{id}",
    tag = "web",
    params(
        ("module" = String, Path, description = "validation, normalization, conversion, profiling or prediction"),
        ("id" = i64, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "The record"),
        (status = 401, description = "Login required", body = ErrorResponse),
        (status = 404, description = "No such record for this user", body = ErrorResponse)
    )
)]
pub async fn view_record(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    Path((module, id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let module: AuditModule = module.parse()?;
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("No {} record {}", module, id)))?;
    let email = session.email();
    let audit = &state.audit;

    let record = match module {
        AuditModule::Validation => to_json(audit.get::<ValidationRecord>(email, id).await?)?,
        AuditModule::Normalization => {
            to_json(audit.get::<NormalizationRecord>(email, id).await?)?
        }
        AuditModule::Conversion => to_json(audit.get::<ConversionRecord>(email, id).await?)?,
        AuditModule::Profiling => to_json(audit.get::<ProfileRecord>(email, id).await?)?,
        AuditModule::Prediction => to_json(audit.get::<PredictionRecord>(email, id).await?)?,
    };

    record
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No {} record {}", module, id)).into())
}

fn to_json<T: Serialize>(record: Option<T>) -> Result<Option<serde_json::Value>, AppError> {
    record
        .map(|r| serde_json::to_value(r).map_err(AppError::from))
        .transpose()
}
