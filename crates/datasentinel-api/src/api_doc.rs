//! OpenAPI documentation.
//! Handler annotations use the default `/datasentinel` prefix; the served
//! document is rewritten to the configured base path.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use datasentinel_core::models;

/// Prefix baked into handler path annotations (utoipa requires literals).
const OPENAPI_PATH_PLACEHOLDER: &str = "/datasentinel";

fn transform_openapi_paths(spec: &mut utoipa::openapi::OpenApi, base_path: &str) {
    if OPENAPI_PATH_PLACEHOLDER == base_path {
        return;
    }
    let path_map = std::mem::take(&mut spec.paths.paths);
    for (key, item) in path_map {
        let new_key = key.replacen(OPENAPI_PATH_PLACEHOLDER, base_path, 1);
        spec.paths.paths.insert(new_key, item);
    }
}

/// The OpenAPI document with paths under `base_path`.
pub fn get_openapi_spec(base_path: &str) -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    transform_openapi_paths(&mut spec, base_path);
    spec
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DataSentinel API",
        version = "0.1.0",
        description = "Data-quality service for CSV, JSON and Parquet datasets: validation, conversion, normalization, profiling with drift detection, and prediction."
    ),
    paths(
        // Engine API
        handlers::engine::engine_health,
        handlers::engine::convert_and_upload,
        handlers::engine::profile,
        handlers::engine::normalize,
        handlers::engine::validate,
        handlers::engine::columns,
        handlers::engine::predict,
        // Session pages
        handlers::web::index,
        handlers::web::login,
        handlers::web::logout,
        handlers::web::dashboard,
        handlers::web::settings,
        handlers::web::reports,
        handlers::web::view_record,
        handlers::modules::convert_page,
        handlers::modules::convert_upload,
        handlers::modules::validation_page,
        handlers::modules::validation_upload,
        handlers::modules::normalization_page,
        handlers::modules::normalization_upload,
        handlers::modules::profiling_page,
        handlers::modules::profiling_upload,
        handlers::modules::prediction_page,
        handlers::modules::prediction_upload,
        handlers::modules::prediction_locked,
        // Billing
        handlers::billing::subscribe_pro,
        handlers::billing::subscription_success,
        handlers::billing::subscription_cancel,
    ),
    components(
        schemas(
            models::User,
            models::LoginRequest,
            models::AuditModule,
            models::HistoryEntry,
            models::DashboardStats,
            models::ValidationRecord,
            models::NormalizationRecord,
            models::ConversionRecord,
            models::ProfileRecord,
            models::PredictionRecord,
            handlers::engine::ProfileRequest,
            handlers::engine::NormalizeRequest,
            handlers::engine::ValidateRequest,
            handlers::engine::ColumnsRequest,
            handlers::engine::PredictRequest,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "engine", description = "Bucket-addressed engine operations"),
        (name = "web", description = "Login, dashboard and audit history"),
        (name = "pages", description = "Upload-driven engine pages"),
        (name = "billing", description = "Pro subscription through Stripe Checkout")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_base_path() {
        let spec = get_openapi_spec("/quality");
        assert!(spec.paths.paths.contains_key("/quality/api/validate"));
        assert!(spec.paths.paths.contains_key("/quality/view/{module}/{id}"));
        assert!(!spec.paths.paths.keys().any(|k| k.starts_with("/datasentinel")));
    }

    #[test]
    fn test_default_base_path_is_unchanged() {
        let spec = get_openapi_spec("/datasentinel");
        assert!(spec.paths.paths.contains_key("/datasentinel/subscribe/pro"));
    }
}
