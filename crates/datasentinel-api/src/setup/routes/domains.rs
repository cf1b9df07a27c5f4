//! Route groups, each mounted under the base path.

use crate::handlers::{billing, engine, modules, web};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn engine_routes(base: &str) -> Router<Arc<AppState>> {
    let api = format!("{}/api", base);
    Router::new()
        .route(&api, get(engine::engine_health))
        .route(&format!("{}/", api), get(engine::engine_health))
        .route(
            &format!("{}/convert-and-upload", api),
            post(engine::convert_and_upload),
        )
        .route(&format!("{}/profile", api), post(engine::profile))
        .route(&format!("{}/normalize", api), post(engine::normalize))
        .route(&format!("{}/validate", api), post(engine::validate))
        .route(&format!("{}/columns", api), post(engine::columns))
        .route(&format!("{}/predict", api), post(engine::predict))
}

pub fn web_routes(base: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(base, get(web::index))
        .route(&format!("{}/", base), get(web::index))
        .route(&format!("{}/login", base), post(web::login))
        .route(&format!("{}/logout", base), get(web::logout))
        .route(&format!("{}/dashboard", base), get(web::dashboard))
        .route(&format!("{}/settings", base), get(web::settings))
        .route(&format!("{}/reports", base), get(web::reports))
        .route(
            &format!("{}/view/{{module}}/{{id}}", base),
            get(web::view_record),
        )
}

pub fn module_routes(base: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/convert", base),
            get(modules::convert_page).post(modules::convert_upload),
        )
        .route(
            &format!("{}/validation", base),
            get(modules::validation_page).post(modules::validation_upload),
        )
        .route(
            &format!("{}/normalization", base),
            get(modules::normalization_page).post(modules::normalization_upload),
        )
        .route(
            &format!("{}/profiling", base),
            get(modules::profiling_page).post(modules::profiling_upload),
        )
        .route(
            &format!("{}/prediction", base),
            get(modules::prediction_page).post(modules::prediction_upload),
        )
        .route(
            &format!("{}/prediction/locked", base),
            get(modules::prediction_locked),
        )
}

pub fn billing_routes(base: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/subscribe/pro", base), get(billing::subscribe_pro))
        .route(
            &format!("{}/subscription/success", base),
            get(billing::subscription_success),
        )
        .route(
            &format!("{}/subscription/cancel", base),
            get(billing::subscription_cancel),
        )
}
