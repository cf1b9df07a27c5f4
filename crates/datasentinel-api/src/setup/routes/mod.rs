//! Route configuration and setup.
//!
//! Route groups live in [domains](domains); health checks in [health](health).

mod domains;
mod health;

use crate::api_doc::get_openapi_spec;
use crate::middleware::{security_headers_middleware, SecurityHeadersConfig};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use datasentinel_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa_rapidoc::RapiDoc;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let base = config.base_path();
    let cors = setup_cors(config)?;

    let docs_path = format!("{}/docs", base);
    let security_headers_config = Arc::new(SecurityHeadersConfig::new(
        config.is_production(),
        docs_path.clone(),
    ));

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    tracing::info!(
        http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let docs = RapiDoc::with_openapi(
        format!("{}/api-docs/openapi.json", base),
        get_openapi_spec(base),
    )
    .path(docs_path);

    let app = Router::new()
        .merge(health_routes(base))
        .merge(domains::engine_routes(base))
        .merge(domains::web_routes(base))
        .merge(domains::module_routes(base))
        .merge(domains::billing_routes(base))
        .merge(docs)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes()))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            security_headers_config,
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// `GET` routes also answer `HEAD`.
fn health_routes(base: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(&format!("{}/health", base), get(health::health_check))
        .route(&format!("{}/ready", base), get(health::readiness_check))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::HEAD, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS_ORIGINS entry: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
