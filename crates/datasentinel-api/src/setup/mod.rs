//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use datasentinel_core::Config;
use datasentinel_processing::validation::ValidationRules;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        base_path = %config.base_path(),
        "Configuration loaded and validated"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let rules = ValidationRules::load(config.validation_rules_path()).with_context(|| {
        format!(
            "Failed to load validation rules from {}",
            config.validation_rules_path()
        )
    })?;

    let state = Arc::new(AppState::new(config.clone(), pool, storage, rules)?);
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
