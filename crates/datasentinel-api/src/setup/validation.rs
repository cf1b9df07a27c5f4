//! Configuration validation
//!
//! Hard errors come from `Config::validate`; this adds startup warnings for
//! settings that only fail once a route is hit.

use anyhow::Result;
use datasentinel_core::{Config, StorageBackend};

/// Validate critical configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let stripe = config.stripe();
    if stripe.secret_key.is_none() || stripe.price_id.is_none() {
        tracing::warn!(
            "STRIPE_SECRET_KEY or STRIPE_PRICE_ID not set - /subscribe/pro will fail until configured"
        );
    }

    if config.is_production() && config.storage_backend() == StorageBackend::Local {
        tracing::warn!("Local storage backend in production - files will not survive task restarts");
    }

    if config.is_production() && stripe.success_url.starts_with("http://localhost") {
        tracing::warn!(
            success_url = %stripe.success_url,
            "STRIPE_SUCCESS_URL points at localhost in production"
        );
    }

    Ok(())
}
