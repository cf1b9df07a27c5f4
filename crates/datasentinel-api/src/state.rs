//! Shared application state

use crate::auth::session::SessionKeys;
use crate::services::billing::StripeClient;
use datasentinel_core::Config;
use datasentinel_db::{AuditRepository, UserRepository};
use datasentinel_processing::validation::ValidationRules;
use datasentinel_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub storage: Arc<dyn Storage>,
    pub users: UserRepository,
    pub audit: AuditRepository,
    /// Server-side rules used by the validation page
    pub rules: Arc<ValidationRules>,
    pub billing: StripeClient,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: PgPool,
        storage: Arc<dyn Storage>,
        rules: ValidationRules,
    ) -> anyhow::Result<Self> {
        let billing = StripeClient::new(config.stripe().clone())?;
        let sessions = SessionKeys::new(config.secret_key(), config.session_ttl_hours());

        Ok(AppState {
            users: UserRepository::new(pool.clone()),
            audit: AuditRepository::new(pool.clone()),
            config,
            pool,
            storage,
            rules: Arc::new(rules),
            billing,
            sessions,
        })
    }

    pub fn base_path(&self) -> &str {
        self.config.base_path()
    }

    /// `{base}{path}`, e.g. `/datasentinel/dashboard`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_path(), path)
    }
}
