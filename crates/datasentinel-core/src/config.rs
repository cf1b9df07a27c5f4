//! Configuration module
//!
//! All settings come from the process environment (optionally seeded from a
//! `.env` file). `Config::from_env` fails fast when a required variable is
//! missing so a misconfigured task exits immediately with the variable's name.

use std::env;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BASE_PATH: &str = "/datasentinel";
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SESSION_TTL_HOURS: i64 = 24;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Label used in place of a bucket name when files live on the local filesystem.
pub const LOCAL_BUCKET_LABEL: &str = "LOCAL";

/// Stripe Checkout settings. Keys are optional at startup; billing routes
/// report a configuration error when they are hit without them.
#[derive(Clone, Debug)]
pub struct StripeSettings {
    pub secret_key: Option<String>,
    pub price_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub api_base: String,
}

/// Service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub server_port: u16,
    pub environment: String,
    pub base_path: String,
    pub secret_key: String,
    pub session_ttl_hours: i64,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, LocalStack)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub stripe: StripeSettings,
    pub cors_origins: Vec<String>,
    pub max_upload_size_bytes: usize,
    pub http_concurrency_limit: usize,
    pub validation_rules_path: String,
    pub log_format: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.inner().environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = ServiceConfig::from_lookup(|key| env::var(key).ok())?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn base_path(&self) -> &str {
        &self.inner().base_path
    }

    pub fn secret_key(&self) -> &str {
        &self.inner().secret_key
    }

    pub fn session_ttl_hours(&self) -> i64 {
        self.inner().session_ttl_hours
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    /// Name that callers of the engine API must send in their `bucket` fields.
    pub fn data_bucket(&self) -> &str {
        match self.storage_backend() {
            StorageBackend::S3 => self.s3_bucket().unwrap_or_default(),
            StorageBackend::Local => LOCAL_BUCKET_LABEL,
        }
    }

    pub fn stripe(&self) -> &StripeSettings {
        &self.inner().stripe
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().max_upload_size_bytes
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().http_concurrency_limit
    }

    pub fn validation_rules_path(&self) -> &str {
        &self.inner().validation_rules_path
    }

    pub fn log_json(&self) -> bool {
        self.inner().log_format.eq_ignore_ascii_case("json")
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

impl ServiceConfig {
    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let mut base_path = var("BASE_PATH").unwrap_or_else(|| DEFAULT_BASE_PATH.to_string());
        while base_path.len() > 1 && base_path.ends_with('/') {
            base_path.pop();
        }

        let max_upload_mb = var("MAX_UPLOAD_SIZE_MB")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let stripe = StripeSettings {
            secret_key: var("STRIPE_SECRET_KEY"),
            price_id: var("STRIPE_PRICE_ID"),
            success_url: var("STRIPE_SUCCESS_URL").unwrap_or_else(|| {
                format!("http://localhost:{}{}/subscription/success", DEFAULT_PORT, DEFAULT_BASE_PATH)
            }),
            cancel_url: var("STRIPE_CANCEL_URL").unwrap_or_else(|| {
                format!("http://localhost:{}{}/subscription/cancel", DEFAULT_PORT, DEFAULT_BASE_PATH)
            }),
            api_base: var("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
        };

        let config = ServiceConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            base_path,
            secret_key: var("SECRET_KEY")
                .ok_or_else(|| anyhow::anyhow!("SECRET_KEY must be set to sign sessions"))?,
            session_ttl_hours: var("SESSION_TTL_HOURS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(SESSION_TTL_HOURS),
            database_url: var("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            stripe,
            cors_origins,
            max_upload_size_bytes: max_upload_mb * 1024 * 1024,
            http_concurrency_limit: var("HTTP_CONCURRENCY_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
            validation_rules_path: var("VALIDATION_RULES_PATH")
                .unwrap_or_else(|| "validation_rules.json".to_string()),
            log_format: var("LOG_FORMAT").unwrap_or_else(|| "compact".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let production = is_production_name(&self.environment);

        if production && self.secret_key.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "SECRET_KEY must be at least {} characters long in production",
                MIN_PRODUCTION_SECRET_LEN
            ));
        }

        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if !self.base_path.starts_with('/') || self.base_path.len() < 2 {
            return Err(anyhow::anyhow!(
                "BASE_PATH must start with '/' and name a path segment (e.g. /datasentinel)"
            ));
        }

        if production && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS cannot be 0"));
        }

        if self.db_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("DB_TIMEOUT_SECONDS cannot be 0"));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB cannot be 0"));
        }

        if self.session_ttl_hours <= 0 {
            return Err(anyhow::anyhow!("SESSION_TTL_HOURS must be positive"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
