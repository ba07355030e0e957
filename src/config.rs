// config.rs
use chrono::FixedOffset;
use std::env;
use std::time::Duration;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    pub currency: String,
    pub callback_url: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub port: u16,
    pub host: String,
    pub storage_backend: StorageBackend,
    /// `None` when no secret key is configured; payment routes then answer 503.
    pub paystack: Option<PaystackConfig>,
    pub business_timezone: FixedOffset,
    pub sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so it can be exercised without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let storage_backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("mongo") => StorageBackend::Mongo,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(AppError::configuration(format!(
                    "STORAGE_BACKEND must be 'mongo' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let database_url = match (storage_backend, get("DATABASE_URL")) {
            (_, Some(url)) => url,
            (StorageBackend::Memory, None) => String::new(),
            (StorageBackend::Mongo, None) => {
                return Err(AppError::configuration("DATABASE_URL must be set"))
            }
        };

        let paystack = match get("PAYSTACK_SECRET_KEY") {
            Some(secret_key) => Some(PaystackConfig {
                secret_key,
                base_url: get("PAYSTACK_BASE_URL")
                    .unwrap_or_else(|| "https://api.paystack.co".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                currency: get("PAYSTACK_CURRENCY").unwrap_or_else(|| "NGN".to_string()),
                callback_url: get("PAYSTACK_CALLBACK_URL"),
                timeout: Duration::from_secs(parse_or(&get, "PAYSTACK_TIMEOUT_SECS", 15)?),
                max_retries: parse_or(&get, "PAYSTACK_MAX_RETRIES", 2)?,
            }),
            None => None,
        };

        let offset_minutes: i32 = parse_or(&get, "BUSINESS_UTC_OFFSET_MINUTES", 0)?;
        let business_timezone = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::configuration(format!(
                    "BUSINESS_UTC_OFFSET_MINUTES out of range: {}",
                    offset_minutes
                ))
            })?;

        let sweep_secs: u64 = parse_or(&get, "DISBURSEMENT_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_secs == 0 {
            return Err(AppError::configuration(
                "DISBURSEMENT_SWEEP_INTERVAL_SECS must be greater than zero",
            ));
        }

        Ok(AppConfig {
            database_url,
            database_name: get("DATABASE_NAME").unwrap_or_else(|| "lendfund".to_string()),
            port: parse_or(&get, "PORT", 10000)?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            storage_backend,
            paystack,
            business_timezone,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "storage_backend": match self.storage_backend {
                StorageBackend::Mongo => "mongo",
                StorageBackend::Memory => "memory",
            },
            "database_name": self.database_name,
            "paystack_configured": self.paystack.is_some(),
            "business_timezone": self.business_timezone.to_string(),
            "sweep_interval_secs": self.sweep_interval.as_secs(),
            "port": self.port,
            "host": self.host,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::configuration(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}
