// src/config.rs
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

pub const MAX_RETENTION_DAYS: i64 = 36_500;
pub const MAX_CLEANUP_INTERVAL_HOURS: u64 = 8_760;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),
    #[error("{0} must be a valid {1}")]
    Invalid(&'static str, &'static str),
    #[error("{0}")]
    Constraint(String),
}

/// Process configuration. Runtime-editable options live in the settings record.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub nonce_secret: String,
    pub relay_signing_secret: Option<String>,
    pub admin_password_hash: Option<String>,
    pub site_url: String,
    pub site_locale: String,
    pub session_retention_days: i64,
    pub cleanup_interval_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("BIND_ADDR", "socket address"))?;

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let nonce_secret = var("NONCE_SECRET").unwrap_or_else(|| jwt_secret.clone());

        let session_retention_days = var("SESSION_RETENTION_DAYS")
            .unwrap_or_else(|| "90".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("SESSION_RETENTION_DAYS", "number"))?;

        let cleanup_interval_hours = var("CLEANUP_INTERVAL_HOURS")
            .unwrap_or_else(|| "24".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("CLEANUP_INTERVAL_HOURS", "number"))?;

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            jwt_secret,
            nonce_secret,
            relay_signing_secret: var("RELAY_SIGNING_SECRET"),
            admin_password_hash: var("ADMIN_PASSWORD_HASH"),
            site_url: var("SITE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            site_locale: var("SITE_LOCALE").unwrap_or_else(|| "en_US".to_string()),
            session_retention_days,
            cleanup_interval_hours,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 32 {
            return Err(ConfigError::Constraint(
                "JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }

        if !(1..=MAX_RETENTION_DAYS).contains(&self.session_retention_days) {
            return Err(ConfigError::Constraint(format!(
                "SESSION_RETENTION_DAYS must be between 1 and {}",
                MAX_RETENTION_DAYS
            )));
        }

        if !(1..=MAX_CLEANUP_INTERVAL_HOURS).contains(&self.cleanup_interval_hours) {
            return Err(ConfigError::Constraint(format!(
                "CLEANUP_INTERVAL_HOURS must be between 1 and {}",
                MAX_CLEANUP_INTERVAL_HOURS
            )));
        }

        Ok(())
    }
}
