use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const DEV_JWT_SECRET: &str = "dev-only-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected compact or json, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub app_env: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub geocoding_base_url: String,
    pub geocoding_country_codes: String,
    pub geocoding_timeout: Duration,
    pub geocoding_user_agent: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests never touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());

        let jwt_secret = match lookup("JWT_SECRET").filter(|secret| !secret.is_empty()) {
            Some(secret) => secret,
            None if app_env == "production" => {
                return Err(AppError::Internal(
                    "JWT_SECRET is required in production".to_string(),
                ));
            }
            None => DEV_JWT_SECRET.to_string(),
        };

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or_default(&lookup, "LOG_FORMAT", LogFormat::Compact)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parse_or_default(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            cache_ttl: Duration::from_secs(parse_or_default(&lookup, "CACHE_TTL_SECS", 3600)?),
            jwt_secret,
            jwt_expires_in: Duration::from_secs(parse_or_default(&lookup, "JWT_EXPIRES_IN", 3600)?),
            geocoding_base_url: lookup("GEOCODING_BASE_URL")
                .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
            geocoding_country_codes: lookup("GEOCODING_COUNTRY_CODES")
                .unwrap_or_else(|| "CO".to_string()),
            geocoding_timeout: Duration::from_millis(parse_or_default(
                &lookup,
                "GEOCODING_TIMEOUT_MS",
                5000,
            )?),
            geocoding_user_agent: lookup("GEOCODING_USER_AGENT")
                .unwrap_or_else(|| "shipping-dispatch/0.1".to_string()),
            app_env,
        })
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
