//! Typed process configuration, loaded once from the environment. `.env` is
//! read first (best-effort, via `dotenvy`) so local development does not
//! require exporting every variable by hand.

use std::env::VarError;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategyKind {
    TokenBucket,
    SlidingWindow,
    FixedWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStorageKind {
    Memory,
    Shared,
}

/// Process-wide configuration, constructed once at startup and shared behind
/// `Arc`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secret_key: String,
    pub jwt_secret_key: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,

    pub rate_limit_enabled: bool,
    pub rate_limit_strategy: RateLimitStrategyKind,
    pub rate_limit_default_limit: u32,
    pub rate_limit_default_window: Duration,
    pub rate_limit_storage: RateLimitStorageKind,
    pub rate_limit_shared_url: Option<String>,

    pub admin_token: Option<String>,
    pub service_api_key: Option<String>,

    pub host: String,
    pub port: u16,
    pub env: String,

    /// Opaque APNs credentials, carried but never interpreted.
    pub apns_key_id: Option<String>,
    pub apns_team_id: Option<String>,
    pub apns_bundle_id: Option<String>,
}

fn required(name: &'static str) -> Result<String, SettingsError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        Ok(_) | Err(VarError::NotPresent) => Err(SettingsError::Missing(name)),
        Err(VarError::NotUnicode(_)) => Err(SettingsError::Invalid {
            name,
            value: "<non-utf8>".into(),
            reason: "not valid unicode".into(),
        }),
    }
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_or_default<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, SettingsError> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| SettingsError::Invalid {
            name,
            value: raw.clone(),
            reason: "expected a number".into(),
        }),
    }
}

impl Settings {
    /// Loads `.env` (if present) then reads every recognized variable.
    /// Required fields without a default fail startup outright.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();

        let rate_limit_strategy = match optional("RATE_LIMIT_STRATEGY").as_deref() {
            None => RateLimitStrategyKind::TokenBucket,
            Some("token_bucket") => RateLimitStrategyKind::TokenBucket,
            Some("sliding_window") => RateLimitStrategyKind::SlidingWindow,
            Some("fixed_window") => RateLimitStrategyKind::FixedWindow,
            Some(other) => {
                return Err(SettingsError::Invalid {
                    name: "RATE_LIMIT_STRATEGY",
                    value: other.into(),
                    reason: "expected token_bucket, sliding_window, or fixed_window".into(),
                })
            }
        };

        let rate_limit_storage = match optional("RATE_LIMIT_STORAGE").as_deref() {
            None => RateLimitStorageKind::Memory,
            Some("memory") => RateLimitStorageKind::Memory,
            Some("shared") => RateLimitStorageKind::Shared,
            Some(other) => {
                return Err(SettingsError::Invalid {
                    name: "RATE_LIMIT_STORAGE",
                    value: other.into(),
                    reason: "expected memory or shared".into(),
                })
            }
        };

        let rate_limit_window_secs: u64 = parse_or_default("RATE_LIMIT_DEFAULT_WINDOW", 60)?;

        Ok(Self {
            secret_key: required("SECRET_KEY")?,
            jwt_secret_key: required("JWT_SECRET_KEY")?,
            access_token_expire_minutes: parse_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            refresh_token_expire_days: parse_or_default("REFRESH_TOKEN_EXPIRE_DAYS", 7)?,

            rate_limit_enabled: parse_or_default("RATE_LIMIT_ENABLED", true)?,
            rate_limit_strategy,
            rate_limit_default_limit: parse_or_default("RATE_LIMIT_DEFAULT_LIMIT", 60)?,
            rate_limit_default_window: Duration::from_secs(rate_limit_window_secs),
            rate_limit_storage,
            rate_limit_shared_url: optional("RATE_LIMIT_SHARED_URL"),

            admin_token: optional("ADMIN_TOKEN"),
            service_api_key: optional("SERVICE_API_KEY"),

            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or_default("PORT", 8080u16)?,
            env: optional("ENV").unwrap_or_else(|| "development".into()),

            apns_key_id: optional("APNS_KEY_ID"),
            apns_team_id: optional("APNS_TEAM_ID"),
            apns_bundle_id: optional("APNS_BUNDLE_ID"),
        })
    }
}
