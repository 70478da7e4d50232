//! Process configuration loaded from the environment.

use chrono_tz::Tz;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::extraction::client::{DEFAULT_API_URL, DEFAULT_MODEL};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub timezone: Tz,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Public base URL; presence switches from polling to webhook delivery
    pub webhook_url: Option<String>,
    pub webhook_addr: SocketAddr,
    pub health_addr: SocketAddr,
    pub db_pool_min_size: u32,
    pub db_pool_max_size: u32,
    /// Messages per user per minute, 0 disables limiting
    pub rate_limit_messages: u32,
    pub conversation_timeout: Duration,
    pub session_mirror: bool,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// Required: `TELEGRAM_BOT_TOKEN`, `DATABASE_URL`, `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let config = Self {
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            database_url: required("DATABASE_URL")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_url: get("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timezone: parse_or("TIMEZONE", get("TIMEZONE"), chrono_tz::America::Bogota)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: match get("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
                None | Some("text") => LogFormat::Text,
                Some("json") => LogFormat::Json,
                Some(other) => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT",
                        reason: format!("expected 'text' or 'json', got '{other}'"),
                    })
                }
            },
            webhook_url: get("WEBHOOK_URL").map(|u| u.trim_end_matches('/').to_string()),
            webhook_addr: parse_or("WEBHOOK_ADDR", get("WEBHOOK_ADDR"), SocketAddr::from(([0, 0, 0, 0], 8443)))?,
            health_addr: parse_or("HEALTH_ADDR", get("HEALTH_ADDR"), SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            db_pool_min_size: parse_or("DB_POOL_MIN_SIZE", get("DB_POOL_MIN_SIZE"), 2)?,
            db_pool_max_size: parse_or("DB_POOL_MAX_SIZE", get("DB_POOL_MAX_SIZE"), 10)?,
            rate_limit_messages: parse_or("RATE_LIMIT_MESSAGES", get("RATE_LIMIT_MESSAGES"), 30)?,
            conversation_timeout: Duration::from_secs(parse_or(
                "CONVERSATION_TIMEOUT_SECS",
                get("CONVERSATION_TIMEOUT_SECS"),
                600u64,
            )?),
            session_mirror: parse_bool("SESSION_MIRROR", get("SESSION_MIRROR"))?,
        };

        if config.db_pool_max_size == 0 || config.db_pool_min_size > config.db_pool_max_size {
            return Err(ConfigError::Invalid {
                key: "DB_POOL_MAX_SIZE",
                reason: format!(
                    "pool bounds {}..{} are inconsistent",
                    config.db_pool_min_size, config.db_pool_max_size
                ),
            });
        }

        Ok(config)
    }

    /// Full webhook endpoint, when webhook delivery is configured
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url.as_ref().map(|url| format!("{url}/webhook"))
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
