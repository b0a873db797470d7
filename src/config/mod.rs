//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. Sensitive values wrapped in secrecy::SecretString to prevent
//! log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use crate::model::UserId;
use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Identity the CLI acts as. Optional for library consumers that
    /// authenticate through [`crate::auth::AuthService`].
    pub user_id: Option<UserId>,
    pub user_email: String,
    pub gemini: GeminiConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

/// Settings for the generative-language endpoint.
///
/// A missing `api_key` means the assistant runs on its keyword fallback only.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let user_id = match optional_var("FIELDLOG_USER_ID") {
            Some(raw) => Some(raw.parse::<UserId>().map_err(|e| {
                Error::Config(format!("FIELDLOG_USER_ID is not a valid UUID: {e}"))
            })?),
            None => None,
        };

        let timeout = match optional_var("GEMINI_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                Error::Config(format!("GEMINI_TIMEOUT_SECS must be an integer, got {raw}"))
            })?),
            None => GeminiConfig::default().timeout,
        };

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            user_id,
            user_email: optional_var("FIELDLOG_USER_EMAIL").unwrap_or_default(),
            gemini: GeminiConfig {
                api_key: optional_var("GEMINI_API_KEY").map(SecretString::from),
                model: optional_var("GEMINI_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: optional_var("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout,
            },
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and blank are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
