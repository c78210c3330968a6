//! Application configuration loaded from environment variables.
//!
//! Credentials stored in the central database are encrypted with
//! `encryption_key`; the platform-wide LLM keys are fallbacks for websites
//! without their own keys.

use dotenvy::dotenv;
use std::env;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the central coordination database (REST interface)
    pub central_db_url: String,
    /// Service key for the central database
    pub central_db_service_key: String,
    /// Process-wide credential encryption key (base64, 32 bytes decoded)
    pub encryption_key: String,
    /// Platform-wide fallback LLM keys
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Google Custom Search credentials (topic discovery)
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            central_db_url: require("CENTRAL_DB_URL")?,
            central_db_service_key: require("CENTRAL_DB_SERVICE_KEY")?,
            encryption_key: require("ENCRYPTION_KEY")?,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|v| !v.is_empty()),
            google_search_api_key: env::var("GOOGLE_SEARCH_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            google_search_engine_id: env::var("GOOGLE_SEARCH_ENGINE_ID")
                .ok()
                .filter(|v| !v.is_empty()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidVar("PORT", env::var("PORT").unwrap_or_default())
                })?,
        })
    }

    /// True when at least one platform-wide LLM key is configured.
    pub fn has_platform_llm_key(&self) -> bool {
        self.openai_api_key.is_some() || self.anthropic_api_key.is_some()
    }

    /// True when Google Custom Search is usable.
    pub fn has_google_search(&self) -> bool {
        self.google_search_api_key.is_some() && self.google_search_engine_id.is_some()
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}
