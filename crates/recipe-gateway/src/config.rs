//! Configuration management for the Recipe Gateway
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Key for the upstream generative API
    pub gemini_api_key: String,

    /// Upstream base URL, without trailing slash
    pub gemini_base_url: String,

    /// Upstream model name
    pub gemini_model: String,

    /// Timeout for single-response upstream calls
    pub upstream_timeout_secs: u64,

    /// Analytics row-store URL
    pub supabase_url: Option<String>,

    /// Analytics row-store key
    pub supabase_key: Option<String>,

    /// Analytics table name
    pub analytics_table: String,

    /// Requests admitted per client per window
    pub rate_limit_max_requests: usize,

    /// Sliding window length in seconds
    pub rate_limit_window_secs: u64,

    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            gemini_api_key: env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is required")?,

            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string())
                .trim_end_matches('/')
                .to_string(),

            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),

            upstream_timeout_secs: env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid UPSTREAM_TIMEOUT_SECS")?,

            supabase_url: non_empty_var("SUPABASE_URL"),
            supabase_key: non_empty_var("SUPABASE_ANON_KEY"),

            analytics_table: env::var("ANALYTICS_TABLE")
                .unwrap_or_else(|_| "llm_messages".to_string()),

            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_MAX_REQUESTS")?,

            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_WINDOW_SECS")?,

            max_body_bytes: env::var("MAX_BODY_BYTES")
                .unwrap_or_else(|_| "20971520".to_string())
                .parse()
                .context("Invalid MAX_BODY_BYTES")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("PORT must be greater than 0");
        }

        if self.gemini_api_key.trim().is_empty() {
            anyhow::bail!("GEMINI_API_KEY must not be empty");
        }

        if self.rate_limit_max_requests == 0 {
            anyhow::bail!("RATE_LIMIT_MAX_REQUESTS must be greater than 0");
        }

        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be greater than 0");
        }

        if self.supabase_url.is_some() != self.supabase_key.is_some() {
            anyhow::bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be set together");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Whether an analytics store is configured
    pub fn analytics_enabled(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_key.is_some()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
