//! Configuration management for the gateway.
//!
//! All configuration comes from the environment (optionally seeded from a
//! `.env` file loaded in `main`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port to listen on
    pub port: u16,

    /// Base URL of the OpenAI-compatible upstream (e.g. `http://localhost:8094/v1`)
    pub openai_base_url: String,

    /// Fallback upstream API key used when the client does not forward one
    pub openai_api_key: Option<String>,

    /// Upstream response timeout in seconds. Streams are long-lived, so this
    /// defaults to ten minutes.
    pub request_timeout_secs: u64,
}

fn default_port() -> u16 {
    8092
}

fn default_base_url() -> String {
    "http://localhost:8094/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT value: {}", v))?,
            Err(_) => default_port(),
        };

        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| default_base_url())
            .trim_end_matches('/')
            .to_string();

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let request_timeout_secs = match std::env::var("REQUEST_TIMEOUT_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .with_context(|| format!("Invalid REQUEST_TIMEOUT_SECS value: {}", v))?,
            Err(_) => default_timeout_secs(),
        };

        Ok(AppConfig {
            port,
            openai_base_url,
            openai_api_key,
            request_timeout_secs,
        })
    }

    /// Full URL of the upstream chat completions endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.openai_base_url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            openai_base_url: default_base_url(),
            openai_api_key: None,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}
