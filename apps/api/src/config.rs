use anyhow::{Context, Result};

use crate::llm_client::{gemini, groq, ProviderKind};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub groq_api_key: String,
    pub groq_base_url: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    /// Backend used for text grading and text companion calls.
    pub text_provider: ProviderKind,
    /// Backend used for image grading and image companion calls.
    pub vision_provider: ProviderKind,
    /// Service account key (JSON). Drive routes are disabled when absent.
    pub google_service_account_json: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: optional_env("DATABASE_MAX_CONNECTIONS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?
                .unwrap_or(10),
            groq_api_key: require_env("GROQ_API_KEY")?,
            groq_base_url: optional_env("GROQ_BASE_URL")
                .unwrap_or_else(|| groq::DEFAULT_BASE_URL.to_string()),
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            text_provider: optional_env("TEXT_PROVIDER")
                .as_deref()
                .unwrap_or("groq")
                .parse()
                .context("TEXT_PROVIDER is invalid")?,
            vision_provider: optional_env("VISION_PROVIDER")
                .as_deref()
                .unwrap_or("gemini")
                .parse()
                .context("VISION_PROVIDER is invalid")?,
            google_service_account_json: optional_env("GOOGLE_SERVICE_ACCOUNT_JSON"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable only when it is set to a non-blank value.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
