//! LLM Client — the single point of entry for all model calls in Xaminai.
//!
//! ARCHITECTURAL RULE: No other module may call a vendor API directly.
//! Grading code receives a `CompletionProvider` at construction and only ever
//! talks to that trait.
//!
//! Two backends exist: Groq (OpenAI-compatible chat completions, used for text)
//! and Gemini (`generateContent`, used for images). Either can serve either role.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

pub mod gemini;
pub mod groq;
pub mod prompts;

/// Output cap applied to every grading and companion call.
pub const MAX_OUTPUT_TOKENS: u32 = 900;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider returned no candidates")]
    EmptyResponse,
}

/// Raw image payload forwarded to a vision-capable model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageInput {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// `data:` URL form used by OpenAI-compatible `image_url` parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

/// One outbound completion call: a system prompt, a user prompt, an optional
/// image, and fixed sampling parameters.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub image: Option<&'a ImageInput>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A language-model backend. Implement this to add a vendor without touching
/// the grading facade, the handlers, or the parser.
///
/// Carried in `Grader` as `Arc<dyn CompletionProvider>`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short backend name for logs ("groq", "gemini", ...).
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Sends one request and returns the raw completion text.
    /// An empty string is a valid completion; the parser degrades it to defaults.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError>;
}

/// Which backend fills a role (text or vision) in the grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    Gemini,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "gemini" => Ok(ProviderKind::Gemini),
            other => anyhow::bail!("Unknown LLM provider '{other}' (expected 'groq' or 'gemini')"),
        }
    }
}

/// Builds the shared HTTP client used by every provider.
pub fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")
}

/// Constructs the provider configured for `kind`, sharing one HTTP client.
pub fn build_provider(
    kind: ProviderKind,
    config: &Config,
    client: Client,
) -> Arc<dyn CompletionProvider> {
    match kind {
        ProviderKind::Groq => Arc::new(groq::GroqProvider::new(
            client,
            config.groq_api_key.clone(),
            config.groq_base_url.clone(),
        )),
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new(
            client,
            config.gemini_api_key.clone(),
            config.gemini_base_url.clone(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct VendorError {
    error: VendorErrorBody,
}

#[derive(Debug, Deserialize)]
struct VendorErrorBody {
    message: String,
}

/// Turns a non-2xx response into `LlmError::Api`.
/// Both vendors wrap failures as `{"error": {"message": ...}}`; fall back to the raw body.
pub(crate) async fn api_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<VendorError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
