//! Gemini backend — `models/{model}:generateContent`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{api_error, CompletionProvider, CompletionRequest, LlmError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        MODEL
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        let mut parts = vec![Part::Text {
            text: request.prompt,
        }];
        if let Some(image) = request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.base64(),
                },
            });
        }

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: request.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, MODEL))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.text().await?;
        let generated: GenerateResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &generated.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, candidate_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        let candidate = generated
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        // A blocked candidate carries no content; that degrades to an empty completion.
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::ImageInput;
    use mockito::Matcher;
    use serde_json::json;

    fn path() -> String {
        format!("/models/{MODEL}:generateContent")
    }

    #[tokio::test]
    async fn test_complete_joins_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", path().as_str())
            .match_header("x-goog-api-key", "gem-key")
            .match_body(Matcher::PartialJson(json!({
                "systemInstruction": {"parts": [{"text": "You are a helpful tutor."}]},
                "generationConfig": {"temperature": 0.5, "maxOutputTokens": 900}
            })))
            .with_status(200)
            .with_body(
                json!({
                    "candidates": [{"content": {"parts": [{"text": "FEEDBACK:\n"}, {"text": "Nice."}]}}],
                    "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = GeminiProvider::new(Client::new(), "gem-key".into(), server.url());
        let text = provider
            .complete(CompletionRequest {
                system: "You are a helpful tutor.",
                prompt: "help",
                image: None,
                temperature: 0.5,
                max_tokens: 900,
            })
            .await
            .unwrap();

        assert_eq!(text, "FEEDBACK:\nNice.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_sends_inline_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", path().as_str())
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"role": "user", "parts": [
                    {"text": "grade the image"},
                    {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                ]}]
            })))
            .with_status(200)
            .with_body(json!({"candidates": [{"content": {"parts": [{"text": "ok"}]}}]}).to_string())
            .create_async()
            .await;

        let image = ImageInput::new(vec![1u8, 2, 3], "image/png");
        let provider = GeminiProvider::new(Client::new(), "k".into(), server.url());
        let text = provider
            .complete(CompletionRequest {
                system: "You are a strict exam evaluator.",
                prompt: "grade the image",
                image: Some(&image),
                temperature: 0.2,
                max_tokens: 900,
            })
            .await
            .unwrap();

        assert_eq!(text, "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blocked_candidate_yields_empty_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path().as_str())
            .with_status(200)
            .with_body(json!({"candidates": [{"finishReason": "SAFETY"}]}).to_string())
            .create_async()
            .await;

        let provider = GeminiProvider::new(Client::new(), "k".into(), server.url());
        let text = provider
            .complete(CompletionRequest {
                system: "s",
                prompt: "p",
                image: None,
                temperature: 0.2,
                max_tokens: 900,
            })
            .await
            .unwrap();

        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_key_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path().as_str())
            .with_status(400)
            .with_body(json!({"error": {"code": 400, "message": "API key not valid."}}).to_string())
            .create_async()
            .await;

        let provider = GeminiProvider::new(Client::new(), "bad".into(), server.url());
        let err = provider
            .complete(CompletionRequest {
                system: "s",
                prompt: "p",
                image: None,
                temperature: 0.2,
                max_tokens: 900,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", path().as_str())
            .with_header("content-type", "application/json")
            .with_body("<html>proxy error</html>")
            .create_async()
            .await;

        let provider = GeminiProvider::new(Client::new(), "k".into(), server.url());
        let err = provider
            .complete(CompletionRequest {
                system: "s",
                prompt: "p",
                image: None,
                temperature: 0.2,
                max_tokens: 900,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Parse(_)));
    }
}
