//! OpenAI-compatible chat completions client.
//!
//! Works against api.openai.com as well as any server exposing the same
//! `/chat/completions` contract (Ollama, vLLM, LM Studio).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{GenerationSettings, TextGenerator};
use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::{ApiKey, TriadError};

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    settings: GenerationSettings,
    api_key: ApiKey,
    base_url: String,
    timeout_ms: u64,
    client: Client,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig, api_key: ApiKey) -> Result<Self, TriadError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| {
                TriadError::InvalidConfiguration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self {
            settings: GenerationSettings::from(config),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
            client,
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout {
                after_ms: self.timeout_ms,
            }
        } else {
            GenerationError::Unavailable(err.to_string())
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> GenerationError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited(body)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        GenerationError::Unavailable(format!("{status}: {body}"))
    } else {
        GenerationError::InvalidResponse(format!("{status}: {body}"))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        debug!(
            model = %self.settings.model,
            prompt_len = user_prompt.len(),
            "requesting chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "chat completion request failed");
                self.classify_transport(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "provider returned error status");
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                self.classify_transport(err)
            } else {
                GenerationError::InvalidResponse(format!("unparseable completion: {err}"))
            }
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("completion had no content".into()))?;

        if let Some(usage) = parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion finished"
            );
        }

        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator_for(base_url: String) -> OpenAiGenerator {
        let config = LlmConfig {
            base_url,
            model: "test-model".into(),
            timeout_ms: 2_000,
            ..LlmConfig::default()
        };
        OpenAiGenerator::new(&config, ApiKey::new("test-key")).unwrap()
    }

    #[tokio::test]
    async fn sends_system_and_user_prompts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "max_tokens": 500,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "What is Rust?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"message": {"role": "assistant", "content": "A language."}}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
                }"#,
            )
            .create_async()
            .await;

        let generator = generator_for(format!("{}/v1", server.url()));
        let text = generator.invoke("be brief", "What is Rust?").await.unwrap();

        assert_eq!(text, "A language.");
        assert_eq!(generator.model_id(), "test-model");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": {"message": "Rate limit reached"}}"#)
            .create_async()
            .await;

        let generator = generator_for(format!("{}/v1", server.url()));
        let err = generator.invoke("sys", "user").await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited(_)));
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let generator = generator_for(format!("{}/v1", server.url()));
        let err = generator.invoke("sys", "user").await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let generator = generator_for(format!("{}/v1", server.url()));
        let err = generator.invoke("sys", "user").await.unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_invalid_responses() {
        let err = classify_status(StatusCode::BAD_REQUEST, "bad".into());
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }
}
