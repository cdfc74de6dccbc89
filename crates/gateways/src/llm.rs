//! OpenAI-compatible chat completion client.
//!
//! Retry policy is explicit and configurable: transport-level failures are
//! retried up to `max_retries` times with a short fixed delay; API-level
//! errors and malformed responses are never retried. The default is a
//! single attempt.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use askcrm_agent::llm::LlmClient;
use askcrm_core::config::LlmConfig;

const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct ChatCompletionConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl From<&LlmConfig> for ChatCompletionConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion transport error: {0}")]
    Transport(String),
    #[error("completion API error: {0}")]
    Api(String),
    #[error("completion response was malformed: {0}")]
    Malformed(String),
}

impl CompletionError {
    fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: ChatCompletionConfig,
}

impl ChatCompletionClient {
    pub fn new(config: ChatCompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CompletionError::Transport(error.to_string()))?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn try_complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| CompletionError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| CompletionError::Transport(error.to_string()))?;

        if status.is_server_error() {
            return Err(CompletionError::Transport(format!("status {status}: {body}")));
        }

        let parsed = serde_json::from_str::<ChatResponse>(&body)
            .map_err(|error| CompletionError::Malformed(format!("{error}: {body}")))?;

        if let Some(detail) = parsed.error {
            return Err(CompletionError::Api(detail.message));
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Malformed("response carried no choices".to_string()))
    }
}

#[async_trait]
impl LlmClient for ChatCompletionClient {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.try_complete(system, user, temperature).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_transport() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "gateway.llm.retry",
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %error,
                        "transport failure, retrying completion"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatCompletionClient, ChatCompletionConfig, ChatResponse};

    fn config(base_url: &str) -> ChatCompletionConfig {
        ChatCompletionConfig {
            base_url: base_url.to_string(),
            api_key: String::from("sk-test").into(),
            model: "gpt-4.1-mini".to_string(),
            timeout_secs: 5,
            max_retries: 0,
        }
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let client = ChatCompletionClient::new(config("https://api.test/v1/")).expect("client");
        assert_eq!(client.completions_url(), "https://api.test/v1/chat/completions");

        let client = ChatCompletionClient::new(config("https://api.test/v1")).expect("client");
        assert_eq!(client.completions_url(), "https://api.test/v1/chat/completions");
    }

    #[test]
    fn response_shape_decodes_content_and_embedded_errors() {
        let ok = r#"{"choices": [{"message": {"role": "assistant", "content": "hello"}}]}"#;
        let parsed = serde_json::from_str::<ChatResponse>(ok).expect("response");
        assert_eq!(parsed.choices[0].message.content, "hello");
        assert!(parsed.error.is_none());

        let err = r#"{"error": {"message": "invalid api key", "type": "auth"}}"#;
        let parsed = serde_json::from_str::<ChatResponse>(err).expect("response");
        assert!(parsed.choices.is_empty());
        assert_eq!(parsed.error.map(|detail| detail.message).as_deref(), Some("invalid api key"));
    }
}
