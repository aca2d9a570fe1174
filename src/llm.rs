//! Chat-completion client for a locally served language model.
//!
//! [`OllamaChat`] sends one non-streaming `POST {url}/api/chat` per question.
//! There is no retry: a failed question is reported to the user, who may ask
//! again. Connection failures are kept apart from other errors so the caller
//! can point at the usual fix (start Ollama).

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Nothing is listening at `url` (refused, DNS failure, connect timeout).
    #[error("cannot connect to the language model at {url}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("language model returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("request to the language model failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response from the language model: {0}")]
    InvalidResponse(String),
}

/// A model that answers a single system + user exchange.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Base URL of the serving endpoint, for diagnostics.
    fn endpoint(&self) -> &str;
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "options": { "temperature": self.temperature },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        tracing::debug!("asking {} at {}", self.model, self.url);

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Unreachable {
                        url: self.url.clone(),
                        source: e,
                    }
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| LlmError::InvalidResponse("missing message.content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_content() {
        let json = serde_json::json!({
            "model": "llama3.1",
            "message": { "role": "assistant", "content": "**42**" },
            "done": true
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "**42**");
    }

    #[test]
    fn rejects_missing_content() {
        let json = serde_json::json!({ "error": "model not found" });
        assert!(matches!(
            parse_chat_response(&json),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let config = LlmConfig {
            url: "http://127.0.0.1:9/".to_string(),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        let chat = OllamaChat::new(&config).unwrap();
        assert_eq!(chat.endpoint(), "http://127.0.0.1:9");
        let err = chat.complete("system", "hello").await.unwrap_err();
        match err {
            LlmError::Unreachable { url, .. } => assert_eq!(url, "http://127.0.0.1:9"),
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }
}
