//! The chat-completion collaborator.
//!
//! [`CompletionClient`] is the seam the session controller talks through;
//! [`HttpCompletionClient`] is the OpenAI-compatible implementation used by
//! the binary. Tests substitute in-memory fakes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::{ChatMessage, ChatRequest, ChatResponse};

#[derive(Debug)]
pub enum CompletionError {
    /// The request never produced an HTTP response.
    Transport(reqwest::Error),
    /// The endpoint answered with a non-success status.
    Api { status: u16, message: String },
    /// The response body was not a chat completion.
    InvalidResponse(String),
    /// The completion carried no text.
    EmptyReply,
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Transport(err) => write!(f, "Request failed: {err}"),
            CompletionError::Api { status, message } => write!(f, "({status}) {message}"),
            CompletionError::InvalidResponse(msg) => write!(f, "Unexpected response: {msg}"),
            CompletionError::EmptyReply => write!(f, "The model returned an empty reply"),
        }
    }
}

impl std::error::Error for CompletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompletionError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `messages` to `model` and return the reply text.
    async fn complete(&self, model: &str, messages: &[ChatMessage])
        -> Result<String, CompletionError>;
}

pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(CompletionError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let chat_url = chat_completions_url(&self.base_url);
        debug!(url = %chat_url, model, messages = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(CompletionError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(CompletionError::Transport)?;

        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: format_api_error(&body),
            });
        }

        extract_reply(&body)
    }
}

/// `<base>/chat/completions`, tolerating trailing slashes on the base.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Pull the first choice's text out of a chat-completion response body.
pub fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(CompletionError::EmptyReply)?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CompletionError::EmptyReply);
    }
    Ok(trimmed.to_string())
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body for the transcript.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API Error: {summary}");
            }
        }
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return format!("API Error:\n{pretty_json}");
        }
    }

    format!("API Error: {trimmed}")
}
