//! Chat-completions transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSettings;
use crate::error::{ArbitrationError, RoleInvocationError};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat endpoint returned no completion")]
    EmptyCompletion,
}

impl From<LlmError> for RoleInvocationError {
    fn from(e: LlmError) -> Self {
        RoleInvocationError::Unavailable(e.to_string())
    }
}

impl From<LlmError> for ArbitrationError {
    fn from(e: LlmError) -> Self {
        ArbitrationError::Unavailable(e.to_string())
    }
}

/// A single-turn chat completion capability.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    http: reqwest::Client,
    settings: LlmSettings,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(settings: LlmSettings, api_key: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mustread/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            settings,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        debug!(model = %self.settings.model, "sending chat completion");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }
}
