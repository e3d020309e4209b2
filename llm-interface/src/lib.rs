use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use threadwatch_core::{CoreError, LlmConfig, LlmError};
use tracing::{debug, error, info};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

const PROVIDER: &str = "openai";

/// A chat model that turns a system prompt and a user message into text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, CoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CoreError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidApiKey {
                provider: PROVIDER.to_string(),
            }
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, CoreError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request failed: {}", e);
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            error!("OpenAI API error ({}): {}", status, body);
            return Err(self.status_error(status, retry_after, body).into());
        }

        response.json::<ChatResponse>().await.map_err(|e| {
            error!("Failed to parse OpenAI response: {}", e);
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })
        })
    }

    fn status_error(&self, status: StatusCode, retry_after: Option<u64>, body: String) -> LlmError {
        let provider = PROVIDER.to_string();
        match status.as_u16() {
            401 | 403 => LlmError::InvalidApiKey { provider },
            404 => LlmError::ModelNotAvailable {
                model: self.model.clone(),
            },
            429 => LlmError::RateLimitExceeded {
                provider,
                retry_after: retry_after.unwrap_or(60),
            },
            _ if status.is_server_error() => LlmError::ServiceUnavailable { provider },
            code => LlmError::RequestFailed {
                provider,
                status_code: code,
                message: body.chars().take(500).collect(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CoreError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
        };

        let response = self.chat(&request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyCompletion {
                provider: PROVIDER.to_string(),
            })?;

        info!(model = %self.model, chars = content.len(), "Received completion");
        Ok(content)
    }
}
