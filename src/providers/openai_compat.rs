//! OpenAI-compatible provider
//!
//! Works with any API that implements the OpenAI chat completions format.
//! Mistral's hosted API is the default target:
//!
//! ```toml
//! [llm]
//! provider = "mistral"
//! model = "mistral-large-latest"
//! api_key_env = "MISTRAL_API_KEY"
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;

use super::{CompletionProvider, CompletionRequest, ProviderError};

/// OpenAI-compatible chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error bodies come in two shapes: OpenAI nests `error.message`,
/// Mistral returns a flat `message`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Nested { error: ApiError },
    Flat { message: String },
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ErrorResponse {
    fn into_message(self) -> String {
        match self {
            ErrorResponse::Nested { error } => error.message,
            ErrorResponse::Flat { message } => message,
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Name used in logs ("mistral", "openai")
    pub name: String,
    /// Base URL for the API (e.g., https://api.mistral.ai/v1)
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAICompatConfig {
    /// Create config for Mistral
    pub fn mistral(api_key: impl Into<String>) -> Self {
        Self {
            name: "mistral".to_string(),
            base_url: "https://api.mistral.ai/v1".to_string(),
            api_key: api_key.into(),
            timeout_secs: 60,
        }
    }

    /// Create config for OpenAI
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            timeout_secs: 60,
        }
    }
}

/// OpenAI-compatible API provider
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: Client,
}

impl OpenAICompatProvider {
    pub fn new(config: OpenAICompatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(ErrorResponse::into_message)
                .unwrap_or(text);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| ProviderError::InvalidResponse("Reply has no content".to_string()))
    }
}
