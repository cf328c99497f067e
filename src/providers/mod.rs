//! Chat completion back-ends
//!
//! The session only sees [`CompletionProvider`]: hand it the whole log plus
//! sampling settings, get back either the reply text or a [`ProviderError`].

mod ollama;
mod openai_compat;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::conversation::Message;

pub use ollama::OllamaProvider;
pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Everything a back-end needs for one completion call
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// "Send conversation, receive reply"
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

pub enum Provider {
    OpenAICompat(OpenAICompatProvider),
    Ollama(OllamaProvider),
}

impl Provider {
    /// Build the back-end named in the configuration.
    ///
    /// `api_key` is required for hosted back-ends and ignored by Ollama.
    pub fn from_config(config: &Config, api_key: Option<&str>) -> Result<Self, ProviderError> {
        let name = config.llm.provider.to_lowercase();
        match name.as_str() {
            "mistral" | "openai" => {
                let key = api_key
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| ProviderError::NotConfigured(name.clone()))?;

                let mut compat = if name == "mistral" {
                    OpenAICompatConfig::mistral(key)
                } else {
                    OpenAICompatConfig::openai(key)
                };
                if let Some(ref endpoint) = config.llm.endpoint {
                    compat.base_url = endpoint.trim_end_matches('/').to_string();
                }
                compat.timeout_secs = config.llm.timeout_secs;

                Ok(Provider::OpenAICompat(OpenAICompatProvider::new(compat)?))
            }
            "ollama" => {
                let url = config
                    .llm
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".into());
                Ok(Provider::Ollama(OllamaProvider::new(url, config.llm.timeout_secs)?))
            }
            _ => Err(ProviderError::UnknownProvider(config.llm.provider.clone())),
        }
    }

    /// Whether this back-end needs an API key at startup
    pub fn requires_api_key(provider: &str) -> bool {
        !provider.eq_ignore_ascii_case("ollama")
    }
}

#[async_trait]
impl CompletionProvider for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::OpenAICompat(p) => p.name(),
            Provider::Ollama(p) => p.name(),
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        match self {
            Provider::OpenAICompat(p) => p.complete(request).await,
            Provider::Ollama(p) => p.complete(request).await,
        }
    }
}
