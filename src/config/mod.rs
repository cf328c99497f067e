//! Application configuration

pub mod client;
pub mod prompts;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use client::{BotConfig, ClientConfig, ConfigError, LlmConfig, SessionConfig};
pub use prompts::PromptTemplate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub bot: BotConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_client("127.0.0.1".into(), 3000, ClientConfig::default())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// `WELLNESS_CONFIG` names an optional TOML file; individual variables
    /// override whatever the file says.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut client = match lookup("WELLNESS_CONFIG") {
            Some(path) => ClientConfig::from_file(&PathBuf::from(path))?,
            None => ClientConfig::default(),
        };

        if let Some(provider) = lookup("WELLNESS_PROVIDER") {
            client.llm.provider = provider;
        }
        if let Some(model) = lookup("WELLNESS_MODEL") {
            client.llm.model = model;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            if client.llm.provider.eq_ignore_ascii_case("ollama") {
                client.llm.endpoint = Some(url);
            }
        }
        client.validate()?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PORT is not a valid port: {}", p)))?,
            None => 3000,
        };

        Ok(Self::with_client(host, port, client))
    }

    fn with_client(host: String, port: u16, client: ClientConfig) -> Self {
        Self {
            host,
            port,
            bot: client.bot,
            llm: client.llm,
            session: client.session,
        }
    }
}
