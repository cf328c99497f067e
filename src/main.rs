//! Wellness Chat - health & wellness chat bot API
//!
//! Forwards each user's conversation to a hosted LLM and serves the
//! transcript back to whatever front-end renders it. Conversations live in
//! memory only, one per session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod credentials;
mod providers;
mod routes;

use config::{Config, PromptTemplate};
use crate::core::{SamplingParams, SessionStore};
use providers::{CompletionProvider, Provider};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub provider: Arc<dyn CompletionProvider>,
    pub persona: Arc<PromptTemplate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wellness_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let api_key = if Provider::requires_api_key(&config.llm.provider) {
        let var_name = config.llm.api_key_env.clone();
        let acquired = tokio::task::spawn_blocking(move || credentials::acquire(&var_name))
            .await
            .context("credential prompt task failed")??;

        match acquired {
            Some(key) => Some(key),
            None => {
                eprintln!(
                    "Add your {} to the environment (or a .env file) or paste it at the prompt.",
                    config.llm.api_key_env
                );
                tracing::info!("no API key available, not starting");
                return Ok(());
            }
        }
    } else {
        None
    };

    let provider = Provider::from_config(&config, api_key.as_ref().map(|k| k.expose()))?;
    let persona = PromptTemplate::resolve(config.bot.persona_file.as_deref())
        .await
        .context("failed to load persona")?;

    tracing::info!(
        provider = provider.name(),
        model = %config.llm.model,
        persona = %persona.persona.name,
        "🩺 chat backend ready"
    );

    let sessions = Arc::new(SessionStore::new(
        persona.system_prompt.content.clone(),
        SamplingParams::from(&config.llm),
    ));

    if config.session.idle_timeout_secs > 0 {
        tokio::spawn(crate::core::run_sweeper(
            sessions.clone(),
            Duration::from_secs(config.session.idle_timeout_secs),
            Duration::from_secs(config.session.sweep_interval_secs),
        ));
    }

    let state = AppState {
        sessions,
        provider: Arc::new(provider),
        persona: Arc::new(persona),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Wellness chat API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
