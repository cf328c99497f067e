//! API routes
//!
//! The display surface: a front-end creates a session, posts user text to
//! it, and re-fetches the visible transcript whenever it redraws.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::conversation::Message;
use crate::core::{SessionEntry, TurnOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

#[derive(Debug, Serialize)]
struct BotResponse {
    name: String,
    description: String,
    placeholder: String,
    examples: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    session_id: Uuid,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
struct TurnResponse {
    session_id: Uuid,
    ok: bool,
    reply: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Message content must not be empty")]
    EmptyMessage,

    #[error("Turn aborted: {0}")]
    TurnAborted(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EmptyMessage => StatusCode::BAD_REQUEST,
            ApiError::TurnAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn lock_session(
    state: &AppState,
    id: Uuid,
) -> Result<OwnedMutexGuard<SessionEntry>, ApiError> {
    state
        .sessions
        .lock(&id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len().await,
    })
}

async fn bot(State(state): State<AppState>) -> Json<BotResponse> {
    let persona = &state.persona;
    Json(BotResponse {
        name: persona.persona.name.clone(),
        description: persona.persona.description.clone(),
        placeholder: persona.persona.placeholder.clone(),
        examples: persona.examples.questions.clone(),
    })
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<TranscriptResponse>) {
    let session_id = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(TranscriptResponse {
            session_id,
            messages: Vec::new(),
        }),
    )
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let entry = lock_session(&state, id).await?;

    Ok(Json(TranscriptResponse {
        session_id: id,
        messages: entry.session.history().cloned().collect(),
    }))
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if request.content.is_empty() {
        return Err(ApiError::EmptyMessage);
    }

    let mut entry = lock_session(&state, id).await?;
    let provider = state.provider.clone();

    // The turn owns the session lock, so a client that hangs up mid-call
    // still gets its reply appended.
    let outcome = tokio::spawn(async move {
        let outcome = entry.session.turn(&request.content, provider.as_ref()).await;
        entry.touch();
        outcome
    })
    .await
    .map_err(|e| {
        tracing::error!(session = %id, error = %e, "turn task failed");
        ApiError::TurnAborted(e.to_string())
    })?;

    tracing::debug!(session = %id, ok = outcome.is_success(), "turn complete");

    let ok = outcome.is_success();
    let reply = outcome.message().clone();
    let error = match outcome {
        TurnOutcome::Failed { reason, .. } => Some(reason),
        TurnOutcome::Replied(_) => None,
    };

    Ok(Json(TurnResponse {
        session_id: id,
        ok,
        reply,
        error,
    }))
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut entry = lock_session(&state, id).await?;
    entry.session.clear();
    tracing::info!(session = %id, "session cleared");

    Ok(Json(TranscriptResponse {
        session_id: id,
        messages: Vec::new(),
    }))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/bot", get(bot))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", delete(end_session))
        .route("/v1/sessions/:id/messages", get(list_messages).post(post_message))
        .route("/v1/sessions/:id/clear", post(clear_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptTemplate;
    use crate::core::{SamplingParams, SessionStore};
    use crate::providers::{CompletionProvider, CompletionRequest, ProviderError};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Echoes the last user message back, or fails on demand
    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
            let last = request.messages.last().map(|m| m.content.as_str()).unwrap_or("");
            if last == "fail" {
                return Err(ProviderError::InvalidResponse("No choices in response".into()));
            }
            Ok(format!("You said \u{201C}{}\u{201D}", last))
        }
    }

    /// Takes long enough for a client to give up first
    struct SlowProvider;

    #[async_trait]
    impl CompletionProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            Ok("Worth the wait.".to_string())
        }
    }

    fn state_with(provider: Arc<dyn CompletionProvider>) -> AppState {
        let persona = PromptTemplate::builtin();
        AppState {
            sessions: Arc::new(SessionStore::new(
                persona.system_prompt.content.clone(),
                SamplingParams::default(),
            )),
            provider,
            persona: Arc::new(persona),
        }
    }

    fn state() -> AppState {
        state_with(Arc::new(EchoProvider))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_bot() {
        let app = router().with_state(state());

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);

        let (status, body) = send(&app, "GET", "/v1/bot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["placeholder"], "Ask me about health, wellness, or lifestyle tips...");
    }

    #[tokio::test]
    async fn test_turn_and_transcript() {
        let app = router().with_state(state());
        let id = new_session(&app).await;

        let (_, body) = send(&app, "GET", &format!("/v1/sessions/{id}/messages"), None).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": "cafe\u{301}"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["reply"]["role"], "assistant");
        assert_eq!(body["reply"]["content"], "You said \"caf\u{e9}\"");
        assert!(body.get("error").is_none());

        let (_, body) = send(&app, "GET", &format!("/v1/sessions/{id}/messages"), None).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "caf\u{e9}");
        assert!(messages.iter().all(|m| m["role"] != "system"));
    }

    #[tokio::test]
    async fn test_failed_turn_is_degraded_not_error() {
        let app = router().with_state(state());
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": "fail"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert!(body["reply"]["content"].as_str().unwrap().starts_with("Error:"));
        assert!(body["error"].as_str().unwrap().contains("No choices"));

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": "again"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, body) = send(&app, "GET", &format!("/v1/sessions/{id}/messages"), None).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let app = router().with_state(state());
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_whitespace_message_is_a_turn() {
        let app = router().with_state(state());
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_turn_completes_after_client_hangs_up() {
        let state = state_with(Arc::new(SlowProvider));
        let sessions = state.sessions.clone();
        let app = router().with_state(state);
        let id = new_session(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri(format!("/v1/sessions/{id}/messages"))
            .header("content-type", "application/json")
            .body(Body::from(json!({"content": "hello"}).to_string()))
            .unwrap();
        let dropped = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            app.clone().oneshot(request),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;

        let id: Uuid = id.parse().unwrap();
        let entry = sessions.lock(&id).await.unwrap();
        let roles: Vec<_> = entry.session.log().iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(entry.session.history().last().unwrap().content, "Worth the wait.");
    }

    #[tokio::test]
    async fn test_clear_and_end_session() {
        let app = router().with_state(state());
        let id = new_session(&app).await;

        send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": "hello"})),
        )
        .await;

        let (status, body) = send(&app, "POST", &format!("/v1/sessions/{id}/clear"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);

        let (_, body) = send(&app, "GET", &format!("/v1/sessions/{id}/messages"), None).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);

        let (status, _) = send(&app, "DELETE", &format!("/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "DELETE", &format!("/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = router().with_state(state());
        let id = Uuid::new_v4();

        let (status, body) = send(&app, "GET", &format!("/v1/sessions/{id}/messages"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains(&id.to_string()));

        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{id}/messages"),
            Some(json!({"content": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
