//! A single user's conversation
//!
//! Each turn runs the same way: normalize the user text and append it,
//! replay the whole log (system message included) to the provider, then
//! normalize and append whatever comes back. A failed provider call still
//! produces an assistant message, so the transcript never ends on a
//! dangling user message and the session stays usable.

use crate::config::LlmConfig;
use crate::conversation::{normalize_text, ConversationLog, Message};
use crate::providers::{CompletionProvider, CompletionRequest};

/// Fixed sampling settings sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for SamplingParams {
    fn from(llm: &LlmConfig) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        }
    }
}

/// Result of asking the provider for a reply.
///
/// Both variants carry the assistant message that was appended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Replied(Message),
    Failed { reason: String, message: Message },
}

impl TurnOutcome {
    pub fn message(&self) -> &Message {
        match self {
            TurnOutcome::Replied(message) => message,
            TurnOutcome::Failed { message, .. } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Replied(_))
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    log: ConversationLog,
    sampling: SamplingParams,
}

impl ConversationSession {
    pub fn new(system_prompt: &str, sampling: SamplingParams) -> Self {
        Self {
            log: ConversationLog::with_system(system_prompt),
            sampling,
        }
    }

    /// Normalize `text` and append it as a user message.
    pub fn append_user(&mut self, text: &str) {
        self.log.push(Message::user(normalize_text(text)));
    }

    /// Send the full log to `provider` and append the reply.
    ///
    /// Never returns an error: a failure becomes an `Error: ...` assistant
    /// message and is reported through [`TurnOutcome::Failed`].
    pub async fn request_reply<P>(&mut self, provider: &P) -> TurnOutcome
    where
        P: CompletionProvider + ?Sized,
    {
        let request = self.completion_request();

        match provider.complete(&request).await {
            Ok(text) => {
                let message = Message::assistant(normalize_text(&text));
                self.log.push(message.clone());
                tracing::debug!(provider = provider.name(), "reply appended");
                TurnOutcome::Replied(message)
            }
            Err(e) => {
                let reason = normalize_text(&e.to_string());
                tracing::warn!(provider = provider.name(), error = %reason, "completion failed");
                let message = Message::assistant(format!("Error: {}", reason));
                self.log.push(message.clone());
                TurnOutcome::Failed { reason, message }
            }
        }
    }

    /// One full turn: append the user text, then fetch the reply.
    pub async fn turn<P>(&mut self, text: &str, provider: &P) -> TurnOutcome
    where
        P: CompletionProvider + ?Sized,
    {
        self.append_user(text);
        self.request_reply(provider).await
    }

    /// Visible transcript, oldest first. The system message is skipped.
    pub fn history(&self) -> impl Iterator<Item = &Message> + '_ {
        self.log.visible()
    }

    /// Reset to the state of a fresh session.
    pub fn clear(&mut self) {
        self.log.truncate_to_system();
    }

    /// Everything that gets replayed to the provider.
    pub fn log(&self) -> &[Message] {
        self.log.messages()
    }

    fn completion_request(&self) -> CompletionRequest {
        CompletionRequest {
            model: self.sampling.model.clone(),
            messages: self.log.messages().to_vec(),
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        }
    }
}
