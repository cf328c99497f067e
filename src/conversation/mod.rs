//! Conversation types and the message log

mod normalize;

use serde::{Deserialize, Serialize};

pub use normalize::normalize_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Ordered, append-only transcript.
///
/// The first entry is always the system message. It is replayed to the
/// provider on every turn but never yielded by [`ConversationLog::visible`].
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn with_system(prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(normalize_text(prompt))],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn visible(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Drop everything after the system message.
    pub fn truncate_to_system(&mut self) {
        self.messages.truncate(1);
    }
}
