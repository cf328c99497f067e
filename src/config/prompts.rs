//! Persona templates
//!
//! The system prompt and the bits of copy a front-end shows (title, input
//! placeholder, example questions) come from a persona. Without a persona
//! file the built-in health & wellness persona is used.
//!
//! # Example Persona File
//!
//! ```toml
//! [persona]
//! name = "Sleep Coach"
//! description = "Practical advice for better sleep"
//! placeholder = "Ask me about sleep..."
//!
//! [system_prompt]
//! content = """
//! You are a friendly sleep coach...
//! """
//!
//! [examples]
//! questions = ["How long should I nap?"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// A persona/prompt template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Persona metadata
    pub persona: PersonaInfo,

    /// The system prompt
    pub system_prompt: SystemPrompt,

    /// Example questions this persona handles well
    #[serde(default)]
    pub examples: PromptExamples,
}

/// Persona metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInfo {
    /// Display name of the persona
    pub name: String,

    /// Brief description
    #[serde(default)]
    pub description: String,

    /// Hint shown in an empty input box
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

fn default_placeholder() -> String {
    "Type a message...".to_string()
}

/// System prompt content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    /// The full system prompt content
    pub content: String,
}

/// Example questions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptExamples {
    #[serde(default)]
    pub questions: Vec<String>,
}

impl PromptTemplate {
    /// The built-in health & wellness persona
    pub fn builtin() -> Self {
        Self {
            persona: PersonaInfo {
                name: builtin::WELLNESS_NAME.to_string(),
                description: builtin::WELLNESS_DESCRIPTION.to_string(),
                placeholder: builtin::WELLNESS_PLACEHOLDER.to_string(),
            },
            system_prompt: SystemPrompt {
                content: builtin::WELLNESS.to_string(),
            },
            examples: PromptExamples {
                questions: builtin::WELLNESS_EXAMPLES
                    .iter()
                    .map(|q| q.to_string())
                    .collect(),
            },
        }
    }

    /// Load a template from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PromptError> {
        let template: PromptTemplate =
            toml::from_str(content).map_err(|e| PromptError::ParseError(e.to_string()))?;

        if template.system_prompt.content.trim().is_empty() {
            return Err(PromptError::ParseError(
                "system_prompt.content must not be empty".to_string(),
            ));
        }
        Ok(template)
    }

    /// Resolve the persona for a deployment: the file if one is configured,
    /// otherwise the built-in one.
    pub async fn resolve(persona_file: Option<&Path>) -> Result<Self, PromptError> {
        match persona_file {
            Some(path) => Self::load_from_file(path).await,
            None => Ok(Self::builtin()),
        }
    }
}

/// Errors from prompt loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Built-in prompts that don't require files
pub mod builtin {
    pub const WELLNESS_NAME: &str = "Health & Wellness Chat Bot";

    pub const WELLNESS_DESCRIPTION: &str =
        "Evidence-informed tips on sleep, diet, hydration, exercise, and stress.";

    pub const WELLNESS_PLACEHOLDER: &str = "Ask me about health, wellness, or lifestyle tips...";

    pub const WELLNESS: &str = "You are a friendly health & wellness assistant. \
        Give practical, evidence-informed tips on sleep, diet, hydration, \
        exercise, and stress management. \
        Keep answers short, simple, and helpful. \
        \u{26a0}\u{fe0f} Do not give medical diagnoses or prescriptions. \
        If asked, say you are not a doctor and advise seeing a professional.";

    pub const WELLNESS_EXAMPLES: &[&str] = &[
        "How much water should I drink a day?",
        "Any tips for falling asleep faster?",
        "What's a quick way to de-stress at work?",
    ];
}
