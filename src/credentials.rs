//! API key acquisition
//!
//! The key comes from the configured environment variable or, failing that,
//! from a masked prompt when a terminal is attached. No key at all is not an
//! error: the caller reports it and shuts down cleanly.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::fmt;
use std::io::{self, IsTerminal, Write};

/// A secret that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key; blank input yields `None`.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Terminal error: {0}")]
    Terminal(#[from] io::Error),
}

/// Look up `var_name`, falling back to an interactive prompt.
pub fn acquire(var_name: &str) -> Result<Option<ApiKey>, CredentialError> {
    acquire_with(var_name, || {
        if !io::stdin().is_terminal() {
            return Ok(None);
        }
        prompt_masked(&format!("{}: ", var_name))
    })
}

fn acquire_with<F>(var_name: &str, prompt: F) -> Result<Option<ApiKey>, CredentialError>
where
    F: FnOnce() -> Result<Option<String>, CredentialError>,
{
    if let Some(key) = std::env::var(var_name).ok().as_deref().and_then(ApiKey::new) {
        tracing::debug!(var = var_name, "API key taken from environment");
        return Ok(Some(key));
    }

    let entered = prompt()?;
    Ok(entered.as_deref().and_then(ApiKey::new))
}

/// What a keystroke does to the hidden input buffer
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Submit,
    Cancel,
}

fn apply_key(buffer: &mut String, key: &KeyEvent) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Esc => KeyAction::Cancel,
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => KeyAction::Cancel,
        KeyCode::Char('u') if ctrl => {
            buffer.clear();
            KeyAction::Continue
        }
        KeyCode::Backspace => {
            buffer.pop();
            KeyAction::Continue
        }
        KeyCode::Char(c) if !ctrl => {
            buffer.push(c);
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

/// Read a line with every character echoed as `*`.
///
/// Returns `None` when the user cancels with Esc or Ctrl-C.
fn prompt_masked(prompt: &str) -> Result<Option<String>, CredentialError> {
    enable_raw_mode()?;

    let result = (|| -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        let mut buffer = String::new();
        loop {
            write!(
                stdout,
                "\r\x1b[K{}{}",
                prompt,
                "*".repeat(buffer.chars().count())
            )?;
            stdout.flush()?;

            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match apply_key(&mut buffer, &key) {
                        KeyAction::Continue => {}
                        KeyAction::Submit => return Ok(Some(buffer)),
                        KeyAction::Cancel => return Ok(None),
                    }
                }
                Event::Paste(text) => buffer.push_str(text.trim_end_matches(['\r', '\n'])),
                _ => {}
            }
        }
    })();

    let restored = disable_raw_mode();
    println!();

    let value = result?;
    restored?;
    Ok(value)
}
