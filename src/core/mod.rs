//! Conversation sessions
//!
//! `session` holds the per-user turn logic; `store` keeps one session per
//! connected client and expires the idle ones.

mod session;
mod store;

pub use session::{SamplingParams, TurnOutcome};
pub use store::{run_sweeper, SessionEntry, SessionStore};
