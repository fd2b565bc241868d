//! Named error conditions raised by the bot core.
//!
//! Everything else travels as an [`anyhow::Error`]; these variants exist so that
//! callers (and tests) can tell the "state not found" family apart with
//! `downcast_ref`.

use std::time::Duration;

/// Conditions that abort an operation without side effects.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// A listener was registered under an id that is already taken.
    #[error("listener id `{0}` already in use")]
    DuplicateListenerId(String),
    /// The guild has no channel with the configured activity log name.
    #[error("no activity log channel named `{name}` in guild `{guild_id}`")]
    NoActivityLogChannel { guild_id: String, name: String },
    /// A platform id could not be parsed.
    #[error("invalid platform id `{0}`")]
    InvalidId(String),
    /// Event processing exceeded its time budget.
    #[error("event processing timed out after {0:?}")]
    EventTimeout(Duration),
}
