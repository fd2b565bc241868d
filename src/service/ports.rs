//! The two narrow interfaces the core and its behaviours talk through.
//!
//! A [`Reader`] resolves entities; a [`Responder`] acts outward. Neither says
//! anything about the transport underneath.

use std::fmt;

use async_trait::async_trait;
use tracing::warn;

use crate::base::{
    entity::{ChannelInfo, GuildInfo, UserInfo},
    types::{Err, Res, Void},
};

// Types.

/// A lookup that failed remotely, carrying whatever the caller can still use.
///
/// The stub has its id set and every other field empty, so callers that only
/// need the id for display keep working. Nothing else on it should be trusted.
pub struct FetchError<T> {
    pub stub: T,
    pub source: Err,
}

impl<T> FetchError<T> {
    pub fn new(stub: T, source: Err) -> Self {
        Self { stub, source }
    }

    pub fn into_stub(self) -> T {
        self.stub
    }
}

impl<T> fmt::Debug for FetchError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchError").field("source", &self.source).finish_non_exhaustive()
    }
}

impl<T> fmt::Display for FetchError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

/// Result of resolving an entity.
///
/// `Ok(None)` means there was nothing to resolve (an empty id).
pub type Fetched<T> = Result<Option<T>, FetchError<T>>;

/// Conveniences for callers that can live with a partial record.
pub trait FetchedExt<T> {
    /// Keep the stub on failure, logging the error.
    fn or_stub(self, what: &str) -> Option<T>;
}

impl<T> FetchedExt<T> for Fetched<T> {
    fn or_stub(self, what: &str) -> Option<T> {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("Using partial {} record: {}", what, err);
                Some(err.into_stub())
            }
        }
    }
}

// Traits.

/// Entity lookups, as consumed by the core and the behaviours.
#[async_trait]
pub trait Reader: Send + Sync + 'static {
    /// Resolve a guild and its roles.
    async fn get_guild_info(&self, guild_id: &str) -> Fetched<GuildInfo>;

    /// Resolve a channel.
    async fn get_channel_info(&self, channel_id: &str) -> Fetched<ChannelInfo>;

    /// Resolve a user, plus its membership of `guild_id` when that is non-empty.
    async fn get_user_info(&self, user_id: &str, guild_id: &str) -> Fetched<UserInfo>;

    /// List the channels of a guild.
    async fn get_channels(&self, guild_id: &str) -> Res<Vec<ChannelInfo>>;
}

/// Outbound actions.
#[async_trait]
pub trait Responder: Send + Sync + 'static {
    /// Post `text` to a channel.
    async fn send_message(&self, channel_id: &str, text: &str) -> Void;

    /// React to a message with a unicode emoji.
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Void;
}

// Tests.
