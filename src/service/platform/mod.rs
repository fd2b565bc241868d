//! Chat platform integration.
//!
//! The core never speaks to the platform directly: it goes through a
//! [`GenericPlatformClient`], which turns raw remote payloads into domain
//! records and gateway events into [`RawEvent`]s.

pub mod discord;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::base::{
    entity::{ChannelInfo, GuildInfo, MemberInfo, UserInfo},
    event::RawEvent,
    types::{Res, Void},
};

use super::ports::Responder;

// Traits.

/// Generic platform trait that clients must implement.
///
/// Every fetch is an uncached remote call. Caching is the resolver's business.
#[async_trait]
pub trait GenericPlatformClient: Send + Sync + 'static {
    /// Fetch a guild and its roles.
    async fn fetch_guild(&self, guild_id: &str) -> Res<GuildInfo>;

    /// Fetch a channel.
    async fn fetch_channel(&self, channel_id: &str) -> Res<ChannelInfo>;

    /// Fetch a user, without any guild membership.
    async fn fetch_user(&self, user_id: &str) -> Res<UserInfo>;

    /// Fetch a user's membership of a guild.
    async fn fetch_member(&self, guild_id: &str, user_id: &str) -> Res<MemberInfo>;

    /// List the channels of a guild.
    async fn fetch_guild_channels(&self, guild_id: &str) -> Res<Vec<ChannelInfo>>;

    /// Post a message to a channel.
    async fn send_message(&self, channel_id: &str, text: &str) -> Void;

    /// React to a message with a unicode emoji.
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Void;

    /// Connect to the gateway and forward events until `shutdown` fires.
    async fn start(&self, events: UnboundedSender<RawEvent>, shutdown: CancellationToken) -> Void;
}

// Structs.

/// Platform client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct PlatformClient {
    inner: Arc<dyn GenericPlatformClient>,
}

impl Deref for PlatformClient {
    type Target = dyn GenericPlatformClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl PlatformClient {
    pub fn new(inner: Arc<dyn GenericPlatformClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Responder for PlatformClient {
    async fn send_message(&self, channel_id: &str, text: &str) -> Void {
        self.inner.send_message(channel_id, text).await
    }

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Void {
        self.inner.add_reaction(channel_id, message_id, emoji).await
    }
}
