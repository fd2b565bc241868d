//! Entity resolution on top of the platform client.
//!
//! The resolver owns the guild, channel and user caches. Lookups memoize
//! successful fetches for the configured TTL; push updates from the gateway are
//! diffed against whatever is cached and folded in place.

pub mod diff;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

use crate::base::{
    cache::{Clock, SystemClock, TtlCache},
    entity::{ChannelInfo, GuildInfo, UserInfo},
    event::{FieldChange, RawChannelUpdate, RawMemberUpdate},
    types::Res,
};

use super::{
    platform::PlatformClient,
    ports::{FetchError, Fetched, Reader},
};

// Types.

/// Users are cached per guild context; the empty guild id is the context-free entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UserKey {
    user_id: String,
    guild_id: String,
}

impl UserKey {
    fn new(user_id: &str, guild_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            guild_id: guild_id.to_string(),
        }
    }
}

// Structs.

/// Caching entity resolver.
///
/// It is designed to be trivially cloneable; clones share the same caches.
#[derive(Clone)]
pub struct Resolver {
    platform: PlatformClient,
    guilds: Arc<TtlCache<String, GuildInfo>>,
    channels: Arc<TtlCache<String, ChannelInfo>>,
    users: Arc<TtlCache<UserKey, UserInfo>>,
}

impl Resolver {
    /// Create a resolver whose caches expire on the wall clock.
    pub fn new(platform: PlatformClient, ttl: Duration) -> Self {
        Self::with_clock(platform, ttl, Arc::new(SystemClock))
    }

    /// Create a resolver whose caches expire on the given clock.
    pub fn with_clock(platform: PlatformClient, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            platform,
            guilds: Arc::new(TtlCache::with_clock(ttl, clock.clone())),
            channels: Arc::new(TtlCache::with_clock(ttl, clock.clone())),
            users: Arc::new(TtlCache::with_clock(ttl, clock)),
        }
    }

    /// Fold a member update into the cached user records.
    ///
    /// The guild-scoped record receives the full diff. The context-free record
    /// only tracks account-wide fields; its changes are reported only when there
    /// was no guild-scoped record to report them from.
    #[instrument(skip_all, fields(guild.id = %update.guild_id, user.id = %update.user_id))]
    pub fn member_updated(&self, update: &RawMemberUpdate) -> Vec<FieldChange> {
        let scoped = UserKey::new(&update.user_id, &update.guild_id);
        let unscoped = UserKey::new(&update.user_id, "");

        let mut changes = Vec::new();

        let scoped_hit = self.users.update(&scoped, |cached| changes = diff::apply_member_update(cached, update));
        if !scoped_hit {
            debug!("No cached guild-scoped user, caching update as-is.");
            self.users.insert(scoped, diff::user_from_member_update(update, true));
        }

        self.users.update(&unscoped, |cached| {
            let identity = diff::apply_identity(cached, update);
            if !scoped_hit {
                changes.extend(identity);
            }
        });

        for change in &changes {
            info!("User {} changed `{}` from `{}` to `{}`.", update.user_id, change.property, change.old, change.new);
        }

        changes
    }

    /// Fold a channel update into the cached channel record.
    #[instrument(skip_all, fields(guild.id = %update.guild_id, channel.id = %update.channel_id))]
    pub fn channel_updated(&self, update: &RawChannelUpdate) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        let hit = self.channels.update(&update.channel_id, |cached| changes = diff::apply_channel_update(cached, update));
        if !hit {
            debug!("No cached channel, caching update as-is.");
            self.channels.insert(update.channel_id.clone(), ChannelInfo::new(&update.channel_id, &update.name));
        }

        for change in &changes {
            info!("Channel {} changed `{}` from `{}` to `{}`.", update.channel_id, change.property, change.old, change.new);
        }

        changes
    }
}

#[async_trait]
impl Reader for Resolver {
    #[instrument(skip(self))]
    async fn get_guild_info(&self, guild_id: &str) -> Fetched<GuildInfo> {
        if guild_id.is_empty() {
            return Ok(None);
        }

        self.guilds
            .get(guild_id.to_string(), || async {
                debug!("Fetching guild info ...");

                self.platform.fetch_guild(guild_id).await.map_err(|err| {
                    error!("Failed to retrieve guild info: {:#}", err);
                    FetchError::new(GuildInfo::stub(guild_id), err.context("getting guild info"))
                })
            })
            .await
            .map(Some)
    }

    #[instrument(skip(self))]
    async fn get_channel_info(&self, channel_id: &str) -> Fetched<ChannelInfo> {
        if channel_id.is_empty() {
            return Ok(None);
        }

        self.channels
            .get(channel_id.to_string(), || async {
                debug!("Fetching channel info ...");

                self.platform.fetch_channel(channel_id).await.map_err(|err| {
                    error!("Failed to retrieve channel info: {:#}", err);
                    FetchError::new(ChannelInfo::stub(channel_id), err.context("getting channel info"))
                })
            })
            .await
            .map(Some)
    }

    #[instrument(skip(self))]
    async fn get_user_info(&self, user_id: &str, guild_id: &str) -> Fetched<UserInfo> {
        if user_id.is_empty() {
            return Ok(None);
        }

        self.users
            .get(UserKey::new(user_id, guild_id), || async {
                debug!("Fetching user info ...");

                let mut info = self.platform.fetch_user(user_id).await.map_err(|err| {
                    error!("Failed to retrieve user info: {:#}", err);
                    FetchError::new(UserInfo::stub(user_id), err.context("getting user info"))
                })?;

                if !guild_id.is_empty() {
                    match self.platform.fetch_member(guild_id, user_id).await {
                        Ok(member) => {
                            info.guild_membership.insert(guild_id.to_string(), member);
                        }
                        Err(err) => {
                            error!("Failed to retrieve guild member info: {:#}", err);
                            return Err(FetchError::new(info, err.context("getting user guild member info")));
                        }
                    }
                }

                Ok::<_, FetchError<UserInfo>>(info)
            })
            .await
            .map(Some)
    }

    #[instrument(skip(self))]
    async fn get_channels(&self, guild_id: &str) -> Res<Vec<ChannelInfo>> {
        if guild_id.is_empty() {
            return Ok(Vec::new());
        }

        self.platform.fetch_guild_channels(guild_id).await.context("getting channels")
    }
}

// Tests.
