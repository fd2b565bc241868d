//! Voice activity log.
//!
//! Every opted-in user's voice channel transitions (join, move, leave) are
//! written to a per-guild log channel, found by name the first time it is
//! needed. Opting in means holding the configured tracking role; with no role
//! configured, everyone is tracked.

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::{
    base::{
        cache::{Clock, SystemClock, TtlCache},
        config::Config,
        entity::{ChannelInfo, VoiceState},
        error::BotError,
        event::VoiceStateUpdate,
        types::{Res, Void},
    },
    interaction::dispatcher::Listener,
    service::ports::{FetchedExt, Reader, Responder},
};

/// Describe a voice transition, or `None` when the user did not change channel.
pub fn describe_transition(display_name: &str, previous: Option<&ChannelInfo>, next: Option<&ChannelInfo>) -> Option<String> {
    match (previous, next) {
        (None, Some(next)) => Some(format!("{} joined {}", display_name, next.name)),
        (Some(previous), None) => Some(format!("{} left {}", display_name, previous.name)),
        (Some(previous), Some(next)) if previous.id != next.id => Some(format!("{} moved from {} to {}", display_name, previous.name, next.name)),
        _ => None,
    }
}

/// What the tracker remembers about a user, created on first sight.
#[derive(Debug, Default)]
struct TrackedUserState {
    voice_state: VoiceState,
}

/// Activity tracking behaviour.
pub struct ActivityTracker {
    reader: Arc<dyn Reader>,
    responder: Arc<dyn Responder>,
    log_channel_name: String,
    tracking_role: Option<String>,
    tracked: Mutex<HashMap<String, TrackedUserState>>,
    /// Resolved log channel id per guild id.
    log_channels: Mutex<HashMap<String, String>>,
    opted_in: TtlCache<(String, String), bool>,
}

impl ActivityTracker {
    pub fn new(reader: Arc<dyn Reader>, responder: Arc<dyn Responder>, config: &Config) -> Self {
        Self::with_clock(reader, responder, config, Arc::new(SystemClock))
    }

    pub fn with_clock(reader: Arc<dyn Reader>, responder: Arc<dyn Responder>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader,
            responder,
            log_channel_name: config.activity_log_channel.clone(),
            tracking_role: config.tracking_role.clone(),
            tracked: Mutex::new(HashMap::new()),
            log_channels: Mutex::new(HashMap::new()),
            opted_in: TtlCache::with_clock(config.opt_in_ttl(), clock),
        }
    }

    /// Whether the user has opted into tracking in this guild.
    async fn is_opted_in(&self, guild_id: &str, user_id: &str) -> bool {
        let Some(role_name) = self.tracking_role.as_deref() else {
            return true;
        };

        let key = (guild_id.to_string(), user_id.to_string());
        let Ok(opted_in) = self
            .opted_in
            .get(key, || async {
                let guild = self.reader.get_guild_info(guild_id).await.or_stub("guild");
                let Some(role_id) = guild.as_ref().and_then(|guild| guild.tracking_role_id(role_name)) else {
                    debug!("Guild has no `{}` role.", role_name);
                    return Ok::<_, Infallible>(false);
                };

                let user = self.reader.get_user_info(user_id, guild_id).await.or_stub("user");
                let opted_in = user.is_some_and(|user| user.has_role(guild_id, role_id));
                if opted_in {
                    info!("User {} is opted into tracking.", user_id);
                }

                Ok(opted_in)
            })
            .await;

        opted_in
    }

    /// Swap in the user's new voice state, returning the previous one.
    fn swap_state(&self, user_id: &str, next: VoiceState) -> VoiceState {
        let mut tracked = self.tracked.lock();
        let state = tracked.entry(user_id.to_string()).or_default();

        std::mem::replace(&mut state.voice_state, next)
    }

    /// Resolve the guild's log channel id, searching by name on first use.
    async fn log_channel(&self, guild_id: &str) -> Res<String> {
        let cached = self.log_channels.lock().get(guild_id).cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        let channels = self.reader.get_channels(guild_id).await.with_context(|| format!("listing channels for guild {}", guild_id))?;

        for channel in channels {
            debug!("Searching for activity log channel, candidate `{}` ({}).", channel.name, channel.id);

            if channel.name == self.log_channel_name {
                info!("Identified activity log channel {} for guild {}.", channel.id, guild_id);
                self.log_channels.lock().insert(guild_id.to_string(), channel.id.clone());
                return Ok(channel.id);
            }
        }

        Err(BotError::NoActivityLogChannel {
            guild_id: guild_id.to_string(),
            name: self.log_channel_name.clone(),
        }
        .into())
    }

    async fn record(&self, guild_id: &str, message: &str) -> Void {
        info!("Recording activity: {}", message);

        let channel_id = self.log_channel(guild_id).await.context("ensuring log channel exists")?;

        self.responder.send_message(&channel_id, message).await.context("writing to log channel")
    }
}

#[async_trait]
impl Listener for ActivityTracker {
    #[instrument(skip_all, fields(guild.id = %update.guild_id(), user.id = %update.user.id))]
    async fn voice_state_updated(&self, update: &VoiceStateUpdate) -> Void {
        let guild_id = update.guild_id();
        let user_id = update.user.id.as_str();

        if !self.is_opted_in(guild_id, user_id).await {
            debug!("Ignoring voice state change from opted-out user.");
            return Ok(());
        }

        let previous = self.swap_state(user_id, update.new_state.clone()).channel;
        let next = update.new_state.channel.as_ref();

        if previous.as_ref().map(|channel| channel.id.as_str()) == next.map(|channel| channel.id.as_str()) {
            return Ok(());
        }

        // Prefer the current name of the channel being left, falling back to what we saw.
        let previous = match previous {
            Some(snapshot) => match self.reader.get_channel_info(&snapshot.id).await {
                Ok(Some(channel)) => Some(channel),
                _ => Some(snapshot),
            },
            None => None,
        };

        let Some(message) = describe_transition(update.user.display_name(guild_id), previous.as_ref(), next) else {
            return Ok(());
        };

        self.record(guild_id, &message).await.context("recording activity")
    }
}

// Tests.
