//! Discord implementation of the platform client, built on `serenity`.
//!
//! Remote fetches go through a bare [`Http`] client. The gateway side converts
//! serenity events into [`RawEvent`]s and pushes them onto the runtime's queue;
//! it never does any work of its own beyond that.

use std::{num::NonZeroU64, sync::Arc};

use anyhow::Context as _;
use async_trait::async_trait;
use serenity::{
    all::{Channel, ChannelId, Client, Context, EventHandler, GatewayIntents, GuildChannel, GuildId, GuildMemberUpdateEvent, Http, Member, Message, MessageId, ReactionType, Ready, ResumedEvent, UserId, VoiceState},
    gateway::ShardStageUpdateEvent,
    http::RatelimitInfo,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    entity::{ChannelInfo, GuildInfo, MemberInfo, RoleInfo, UserInfo},
    error::BotError,
    event::{RawChannelUpdate, RawEvent, RawMemberUpdate, RawMessage, RawVoiceState},
    types::{Res, Void},
};

use super::{GenericPlatformClient, PlatformClient};

// Extra methods on `PlatformClient` applied by the discord implementation.

impl PlatformClient {
    /// Creates a new Discord platform client.
    pub fn discord(config: &Config) -> Self {
        Self::new(Arc::new(DiscordPlatformClient::new(config)))
    }
}

// Helpers.

/// Parse a snowflake, rejecting zero (serenity ids panic on it).
fn snowflake(id: &str) -> Res<u64> {
    id.parse::<NonZeroU64>().map(NonZeroU64::get).map_err(|_| BotError::InvalidId(id.to_string()).into())
}

fn optional_id(id: Option<impl ToString>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

// Structs.

/// Discord client implementation.
struct DiscordPlatformClient {
    token: String,
    http: Arc<Http>,
}

impl DiscordPlatformClient {
    fn new(config: &Config) -> Self {
        Self {
            token: config.discord_bot_token.clone(),
            http: Arc::new(Http::new(&config.discord_bot_token)),
        }
    }
}

#[async_trait]
impl GenericPlatformClient for DiscordPlatformClient {
    #[instrument(skip(self))]
    async fn fetch_guild(&self, guild_id: &str) -> Res<GuildInfo> {
        let guild = self.http.get_guild(GuildId::new(snowflake(guild_id)?)).await?;

        let roles = guild.roles.values().map(|role| (role.id.to_string(), RoleInfo { name: role.name.clone() })).collect();

        Ok(GuildInfo {
            id: guild.id.to_string(),
            name: guild.name,
            roles,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_channel(&self, channel_id: &str) -> Res<ChannelInfo> {
        let channel = self.http.get_channel(ChannelId::new(snowflake(channel_id)?)).await?;

        let name = match channel {
            Channel::Guild(channel) => channel.name,
            Channel::Private(channel) => channel.name(),
            _ => String::new(),
        };

        Ok(ChannelInfo::new(channel_id, name))
    }

    #[instrument(skip(self))]
    async fn fetch_user(&self, user_id: &str) -> Res<UserInfo> {
        let user = self.http.get_user(UserId::new(snowflake(user_id)?)).await?;

        Ok(UserInfo {
            id: user.id.to_string(),
            username: user.name,
            global_name: user.global_name.unwrap_or_default(),
            ..Default::default()
        })
    }

    #[instrument(skip(self))]
    async fn fetch_member(&self, guild_id: &str, user_id: &str) -> Res<MemberInfo> {
        let member = self.http.get_member(GuildId::new(snowflake(guild_id)?), UserId::new(snowflake(user_id)?)).await?;

        Ok(member_info(&member))
    }

    #[instrument(skip(self))]
    async fn fetch_guild_channels(&self, guild_id: &str) -> Res<Vec<ChannelInfo>> {
        let channels = self.http.get_channels(GuildId::new(snowflake(guild_id)?)).await?;

        Ok(channels.into_iter().map(|channel| ChannelInfo::new(channel.id.to_string(), channel.name)).collect())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, text: &str) -> Void {
        let channel_id = ChannelId::new(snowflake(channel_id)?);

        channel_id.say(&self.http, text).await.context("Failed to send message")?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Void {
        let channel_id = ChannelId::new(snowflake(channel_id)?);
        let message_id = MessageId::new(snowflake(message_id)?);

        self.http
            .create_reaction(channel_id, message_id, &ReactionType::Unicode(emoji.to_string()))
            .await
            .context("Failed to react to message")?;

        Ok(())
    }

    async fn start(&self, events: UnboundedSender<RawEvent>, shutdown: CancellationToken) -> Void {
        // Configure the types of events we want.

        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT | GatewayIntents::GUILD_VOICE_STATES | GatewayIntents::GUILD_MEMBERS;

        let mut client = Client::builder(&self.token, intents).event_handler(GatewayHandler { events }).await?;

        // Close the shards once the process is asked to stop.

        let shard_manager = client.shard_manager.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            info!("Closing Discord gateway connection ...");
            shard_manager.shutdown_all().await;
        });

        info!("Establishing Discord gateway connection ...");
        client.start().await?;

        Ok(())
    }
}

fn member_info(member: &Member) -> MemberInfo {
    MemberInfo {
        nickname: member.nick.clone().unwrap_or_default(),
        roles: member.roles.iter().map(|role| role.to_string()).collect(),
    }
}

// Gateway callbacks for Discord.

/// Forwards gateway events to the runtime as [`RawEvent`]s.
struct GatewayHandler {
    events: UnboundedSender<RawEvent>,
}

impl GatewayHandler {
    fn forward(&self, event: RawEvent) {
        let kind = event.kind();

        if self.events.send(event).is_err() {
            warn!("Dropping {} event: runtime is no longer listening.", kind);
        }
    }
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected to Discord ({} guilds).", ready.user.name, ready.guilds.len());
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        info!("Discord gateway session resumed.");
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        debug!("Shard {:?} moved from {:?} to {:?}.", event.shard_id, event.old, event.new);
    }

    async fn ratelimit(&self, data: RatelimitInfo) {
        warn!("Rate limited on `{}` for {:?} (global: {}).", data.path, data.timeout, data.global);
    }

    async fn message(&self, ctx: Context, message: Message) {
        let from_self = message.author.id == ctx.cache.current_user().id;

        self.forward(RawEvent::MessageCreated(RawMessage {
            guild_id: optional_id(message.guild_id),
            channel_id: message.channel_id.to_string(),
            author_id: message.author.id.to_string(),
            message_id: message.id.to_string(),
            content: message.content,
            from_self,
        }));
    }

    async fn voice_state_update(&self, _ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        self.forward(RawEvent::VoiceStateUpdated(RawVoiceState {
            guild_id: optional_id(new.guild_id),
            user_id: new.user_id.to_string(),
            channel_id: new.channel_id.map(|id| id.to_string()),
        }));
    }

    async fn guild_member_update(&self, _ctx: Context, _old: Option<Member>, _new: Option<Member>, event: GuildMemberUpdateEvent) {
        debug!("Member {} updated in guild {}.", event.user.id, event.guild_id);

        self.forward(RawEvent::MemberUpdated(RawMemberUpdate {
            guild_id: event.guild_id.to_string(),
            user_id: event.user.id.to_string(),
            username: event.user.name,
            global_name: event.user.global_name.unwrap_or_default(),
            nickname: event.nick.unwrap_or_default(),
            roles: event.roles.iter().map(|role| role.to_string()).collect(),
        }));
    }

    async fn channel_update(&self, _ctx: Context, _old: Option<GuildChannel>, new: GuildChannel) {
        self.forward(RawEvent::ChannelUpdated(RawChannelUpdate {
            guild_id: new.guild_id.to_string(),
            channel_id: new.id.to_string(),
            name: new.name,
        }));
    }
}

// Tests.
