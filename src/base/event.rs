//! Inbound events, before and after normalization.

use std::collections::BTreeSet;

use super::entity::{ChannelInfo, GuildInfo, UserInfo, VoiceState};

// Raw events.

/// A platform event reduced to the ids and fields the core cares about.
///
/// Missing ids are empty strings, except for the voice channel, where absence
/// is meaningful (the user left voice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    MessageCreated(RawMessage),
    VoiceStateUpdated(RawVoiceState),
    MemberUpdated(RawMemberUpdate),
    ChannelUpdated(RawChannelUpdate),
}

impl RawEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::MessageCreated(_) => "message_created",
            RawEvent::VoiceStateUpdated(_) => "voice_state_updated",
            RawEvent::MemberUpdated(_) => "member_updated",
            RawEvent::ChannelUpdated(_) => "channel_updated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub guild_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub message_id: String,
    pub content: String,
    /// Whether the bot itself wrote this message.
    pub from_self: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVoiceState {
    pub guild_id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMemberUpdate {
    pub guild_id: String,
    pub user_id: String,
    pub username: String,
    pub global_name: String,
    pub nickname: String,
    pub roles: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawChannelUpdate {
    pub guild_id: String,
    pub channel_id: String,
    pub name: String,
}

// Domain events.

/// A message, with its guild, channel and author resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCreated {
    /// `None` for direct messages.
    pub guild: Option<GuildInfo>,
    pub channel: ChannelInfo,
    pub author: UserInfo,
    pub id: String,
    pub content: String,
}

impl MessageCreated {
    pub fn guild_id(&self) -> &str {
        self.guild.as_ref().map(|guild| guild.id.as_str()).unwrap_or_default()
    }
}

/// A user's new voice state, with guild, user and channel resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceStateUpdate {
    pub guild: Option<GuildInfo>,
    pub user: UserInfo,
    pub new_state: VoiceState,
}

impl VoiceStateUpdate {
    pub fn guild_id(&self) -> &str {
        self.guild.as_ref().map(|guild| guild.id.as_str()).unwrap_or_default()
    }
}

/// A single property that changed on a push update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub property: String,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    pub fn new(property: impl Into<String>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}
