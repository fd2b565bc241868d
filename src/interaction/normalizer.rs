//! Turns raw gateway payloads into fully resolved events.

use std::sync::Arc;

use tracing::instrument;

use crate::{
    base::{
        entity::{ChannelInfo, UserInfo, VoiceState},
        event::{MessageCreated, RawMessage, RawVoiceState, VoiceStateUpdate},
    },
    service::ports::{FetchedExt, Reader},
};

/// Resolves the ids carried by raw events through a [`Reader`].
///
/// Lookups that fail degrade to stub records, so normalization itself never fails.
#[derive(Clone)]
pub struct Normalizer {
    reader: Arc<dyn Reader>,
}

impl Normalizer {
    pub fn new(reader: Arc<dyn Reader>) -> Self {
        Self { reader }
    }

    /// Resolve a newly created message.
    #[instrument(skip_all, fields(message.id = %raw.message_id))]
    pub async fn message_created(&self, raw: &RawMessage) -> MessageCreated {
        let author = self.reader.get_user_info(&raw.author_id, &raw.guild_id).await.or_stub("author").unwrap_or_else(|| UserInfo::stub(&raw.author_id));
        let guild = self.reader.get_guild_info(&raw.guild_id).await.or_stub("guild");
        let channel = self.reader.get_channel_info(&raw.channel_id).await.or_stub("channel").unwrap_or_else(|| ChannelInfo::stub(&raw.channel_id));

        MessageCreated {
            guild,
            channel,
            author,
            id: raw.message_id.clone(),
            content: raw.content.clone(),
        }
    }

    /// Resolve a voice state change.
    #[instrument(skip_all, fields(user.id = %raw.user_id))]
    pub async fn voice_state_updated(&self, raw: &RawVoiceState) -> VoiceStateUpdate {
        let guild = self.reader.get_guild_info(&raw.guild_id).await.or_stub("guild");

        let channel = match raw.channel_id.as_deref() {
            Some(channel_id) => self.reader.get_channel_info(channel_id).await.or_stub("channel"),
            None => None,
        };

        let user = self.reader.get_user_info(&raw.user_id, &raw.guild_id).await.or_stub("user").unwrap_or_else(|| UserInfo::stub(&raw.user_id));

        VoiceStateUpdate {
            guild,
            user,
            new_state: VoiceState { channel },
        }
    }
}

// Tests.
