//! Small helper for answering a message in its own channel.

use anyhow::Context;
use tracing::error;

use crate::{
    base::{
        event::MessageCreated,
        types::{Err, Void},
    },
    service::ports::Responder,
};

/// Replies to one original message.
///
/// Sending the reply is the part that matters: its failure is returned. The
/// optional reaction is best effort and only logged when it fails.
pub struct Reply<'a> {
    responder: &'a dyn Responder,
    original: &'a MessageCreated,
}

impl<'a> Reply<'a> {
    pub fn new(responder: &'a dyn Responder, original: &'a MessageCreated) -> Self {
        Self { responder, original }
    }

    /// Post `text` in the original channel, then react with `emoji` if given.
    pub async fn respond(&self, emoji: Option<&str>, text: &str) -> Void {
        self.responder.send_message(&self.original.channel.id, text).await.context("replying to message")?;

        if let Some(emoji) = emoji
            && let Err(err) = self.react(emoji).await
        {
            error!("Error reacting to message: {:#}", err);
        }

        Ok(())
    }

    /// Log `err`, then reply with `text` and react with `emoji`.
    pub async fn respond_error(&self, err: Err, emoji: &str, text: &str) -> Void {
        error!("{}: {:#}", text, err);

        self.respond(Some(emoji), text).await
    }

    /// React to the original message.
    pub async fn react(&self, emoji: &str) -> Void {
        self.responder.add_reaction(&self.original.channel.id, &self.original.id, emoji).await
    }
}
