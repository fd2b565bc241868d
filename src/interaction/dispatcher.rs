//! Fan-out of resolved events to the registered listeners.

use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::{FutureExt, future::join_all};
use parking_lot::RwLock;
use tracing::{Instrument, error, info, info_span, instrument, warn};

use crate::{
    base::{
        error::BotError,
        event::{MessageCreated, VoiceStateUpdate},
        types::Void,
    },
    service::ports::Responder,
};

// Traits.

/// A behaviour that reacts to resolved events.
///
/// Both methods default to a no-op so listeners only implement what they care about.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn handle_message(&self, _message: &MessageCreated) -> Void {
        Ok(())
    }

    async fn voice_state_updated(&self, _update: &VoiceStateUpdate) -> Void {
        Ok(())
    }
}

// Types.

/// A resolved event, borrowed for the duration of one notify.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    MessageCreated(&'a MessageCreated),
    VoiceStateUpdated(&'a VoiceStateUpdate),
}

impl Event<'_> {
    pub fn op(&self) -> &'static str {
        match self {
            Event::MessageCreated(_) => "message_created",
            Event::VoiceStateUpdated(_) => "voice_state_updated",
        }
    }
}

// Structs.

/// Registry of listeners, invoked concurrently and in isolation from each other.
pub struct Dispatcher {
    listeners: RwLock<Vec<(String, Arc<dyn Listener>)>>,
    responder: Arc<dyn Responder>,
    failure_emoji: String,
}

impl Dispatcher {
    pub fn new(responder: Arc<dyn Responder>, failure_emoji: impl Into<String>) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            responder,
            failure_emoji: failure_emoji.into(),
        }
    }

    /// Register a listener under a unique id.
    pub fn add_listener(&self, id: impl Into<String>, listener: Arc<dyn Listener>) -> Void {
        let id = id.into();
        let mut listeners = self.listeners.write();

        if listeners.iter().any(|(existing, _)| *existing == id) {
            return Err(BotError::DuplicateListenerId(id).into());
        }

        info!("Registered listener `{}`.", id);
        listeners.push((id, listener));

        Ok(())
    }

    /// Ids of the registered listeners, in registration order.
    pub fn listener_ids(&self) -> Vec<String> {
        self.listeners.read().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Run every listener against `event` and return the ids of those that failed.
    ///
    /// A listener error or panic is logged and recorded; it never stops the others.
    pub async fn notify(&self, event: Event<'_>) -> Vec<String> {
        let listeners = self.listeners.read().clone();

        let runs = listeners.iter().map(|(id, listener)| {
            let span = info_span!("notify", op = event.op(), listener.id = %id);

            async move {
                let outcome = AssertUnwindSafe(async {
                    match event {
                        Event::MessageCreated(message) => listener.handle_message(message).await,
                        Event::VoiceStateUpdated(update) => listener.voice_state_updated(update).await,
                    }
                })
                .catch_unwind()
                .await;

                match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => {
                        error!("Listener `{}` failed on {}: {:#}", id, event.op(), err);
                        Some(id.clone())
                    }
                    Err(_) => {
                        error!("Listener `{}` panicked on {}.", id, event.op());
                        Some(id.clone())
                    }
                }
            }
            .instrument(span)
        });

        join_all(runs).await.into_iter().flatten().collect()
    }

    /// Dispatch a new message, flagging it with a reaction if any listener failed.
    #[instrument(skip_all, fields(message.id = %message.id))]
    pub async fn message_created(&self, message: &MessageCreated) -> Vec<String> {
        let failed = self.notify(Event::MessageCreated(message)).await;

        if !failed.is_empty() {
            warn!("{} listener(s) failed on message: {}", failed.len(), failed.join(", "));

            if let Err(err) = self.responder.add_reaction(&message.channel.id, &message.id, &self.failure_emoji).await {
                error!("Failed to add failure reaction: {:#}", err);
            }
        }

        failed
    }

    /// Dispatch a voice state change.
    #[instrument(skip_all, fields(user.id = %update.user.id))]
    pub async fn voice_state_updated(&self, update: &VoiceStateUpdate) -> Vec<String> {
        let failed = self.notify(Event::VoiceStateUpdated(update)).await;

        if !failed.is_empty() {
            warn!("{} listener(s) failed on voice state update: {}", failed.len(), failed.join(", "));
        }

        failed
    }
}

// Tests.
