//! `!ping`: acknowledges with a thumbs up.

use std::sync::Arc;

use async_trait::async_trait;

use super::reply::Reply;
use crate::{
    base::{event::MessageCreated, types::Void},
    interaction::dispatcher::Listener,
    service::ports::Responder,
};

pub struct PingResponder {
    responder: Arc<dyn Responder>,
}

impl PingResponder {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl Listener for PingResponder {
    async fn handle_message(&self, message: &MessageCreated) -> Void {
        if message.content != "!ping" {
            return Ok(());
        }

        Reply::new(&*self.responder, message).react("👍").await
    }
}

// Tests.
