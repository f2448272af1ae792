//! Inbound envelopes in, Slack messages out.
//!
//! The HTTP layer decodes each callback with [`crate::payload`] and hands the
//! envelope to [`SlackIngress::handle`]. Replies are posted separately so the
//! callback can be answered before the Web API round trips.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blocks::{Delivery, MessageTemplate, Reply};
use crate::events::{
    default_dispatcher, EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("slack rejected the message: {0}")]
    Rejected(String),
    #[error("message delivery failed: {0}")]
    Transport(String),
}

/// Outbound side of the bot: whatever handlers answer ends up here.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        template: &MessageTemplate,
    ) -> Result<(), DeliveryError>;

    async fn post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        template: &MessageTemplate,
    ) -> Result<(), DeliveryError>;
}

#[derive(Default)]
pub struct NoopMessagePoster;

#[async_trait]
impl MessagePoster for NoopMessagePoster {
    async fn post_message(
        &self,
        channel: &str,
        _template: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        debug!(channel, "dropping outbound message; no poster configured");
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        _template: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        debug!(channel, user_id, "dropping ephemeral message; no poster configured");
        Ok(())
    }
}

pub async fn deliver(poster: &dyn MessagePoster, reply: &Reply) -> Result<(), DeliveryError> {
    match &reply.delivery {
        Delivery::Channel(channel) => poster.post_message(channel, &reply.template).await,
        Delivery::Ephemeral { channel, user_id } => {
            poster.post_ephemeral(channel, user_id, &reply.template).await
        }
    }
}

pub struct SlackIngress {
    dispatcher: EventDispatcher,
    poster: Arc<dyn MessagePoster>,
}

impl Default for SlackIngress {
    fn default() -> Self {
        Self { dispatcher: default_dispatcher(), poster: Arc::new(NoopMessagePoster) }
    }
}

impl SlackIngress {
    pub fn new(dispatcher: EventDispatcher, poster: Arc<dyn MessagePoster>) -> Self {
        Self { dispatcher, poster }
    }

    /// Dispatches one envelope and returns the replies to post. A failed
    /// dispatch is logged and answers nothing.
    pub async fn handle(&self, envelope: &SlackEnvelope) -> Vec<Reply> {
        let (user_id, channel_id) = correlation_fields(envelope);
        let user_id = user_id.unwrap_or("unknown");
        let channel_id = channel_id.unwrap_or("unknown");

        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %envelope.envelope_id,
            user_id,
            channel_id,
            "received slack envelope"
        );

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Responded(replies)) => replies,
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => Vec::new(),
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.dispatch_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    user_id,
                    error = %error,
                    "event dispatch failed"
                );
                Vec::new()
            }
        }
    }

    /// Posts every reply, logging the ones Slack refuses. Returns how many went out.
    pub async fn deliver_all(&self, replies: &[Reply], correlation_id: &str) -> usize {
        let mut delivered = 0;
        for reply in replies {
            match deliver(self.poster.as_ref(), reply).await {
                Ok(()) => delivered += 1,
                Err(error) => warn!(
                    event_name = "egress.slack.delivery_failed",
                    correlation_id,
                    delivery = ?reply.delivery,
                    error = %error,
                    "failed to deliver slack reply"
                ),
            }
        }
        delivered
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::SlashCommand(payload) => {
            (Some(payload.user_id.as_str()), Some(payload.channel_id.as_str()))
        }
        SlackEvent::DirectMessage(event) => {
            (Some(event.user_id.as_str()), Some(event.channel_id.as_str()))
        }
        SlackEvent::BlockAction(event) => {
            (Some(event.user_id.as_str()), Some(event.channel_id.as_str()))
        }
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
