use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    blocks::{self, Reply, DUE_DATE_ACTION_ID, HELP_ACTION_ID},
    commands::{
        normalize_borrow_command, BorrowCommandService, CommandParseError, CommandRouteError,
        CommandRouter, NoopBorrowCommandService, SlashCommandPayload,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    DirectMessage(DirectMessageEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// The Slack user that caused the event, when there is one.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::DirectMessage(event) => Some(&event.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    DirectMessage,
    BlockAction,
    Unsupported,
}

/// A user message in the bot's DM channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectMessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
    /// Set for datepicker actions.
    pub selected_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<Reply>),
    Processed,
    Ignored,
}

impl HandlerResult {
    fn from_replies(replies: Vec<Reply>) -> Self {
        if replies.is_empty() {
            Self::Processed
        } else {
            Self::Responded(replies)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("direct message handler failure: {0}")]
    DirectMessage(String),
    #[error("block action handler failure: {0}")]
    BlockAction(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with stateless handlers; the server swaps in the workflow-backed ones.
pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(NoopBorrowCommandService));
    dispatcher.register(DirectMessageHandler::new(NoopDirectMessageService));
    dispatcher.register(BlockActionHandler::new(NoopBlockActionService));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: BorrowCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: BorrowCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_borrow_command(payload.clone())?;
        let replies = self.router.route(normalized).await?;
        Ok(HandlerResult::from_replies(replies))
    }
}

#[async_trait]
pub trait DirectMessageService: Send + Sync {
    async fn handle_direct_message(
        &self,
        event: &DirectMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Reply>, EventHandlerError>;
}

pub struct DirectMessageHandler<S> {
    service: S,
}

impl<S> DirectMessageHandler<S>
where
    S: DirectMessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for DirectMessageHandler<S>
where
    S: DirectMessageService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::DirectMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::DirectMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Processed);
        }

        let replies = self.service.handle_direct_message(event, ctx).await?;
        Ok(HandlerResult::from_replies(replies))
    }
}

#[derive(Default)]
pub struct NoopDirectMessageService;

#[async_trait]
impl DirectMessageService for NoopDirectMessageService {
    async fn handle_direct_message(
        &self,
        event: &DirectMessageEvent,
        _ctx: &EventContext,
    ) -> Result<Vec<Reply>, EventHandlerError> {
        Ok(vec![Reply::to_channel(
            &event.channel_id,
            blocks::text_message("Send `/borrow` in a channel to start a borrow request."),
        )])
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Reply>, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.action_id == HELP_ACTION_ID {
            return Ok(HandlerResult::Responded(vec![Reply::ephemeral(
                &event.channel_id,
                &event.user_id,
                blocks::help_message(),
            )]));
        }
        if event.action_id == DUE_DATE_ACTION_ID && event.selected_date.is_none() {
            return Err(EventHandlerError::BlockAction(
                "datepicker action without a selected date".to_owned(),
            ));
        }

        let replies = self.service.handle_block_action(event, ctx).await?;
        Ok(HandlerResult::from_replies(replies))
    }
}

#[derive(Default)]
pub struct NoopBlockActionService;

#[async_trait]
impl BlockActionService for NoopBlockActionService {
    async fn handle_block_action(
        &self,
        _event: &BlockActionEvent,
        _ctx: &EventContext,
    ) -> Result<Vec<Reply>, EventHandlerError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        default_dispatcher, BlockActionEvent, DirectMessageEvent, EventContext, EventDispatcher,
        EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent,
    };
    use crate::blocks::{Delivery, DUE_DATE_ACTION_ID, HELP_ACTION_ID};
    use crate::commands::SlashCommandPayload;
    use crate::events::DispatchError;

    fn envelope(event: SlackEvent) -> SlackEnvelope {
        SlackEnvelope { envelope_id: "env-1".to_owned(), event }
    }

    fn block_action(action_id: &str, selected_date: Option<NaiveDate>) -> SlackEvent {
        SlackEvent::BlockAction(BlockActionEvent {
            channel_id: "D1".to_owned(),
            user_id: "U1".to_owned(),
            action_id: action_id.to_owned(),
            value: None,
            selected_date,
        })
    }

    #[tokio::test]
    async fn dispatcher_routes_slash_commands() {
        let dispatcher = default_dispatcher();
        let envelope = envelope(SlackEvent::SlashCommand(SlashCommandPayload {
            command: "/borrow".to_owned(),
            text: "help".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_ts: "1".to_owned(),
            request_id: "req-1".to_owned(),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        let HandlerResult::Responded(replies) = result else {
            panic!("expected a reply, got {result:?}");
        };
        assert!(matches!(replies[0].delivery, Delivery::Ephemeral { .. }));
    }

    #[tokio::test]
    async fn foreign_slash_command_is_a_parse_error() {
        let dispatcher = default_dispatcher();
        let envelope = envelope(SlackEvent::SlashCommand(SlashCommandPayload {
            command: "/deploy".to_owned(),
            text: "new".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_ts: "1".to_owned(),
            request_id: "req-1".to_owned(),
        }));

        let error = dispatcher
            .dispatch(&envelope, &EventContext::default())
            .await
            .expect_err("unsupported command");

        assert!(matches!(error, DispatchError::Handler(EventHandlerError::Parse(_))));
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = envelope(SlackEvent::DirectMessage(DirectMessageEvent {
            channel_id: "D1".to_owned(),
            user_id: "U2".to_owned(),
            text: "hello".to_owned(),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn blank_direct_messages_are_processed_without_reply() {
        let dispatcher = default_dispatcher();
        let envelope = envelope(SlackEvent::DirectMessage(DirectMessageEvent {
            channel_id: "D1".to_owned(),
            user_id: "U2".to_owned(),
            text: "   ".to_owned(),
        }));

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
    }

    #[test]
    fn default_dispatcher_registers_handlers() {
        assert_eq!(default_dispatcher().handler_count(), 3);
    }

    #[tokio::test]
    async fn help_button_is_answered_by_the_handler() {
        let dispatcher = default_dispatcher();

        let result = dispatcher
            .dispatch(&envelope(block_action(HELP_ACTION_ID, None)), &EventContext::default())
            .await
            .expect("dispatch");

        assert!(matches!(result, HandlerResult::Responded(_)));
    }

    #[tokio::test]
    async fn datepicker_without_date_is_rejected() {
        let dispatcher = default_dispatcher();

        let error = dispatcher
            .dispatch(&envelope(block_action(DUE_DATE_ACTION_ID, None)), &EventContext::default())
            .await
            .expect_err("missing date");

        assert!(matches!(error, DispatchError::Handler(EventHandlerError::BlockAction(_))));
    }

    #[tokio::test]
    async fn datepicker_with_date_reaches_the_service() {
        let dispatcher = default_dispatcher();
        let date = NaiveDate::from_ymd_opt(2030, 1, 31);

        let result = dispatcher
            .dispatch(&envelope(block_action(DUE_DATE_ACTION_ID, date)), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
    }

    #[test]
    fn user_id_is_exposed_for_attributable_events() {
        assert_eq!(block_action(HELP_ACTION_ID, None).user_id(), Some("U1"));
        assert_eq!(SlackEvent::Unsupported { event_type: "hello".to_owned() }.user_id(), None);
    }
}
