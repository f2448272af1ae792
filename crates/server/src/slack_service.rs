//! Glue between the Slack handlers and the borrow workflow.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use lagertool_agent::{
    BorrowEvent, BorrowWorkflow, CatalogSearch, MessageBody, OutboundMessage, WorkflowOutcome,
};
use lagertool_core::ApplicationError;
use lagertool_slack::{
    blocks::{self, Reply, SearchRow, DUE_DATE_ACTION_ID},
    commands::{BorrowCommandService, CommandEnvelope, CommandRouteError},
    events::{
        BlockActionEvent, BlockActionService, DirectMessageEvent, DirectMessageService,
        EventContext, EventHandlerError,
    },
};

/// Implements every Slack service trait on top of one [`BorrowWorkflow`].
#[derive(Clone)]
pub struct BorrowSlackService {
    workflow: Arc<BorrowWorkflow>,
    search: Arc<CatalogSearch>,
}

impl BorrowSlackService {
    pub fn new(workflow: Arc<BorrowWorkflow>, search: Arc<CatalogSearch>) -> Self {
        Self { workflow, search }
    }
}

fn render(message: &OutboundMessage) -> Reply {
    let template = match &message.body {
        MessageBody::Text(text) => blocks::text_message(text),
        MessageBody::DueDatePicker { prompt, initial_date } => {
            blocks::due_date_picker_message(prompt, *initial_date)
        }
    };
    Reply::to_channel(&message.channel, template)
}

fn render_outcome(outcome: &WorkflowOutcome) -> Vec<Reply> {
    outcome.messages.iter().map(render).collect()
}

#[async_trait]
impl BorrowCommandService for BorrowSlackService {
    async fn start_borrow(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError> {
        let event = BorrowEvent::Start {
            user_id: envelope.user_id.clone(),
            group_channel: envelope.channel_id.clone(),
        };
        let outcome = self.workflow.apply(event, &envelope.request_id).await;

        let mut replies = vec![Reply::ephemeral(
            &envelope.channel_id,
            &envelope.user_id,
            blocks::start_ack_message(),
        )];
        replies.extend(render_outcome(&outcome));
        Ok(replies)
    }

    async fn search_catalog(
        &self,
        queries: Vec<String>,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError> {
        let template = match self.search.search(&queries).await {
            Ok(hits) => {
                let rows: Vec<SearchRow> = hits
                    .into_iter()
                    .map(|hit| SearchRow { name: hit.item.name, on_hand: hit.on_hand })
                    .collect();
                info!(
                    event_name = "agent.search.completed",
                    correlation_id = %envelope.request_id,
                    user_id = %envelope.user_id,
                    queries = queries.len(),
                    hits = rows.len(),
                    "catalog search completed"
                );
                blocks::search_results_message(&queries, &rows)
            }
            Err(repository_error) => {
                error!(
                    event_name = "agent.search.failed",
                    correlation_id = %envelope.request_id,
                    error = %repository_error,
                    "catalog search failed"
                );
                let interface = ApplicationError::from(repository_error)
                    .into_interface(envelope.request_id.clone());
                blocks::error_message(interface.user_message(), &envelope.request_id)
            }
        };
        Ok(vec![Reply::ephemeral(&envelope.channel_id, &envelope.user_id, template)])
    }

    async fn cancel_borrow(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError> {
        let dropped = self.workflow.sessions().delete(&envelope.user_id).await;
        info!(
            event_name = "agent.borrow.cancelled",
            correlation_id = %envelope.request_id,
            user_id = %envelope.user_id,
            dropped,
            "borrow cancel command handled"
        );
        let text = if dropped {
            "Your open borrow request was dropped."
        } else {
            "You have no open borrow request."
        };
        Ok(vec![Reply::ephemeral(
            &envelope.channel_id,
            &envelope.user_id,
            blocks::text_message(text),
        )])
    }
}

#[async_trait]
impl DirectMessageService for BorrowSlackService {
    async fn handle_direct_message(
        &self,
        event: &DirectMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Reply>, EventHandlerError> {
        let outcome = self
            .workflow
            .apply(
                BorrowEvent::Text {
                    user_id: event.user_id.clone(),
                    channel_id: event.channel_id.clone(),
                    text: event.text.clone(),
                },
                &ctx.correlation_id,
            )
            .await;
        Ok(render_outcome(&outcome))
    }
}

#[async_trait]
impl BlockActionService for BorrowSlackService {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Reply>, EventHandlerError> {
        if event.action_id != DUE_DATE_ACTION_ID {
            return Ok(Vec::new());
        }
        let Some(date) = event.selected_date else {
            return Err(EventHandlerError::BlockAction("datepicker without a date".to_owned()));
        };

        let outcome = self
            .workflow
            .apply(
                BorrowEvent::DueDateSelected {
                    user_id: event.user_id.clone(),
                    channel_id: event.channel_id.clone(),
                    date: date.format("%Y-%m-%d").to_string(),
                },
                &ctx.correlation_id,
            )
            .await;
        Ok(render_outcome(&outcome))
    }
}
