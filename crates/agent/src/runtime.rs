use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use lagertool_core::audit::{AuditKind, AuditScope, AuditSink, NoopAuditSink};
use lagertool_core::catalog::match_catalog;
use lagertool_core::domain::catalog::total_on_hand;
use lagertool_core::flows::{
    BorrowFlow, FlowAction, FlowContext, FlowEngine, FlowEvent, TransitionOutcome,
};
use lagertool_core::{
    ApplicationError, BorrowSession, BorrowStage, Clock, DomainError, NewReservation,
    ReservationReceipt,
};
use lagertool_db::repositories::{CatalogRepository, RepositoryError, ReservationRepository};

use crate::directory::{StaticUserDirectory, UserDirectory};
use crate::outbound::{Audience, Disposition, MessageBody, OutboundMessage, WorkflowOutcome};
use crate::sessions::{LockMode, SessionStore};

pub const CONFIRM_KEYWORD: &str = "confirm";
pub const CANCEL_KEYWORD: &str = "cancel";

pub const ITEM_PROMPT: &str = "What would you like to borrow? Send me the item name.";
pub const SOURCE_PROMPT: &str =
    "Where do you want to pick it up? Send the location as campus;building;room.";
pub const DUE_DATE_PROMPT: &str = "Until when do you need it? Pick a due date.";
pub const CONFIRM_PROMPT: &str = "Type 'confirm' to finalize or 'cancel' to abandon.";
pub const CANCEL_ACK: &str =
    "Okay, I dropped that request. Send me another item name whenever you need something.";
pub const RETRY_MESSAGE: &str = "Sorry, I could not complete your reservation, please retry.";

/// One inbound interaction, already stripped of transport details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BorrowEvent {
    /// `/borrow` issued in a group channel. Restarts the user's conversation.
    Start { user_id: String, group_channel: String },
    /// Free text sent to the bot in a direct conversation.
    Text { user_id: String, channel_id: String, text: String },
    /// Value chosen in the due-date picker, as `YYYY-MM-DD`.
    DueDateSelected { user_id: String, channel_id: String, date: String },
}

impl BorrowEvent {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Start { user_id, .. }
            | Self::Text { user_id, .. }
            | Self::DueDateSelected { user_id, .. } => user_id,
        }
    }

    fn channel_id(&self) -> &str {
        match self {
            Self::Start { group_channel, .. } => group_channel,
            Self::Text { channel_id, .. } | Self::DueDateSelected { channel_id, .. } => channel_id,
        }
    }
}

struct Step {
    disposition: Disposition,
    messages: Vec<OutboundMessage>,
    reservation: Option<ReservationReceipt>,
}

impl Step {
    fn new(disposition: Disposition, messages: Vec<OutboundMessage>) -> Self {
        Self { disposition, messages, reservation: None }
    }

    fn reprompt(session: &BorrowSession, text: impl Into<String>) -> Self {
        let message = OutboundMessage::private_text(reply_to(session), text);
        Self::new(Disposition::Reprompted, vec![message])
    }
}

fn reply_to(session: &BorrowSession) -> String {
    session.reply_channel.clone().unwrap_or_else(|| session.user_id.clone())
}

/// A due date counts from midnight UTC, so only tomorrow or later is accepted.
fn due_date_is_future(date: NaiveDate, now: DateTime<Utc>) -> bool {
    date.and_hms_opt(0, 0, 0).is_some_and(|midnight| midnight.and_utc() > now)
}

fn missing_fields(session: &BorrowSession) -> Vec<String> {
    let mut missing = Vec::new();
    if session.item.is_none() {
        missing.push("item".to_owned());
    }
    if session.quantity.is_none() {
        missing.push("quantity".to_owned());
    }
    if session.source.is_none() {
        missing.push("source".to_owned());
    }
    if session.due_date.is_none() {
        missing.push("due_date".to_owned());
    }
    missing
}

fn retry_message(error: &RepositoryError) -> String {
    const NEXT: &str = "Type 'confirm' to try again or 'cancel' to start over.";
    match error {
        RepositoryError::InsufficientAvailability { .. }
        | RepositoryError::NotFound(_)
        | RepositoryError::Domain(_) => format!("{RETRY_MESSAGE} ({error}) {NEXT}"),
        RepositoryError::Database(_) | RepositoryError::Decode(_) => {
            format!("{RETRY_MESSAGE} {NEXT}")
        }
    }
}

/// Applies borrow events to per-user sessions.
///
/// Every event runs under the user's session lock, from the first read through
/// any storage calls to the final write, so a user's events are handled one by one
/// in arrival order. Rejected input re-prompts without moving the stage. A failed
/// lookup leaves the session exactly as it was.
pub struct BorrowWorkflow {
    sessions: Arc<SessionStore>,
    catalog: Arc<dyn CatalogRepository>,
    reservations: Arc<dyn ReservationRepository>,
    directory: Arc<dyn UserDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    engine: FlowEngine<BorrowFlow>,
    announce_channel: Option<String>,
}

impl BorrowWorkflow {
    pub fn new(
        sessions: Arc<SessionStore>,
        catalog: Arc<dyn CatalogRepository>,
        reservations: Arc<dyn ReservationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            catalog,
            reservations,
            directory: Arc::new(StaticUserDirectory::new()),
            audit: Arc::new(NoopAuditSink),
            clock,
            engine: FlowEngine::default(),
            announce_channel: None,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Channel announced to when a session never saw `/borrow` in a group channel.
    pub fn with_announce_channel(mut self, channel: Option<String>) -> Self {
        self.announce_channel = channel;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn apply(&self, event: BorrowEvent, correlation_id: &str) -> WorkflowOutcome {
        let mode = match event {
            BorrowEvent::DueDateSelected { .. } => LockMode::ExistingOnly,
            _ => LockMode::CreateIfAbsent,
        };
        let Some(mut session) = self.sessions.lock(event.user_id(), mode).await else {
            debug!(
                event_name = "agent.borrow.callback_ignored",
                correlation_id = %correlation_id,
                user_id = %event.user_id(),
                "no live session for date selection"
            );
            return WorkflowOutcome::ignored();
        };

        let now = self.clock.now();
        let audit = AuditScope::new(event.user_id(), event.channel_id(), correlation_id);
        let mut draft = (*session).clone();

        let result = match event {
            BorrowEvent::Start { group_channel, .. } => {
                self.restart(&mut draft, group_channel, now, &audit)
            }
            BorrowEvent::Text { channel_id, text, .. } => {
                draft.reply_channel = Some(channel_id);
                self.handle_text(&mut draft, text.trim(), now, &audit).await
            }
            BorrowEvent::DueDateSelected { date, .. } => {
                if draft.stage != BorrowStage::AwaitingDueDate {
                    debug!(
                        event_name = "agent.borrow.callback_ignored",
                        correlation_id = %correlation_id,
                        user_id = %draft.user_id,
                        stage = draft.stage.as_str(),
                        "date selected outside the due date stage"
                    );
                    return WorkflowOutcome::ignored();
                }
                self.accept_due_date(&mut draft, &date, now, &audit)
            }
        };

        let step = match result {
            Ok(step) => step,
            Err(error) => {
                error!(
                    event_name = "agent.borrow.failed",
                    correlation_id = %correlation_id,
                    user_id = %draft.user_id,
                    stage = session.stage.as_str(),
                    error = %error,
                    "borrow event could not be handled"
                );
                let reply_channel = draft.reply_channel.take();
                draft = (*session).clone();
                draft.reply_channel = reply_channel.or(draft.reply_channel);
                let interface = error.into_interface(correlation_id);
                Step::new(
                    Disposition::Failed,
                    vec![OutboundMessage::private_text(reply_to(&draft), interface.user_message())],
                )
            }
        };

        draft.touch(now);
        *session = draft;

        WorkflowOutcome {
            disposition: step.disposition,
            stage: Some(session.stage),
            messages: step.messages,
            reservation: step.reservation,
        }
    }

    fn transition(
        &self,
        session: &mut BorrowSession,
        event: FlowEvent,
        audit: &AuditScope,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let context = FlowContext { missing_required_fields: missing_fields(session) };
        let outcome = self
            .engine
            .apply_with_audit(&session.stage, &event, &context, self.audit.as_ref(), audit)
            .map_err(DomainError::from)?;

        if outcome.actions.contains(&FlowAction::ResetSession) {
            session.clear_request();
        }
        session.stage = outcome.to;

        info!(
            event_name = "agent.borrow.transition",
            correlation_id = %audit.correlation_id,
            user_id = %session.user_id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            "borrow stage changed"
        );
        Ok(outcome)
    }

    fn render_prompts(
        &self,
        actions: &[FlowAction],
        session: &BorrowSession,
        today: NaiveDate,
    ) -> Vec<OutboundMessage> {
        let channel = reply_to(session);
        actions
            .iter()
            .filter_map(|action| match action {
                FlowAction::PromptForItem => {
                    Some(OutboundMessage::private_text(&channel, ITEM_PROMPT))
                }
                FlowAction::PromptForQuantity => {
                    let item = session.item.as_deref().unwrap_or("items");
                    let prompt = format!("How many {item} do you need?");
                    Some(OutboundMessage::private_text(&channel, prompt))
                }
                FlowAction::PromptForSource => {
                    Some(OutboundMessage::private_text(&channel, SOURCE_PROMPT))
                }
                FlowAction::RequestDueDatePicker => Some(OutboundMessage {
                    channel: channel.clone(),
                    audience: Audience::Private,
                    body: MessageBody::DueDatePicker {
                        prompt: DUE_DATE_PROMPT.to_owned(),
                        initial_date: today,
                    },
                }),
                FlowAction::PromptForConfirmation => Some(OutboundMessage::private_text(
                    &channel,
                    format!("{}\n{CONFIRM_PROMPT}", summary(session)),
                )),
                FlowAction::AcknowledgeCancel => {
                    Some(OutboundMessage::private_text(&channel, CANCEL_ACK))
                }
                FlowAction::CreateReservation
                | FlowAction::NotifyRequester
                | FlowAction::NotifyGroupChannel
                | FlowAction::ResetSession => None,
            })
            .collect()
    }

    fn restart(
        &self,
        draft: &mut BorrowSession,
        group_channel: String,
        now: DateTime<Utc>,
        audit: &AuditScope,
    ) -> Result<Step, ApplicationError> {
        draft.group_channel = Some(group_channel);
        if draft.reply_channel.is_none() {
            draft.reply_channel = Some(draft.user_id.clone());
        }
        let outcome = self.transition(draft, FlowEvent::Restarted, audit)?;

        let mut messages = vec![OutboundMessage::private_text(
            reply_to(draft),
            format!("Hi <@{}>! Let's set up your borrow request.", draft.user_id),
        )];
        messages.extend(self.render_prompts(&outcome.actions, draft, now.date_naive()));
        Ok(Step::new(Disposition::Advanced, messages))
    }

    async fn handle_text(
        &self,
        draft: &mut BorrowSession,
        text: &str,
        now: DateTime<Utc>,
        audit: &AuditScope,
    ) -> Result<Step, ApplicationError> {
        if draft.stage != BorrowStage::Start && text.eq_ignore_ascii_case(CANCEL_KEYWORD) {
            let outcome = self.transition(draft, FlowEvent::CancelRequested, audit)?;
            let messages = self.render_prompts(&outcome.actions, draft, now.date_naive());
            return Ok(Step::new(Disposition::Cancelled, messages));
        }

        match draft.stage {
            BorrowStage::Start => {
                let outcome = self.transition(draft, FlowEvent::Greeted, audit)?;
                let mut messages = vec![OutboundMessage::private_text(
                    reply_to(draft),
                    "Hi! I can reserve equipment from the lab inventory for you.",
                )];
                messages.extend(self.render_prompts(&outcome.actions, draft, now.date_naive()));
                Ok(Step::new(Disposition::Advanced, messages))
            }
            BorrowStage::AwaitingItem => self.accept_item(draft, text, now, audit).await,
            BorrowStage::AwaitingQuantity => self.accept_quantity(draft, text, now, audit).await,
            BorrowStage::AwaitingSource => {
                draft.source = Some(text.to_owned());
                let outcome = self.transition(draft, FlowEvent::SourceCaptured, audit)?;
                let messages = self.render_prompts(&outcome.actions, draft, now.date_naive());
                Ok(Step::new(Disposition::Advanced, messages))
            }
            BorrowStage::AwaitingDueDate => self.accept_due_date(draft, text, now, audit),
            BorrowStage::Confirm if text.eq_ignore_ascii_case(CONFIRM_KEYWORD) => {
                self.confirm(draft, now, audit).await
            }
            BorrowStage::Confirm => Ok(Step::reprompt(draft, CONFIRM_PROMPT)),
        }
    }

    async fn accept_item(
        &self,
        draft: &mut BorrowSession,
        text: &str,
        now: DateTime<Utc>,
        audit: &AuditScope,
    ) -> Result<Step, ApplicationError> {
        let catalog = self.catalog.list_catalog_items().await?;
        let matches = match_catalog(&catalog, text);

        let Some(top) = matches.first() else {
            return Ok(Step::reprompt(
                draft,
                format!(
                    "I could not find `{text}` in the catalog. Try another name or `/borrow \
                     search {text}`."
                ),
            ));
        };
        if !top.is_named(text) {
            return Ok(Step::reprompt(
                draft,
                format!("Did you mean *{}*? Send the exact name to continue.", top.name),
            ));
        }

        draft.item = Some(top.name.clone());
        draft.item_id = Some(top.id);
        let outcome = self.transition(draft, FlowEvent::ItemResolved, audit)?;
        let messages = self.render_prompts(&outcome.actions, draft, now.date_naive());
        Ok(Step::new(Disposition::Advanced, messages))
    }

    async fn accept_quantity(
        &self,
        draft: &mut BorrowSession,
        text: &str,
        now: DateTime<Utc>,
        audit: &AuditScope,
    ) -> Result<Step, ApplicationError> {
        let amount = match text.parse::<u32>() {
            Ok(amount) if amount > 0 => amount,
            _ => {
                return Ok(Step::reprompt(
                    draft,
                    "Please send the amount as a whole number greater than zero.",
                ))
            }
        };
        let item_id = draft.item_id.ok_or_else(|| {
            DomainError::InvariantViolation("quantity requested before an item was chosen".into())
        })?;

        let stock = self.catalog.list_inventory_for(item_id).await?;
        let on_hand = total_on_hand(&stock);
        if u64::from(amount) > on_hand {
            let item = draft.item.clone().unwrap_or_default();
            return Ok(Step::reprompt(
                draft,
                format!("Only {on_hand} {item} on hand in total. Please enter a smaller amount."),
            ));
        }

        draft.quantity = Some(amount);
        let outcome = self.transition(draft, FlowEvent::QuantityAccepted, audit)?;
        let messages = self.render_prompts(&outcome.actions, draft, now.date_naive());
        Ok(Step::new(Disposition::Advanced, messages))
    }

    fn accept_due_date(
        &self,
        draft: &mut BorrowSession,
        raw: &str,
        now: DateTime<Utc>,
        audit: &AuditScope,
    ) -> Result<Step, ApplicationError> {
        let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
            return Ok(Step::reprompt(
                draft,
                "Please pick a date or send it as YYYY-MM-DD, for example 2030-01-31.",
            ));
        };
        if !due_date_is_future(date, now) {
            return Ok(Step::reprompt(
                draft,
                "The due date has to be after today. Please pick a later date.",
            ));
        }

        draft.due_date = Some(date);
        let outcome = self.transition(draft, FlowEvent::DueDateAccepted, audit)?;
        let messages = self.render_prompts(&outcome.actions, draft, now.date_naive());
        Ok(Step::new(Disposition::Advanced, messages))
    }

    /// Runs the confirmation actions in the order the flow lists them. The
    /// reservation write comes first; if it fails the stage stays at confirm and
    /// nobody is notified.
    async fn confirm(
        &self,
        draft: &mut BorrowSession,
        now: DateTime<Utc>,
        audit: &AuditScope,
    ) -> Result<Step, ApplicationError> {
        let (Some(item), Some(quantity), Some(source), Some(due_date)) =
            (draft.item.clone(), draft.quantity, draft.source.clone(), draft.due_date)
        else {
            return Err(DomainError::InvariantViolation(format!(
                "confirmation with missing fields: {}",
                missing_fields(draft).join(", ")
            ))
            .into());
        };
        let context = FlowContext { missing_required_fields: Vec::new() };
        let plan = self
            .engine
            .apply(&draft.stage, &FlowEvent::ReservationConfirmed, &context)
            .map_err(DomainError::from)?;

        let mut receipt = None;
        let mut messages = Vec::new();
        for action in &plan.actions {
            match action {
                FlowAction::CreateReservation => {
                    let request = NewReservation {
                        requester_id: draft.user_id.clone(),
                        requester_display_name: self.display_name(draft, audit).await,
                        item_name: item.clone(),
                        amount: quantity,
                        location: source.clone(),
                        start_date: now.date_naive(),
                        due_date,
                    };
                    match self.reservations.create_reservation(request).await {
                        Ok(created) => {
                            self.audit.emit(
                                audit
                                    .record(AuditKind::ReservationCreated)
                                    .with_detail("reservation_id", created.id.0)
                                    .with_detail("amount", quantity),
                            );
                            receipt = Some(created);
                        }
                        Err(error) => {
                            error!(
                                event_name = "agent.borrow.reservation_failed",
                                correlation_id = %audit.correlation_id,
                                user_id = %draft.user_id,
                                item = %item,
                                amount = quantity,
                                error = %error,
                                "reservation could not be created"
                            );
                            self.audit.emit(
                                audit
                                    .record(AuditKind::ReservationFailed)
                                    .with_detail("item", &item)
                                    .with_detail("error", &error),
                            );
                            let message = OutboundMessage::private_text(
                                reply_to(draft),
                                retry_message(&error),
                            );
                            return Ok(Step::new(Disposition::Failed, vec![message]));
                        }
                    }
                }
                FlowAction::NotifyRequester => messages.push(OutboundMessage::private_text(
                    reply_to(draft),
                    format!(
                        "Done! {quantity} x {item} from {source} are reserved for you until \
                         {due_date}. Send me another item name to borrow something else."
                    ),
                )),
                FlowAction::NotifyGroupChannel => {
                    match draft.group_channel.clone().or_else(|| self.announce_channel.clone()) {
                        Some(channel) => messages.push(OutboundMessage::public_text(
                            channel,
                            format!(
                                "<@{}> borrowed {quantity} x {item} from {source} until \
                                 {due_date}.",
                                draft.user_id
                            ),
                        )),
                        None => warn!(
                            event_name = "agent.borrow.announcement_skipped",
                            correlation_id = %audit.correlation_id,
                            user_id = %draft.user_id,
                            "no group or announcement channel configured"
                        ),
                    }
                }
                _ => {}
            }
        }

        self.transition(draft, FlowEvent::ReservationConfirmed, audit)?;
        Ok(Step { disposition: Disposition::Completed, messages, reservation: receipt })
    }

    async fn display_name(&self, draft: &BorrowSession, audit: &AuditScope) -> String {
        match self.directory.display_name(&draft.user_id).await {
            Ok(name) => name,
            Err(error) => {
                warn!(
                    event_name = "agent.borrow.directory_lookup_failed",
                    correlation_id = %audit.correlation_id,
                    user_id = %draft.user_id,
                    error = %error,
                    "falling back to user id as display name"
                );
                draft.user_id.clone()
            }
        }
    }
}

fn summary(session: &BorrowSession) -> String {
    format!(
        "You want {} x {} from {} until {}.",
        session.quantity.unwrap_or_default(),
        session.item.as_deref().unwrap_or("?"),
        session.source.as_deref().unwrap_or("?"),
        session.due_date.map(|date| date.to_string()).unwrap_or_else(|| "?".to_owned()),
    )
}
