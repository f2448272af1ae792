use thiserror::Error;

use crate::audit::{AuditKind, AuditScope, AuditSink};
use crate::flows::states::{
    BorrowStage, FlowAction, FlowContext, FlowEvent, FlowType, TransitionOutcome,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> BorrowStage;
    fn transition(
        &self,
        current: &BorrowStage,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct BorrowFlow;

impl FlowDefinition for BorrowFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::Borrow
    }

    fn initial_state(&self) -> BorrowStage {
        BorrowStage::Start
    }

    fn transition(
        &self,
        current: &BorrowStage,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_borrow(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> BorrowStage {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &BorrowStage,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &BorrowStage,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        scope: &AuditScope,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        let audit_event = match &result {
            Ok(outcome) => scope
                .record(AuditKind::TransitionApplied)
                .with_detail("from", outcome.from.as_str())
                .with_detail("to", outcome.to.as_str())
                .with_detail("event", format!("{:?}", outcome.event)),
            Err(error) => scope
                .record(AuditKind::TransitionRejected)
                .with_detail("from", current.as_str())
                .with_detail("error", error),
        };
        sink.emit(audit_event);
        result
    }
}

impl Default for FlowEngine<BorrowFlow> {
    fn default() -> Self {
        Self::new(BorrowFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: BorrowStage, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: BorrowStage, event: FlowEvent },
}

fn transition_borrow(
    current: &BorrowStage,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use BorrowStage::{
        AwaitingDueDate, AwaitingItem, AwaitingQuantity, AwaitingSource, Confirm, Start,
    };
    use FlowAction::{
        AcknowledgeCancel, CreateReservation, NotifyGroupChannel, NotifyRequester,
        PromptForConfirmation, PromptForItem, PromptForQuantity, PromptForSource,
        RequestDueDatePicker, ResetSession,
    };
    use FlowEvent::{
        CancelRequested, DueDateAccepted, Greeted, ItemResolved, QuantityAccepted,
        ReservationConfirmed, Restarted, SourceCaptured,
    };

    let (to, actions) = match (current, event) {
        (Start, Greeted) => (AwaitingItem, vec![PromptForItem]),
        (AwaitingItem, ItemResolved) => (AwaitingQuantity, vec![PromptForQuantity]),
        (AwaitingQuantity, QuantityAccepted) => (AwaitingSource, vec![PromptForSource]),
        (AwaitingSource, SourceCaptured) => (AwaitingDueDate, vec![RequestDueDatePicker]),
        (AwaitingDueDate, DueDateAccepted) => (Confirm, vec![PromptForConfirmation]),
        (Confirm, ReservationConfirmed) => {
            if !context.missing_required_fields.is_empty() {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: *current,
                    missing_fields: context.missing_required_fields.clone(),
                });
            }
            (
                AwaitingItem,
                vec![CreateReservation, NotifyRequester, NotifyGroupChannel, ResetSession],
            )
        }
        (Start, CancelRequested) => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
        (_, CancelRequested) => (AwaitingItem, vec![ResetSession, AcknowledgeCancel]),
        (_, Restarted) => (AwaitingItem, vec![ResetSession, PromptForItem]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditKind, AuditLog, AuditScope};
    use crate::flows::engine::{BorrowFlow, FlowDefinition, FlowEngine, FlowTransitionError};
    use crate::flows::states::{BorrowStage, FlowAction, FlowContext, FlowEvent, FlowType};

    #[test]
    fn borrow_flow_happy_path() {
        let engine = FlowEngine::new(BorrowFlow);
        let context = FlowContext::default();
        let mut stage = engine.initial_state();

        for (event, expected) in [
            (FlowEvent::Greeted, BorrowStage::AwaitingItem),
            (FlowEvent::ItemResolved, BorrowStage::AwaitingQuantity),
            (FlowEvent::QuantityAccepted, BorrowStage::AwaitingSource),
            (FlowEvent::SourceCaptured, BorrowStage::AwaitingDueDate),
            (FlowEvent::DueDateAccepted, BorrowStage::Confirm),
        ] {
            stage = engine.apply(&stage, &event, &context).expect("forward transition").to;
            assert_eq!(stage, expected);
        }

        let confirmed = engine
            .apply(&stage, &FlowEvent::ReservationConfirmed, &context)
            .expect("confirm -> awaiting item");
        assert_eq!(confirmed.to, BorrowStage::AwaitingItem);
        assert_eq!(
            confirmed.actions,
            vec![
                FlowAction::CreateReservation,
                FlowAction::NotifyRequester,
                FlowAction::NotifyGroupChannel,
                FlowAction::ResetSession,
            ]
        );
    }

    #[test]
    fn entering_due_date_requests_a_picker() {
        let outcome = FlowEngine::default()
            .apply(
                &BorrowStage::AwaitingSource,
                &FlowEvent::SourceCaptured,
                &FlowContext::default(),
            )
            .expect("source -> due date");

        assert_eq!(outcome.actions, vec![FlowAction::RequestDueDatePicker]);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let error = FlowEngine::default()
            .apply(
                &BorrowStage::AwaitingItem,
                &FlowEvent::DueDateAccepted,
                &FlowContext::default(),
            )
            .expect_err("item stage cannot accept a due date");

        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                state: BorrowStage::AwaitingItem,
                event: FlowEvent::DueDateAccepted
            }
        ));
    }

    #[test]
    fn confirmation_requires_collected_fields() {
        let error = FlowEngine::default()
            .apply(
                &BorrowStage::Confirm,
                &FlowEvent::ReservationConfirmed,
                &FlowContext { missing_required_fields: vec!["due_date".to_owned()] },
            )
            .expect_err("must reject incomplete request");

        assert!(matches!(error, FlowTransitionError::MissingRequiredFields { .. }));
    }

    #[test]
    fn cancel_resets_from_any_active_stage_but_not_start() {
        let engine = FlowEngine::default();
        let context = FlowContext::default();

        for stage in [
            BorrowStage::AwaitingItem,
            BorrowStage::AwaitingQuantity,
            BorrowStage::AwaitingSource,
            BorrowStage::AwaitingDueDate,
            BorrowStage::Confirm,
        ] {
            let outcome =
                engine.apply(&stage, &FlowEvent::CancelRequested, &context).expect("cancel");
            assert_eq!(outcome.to, BorrowStage::AwaitingItem);
            assert!(outcome.actions.contains(&FlowAction::ResetSession));
        }

        assert!(engine.apply(&BorrowStage::Start, &FlowEvent::CancelRequested, &context).is_err());
    }

    #[test]
    fn restart_is_accepted_everywhere() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(&BorrowStage::AwaitingDueDate, &FlowEvent::Restarted, &FlowContext::default())
            .expect("restart");

        assert_eq!(outcome.to, BorrowStage::AwaitingItem);
        assert_eq!(outcome.actions, vec![FlowAction::ResetSession, FlowAction::PromptForItem]);
        assert_eq!(engine.flow_type(), FlowType::Borrow);
        assert_eq!(BorrowFlow.initial_state(), BorrowStage::Start);
    }

    #[test]
    fn flow_transition_emits_audit_event() {
        let engine = FlowEngine::default();
        let log = AuditLog::default();

        engine
            .apply_with_audit(
                &BorrowStage::Start,
                &FlowEvent::Greeted,
                &FlowContext::default(),
                &log,
                &AuditScope::new("U123", "D456", "req-42"),
            )
            .expect("transition should succeed");

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].user_id, "U123");
        assert_eq!(events[0].kind, AuditKind::TransitionApplied);
        assert_eq!(events[0].detail("to"), Some("awaiting_item"));
    }

    #[test]
    fn rejected_transition_is_audited() {
        let log = AuditLog::default();

        let result = FlowEngine::default().apply_with_audit(
            &BorrowStage::Confirm,
            &FlowEvent::Greeted,
            &FlowContext::default(),
            &log,
            &AuditScope::new("U1", "D1", "req-43"),
        );

        assert!(result.is_err());
        assert_eq!(log.count(AuditKind::TransitionRejected), 1);
        assert_eq!(log.events()[0].detail("from"), Some("confirm"));
    }
}
