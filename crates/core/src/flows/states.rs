use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Borrow,
}

/// Conversation stages, in the only order a request may advance through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorrowStage {
    Start,
    AwaitingItem,
    AwaitingQuantity,
    AwaitingSource,
    AwaitingDueDate,
    Confirm,
}

impl BorrowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AwaitingItem => "awaiting_item",
            Self::AwaitingQuantity => "awaiting_quantity",
            Self::AwaitingSource => "awaiting_source",
            Self::AwaitingDueDate => "awaiting_due_date",
            Self::Confirm => "confirm",
        }
    }
}

/// Validated facts fed into the flow. Validation itself happens before an event
/// is raised; the flow only decides where the conversation goes next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    Greeted,
    ItemResolved,
    QuantityAccepted,
    SourceCaptured,
    DueDateAccepted,
    ReservationConfirmed,
    CancelRequested,
    Restarted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    PromptForItem,
    PromptForQuantity,
    PromptForSource,
    RequestDueDatePicker,
    PromptForConfirmation,
    CreateReservation,
    NotifyRequester,
    NotifyGroupChannel,
    ResetSession,
    AcknowledgeCancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: BorrowStage,
    pub to: BorrowStage,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
