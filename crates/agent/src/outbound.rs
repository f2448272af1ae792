use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lagertool_core::{BorrowStage, ReservationReceipt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// Only the requester sees it.
    Private,
    /// Posted to the group channel for everyone.
    Public,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Text(String),
    DueDatePicker { prompt: String, initial_date: NaiveDate },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub audience: Audience,
    pub body: MessageBody,
}

impl OutboundMessage {
    pub fn private_text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            audience: Audience::Private,
            body: MessageBody::Text(text.into()),
        }
    }

    pub fn public_text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            audience: Audience::Public,
            body: MessageBody::Text(text.into()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(text),
            MessageBody::DueDatePicker { .. } => None,
        }
    }
}

/// What happened to a single inbound event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// The conversation moved to a new stage.
    Advanced,
    /// Input was rejected; the user was asked again.
    Reprompted,
    /// A reservation was stored and announced.
    Completed,
    Cancelled,
    /// Nothing to do, e.g. a stale date-picker click.
    Ignored,
    /// A collaborator failed; the stage is unchanged.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub disposition: Disposition,
    pub stage: Option<BorrowStage>,
    pub messages: Vec<OutboundMessage>,
    pub reservation: Option<ReservationReceipt>,
}

impl WorkflowOutcome {
    pub fn ignored() -> Self {
        Self {
            disposition: Disposition::Ignored,
            stage: None,
            messages: Vec::new(),
            reservation: None,
        }
    }
}
