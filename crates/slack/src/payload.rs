//! Decoding of Slack's HTTP callbacks into typed [`SlackEnvelope`]s.
//!
//! Three request shapes reach the bot: Events API JSON (direct messages and the
//! `url_verification` handshake), slash command forms and interactivity forms
//! whose `payload` field carries the block action JSON. Anything else decodes to
//! [`SlackEvent::Unsupported`].

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::commands::SlashCommandPayload;
use crate::events::{BlockActionEvent, DirectMessageEvent, SlackEnvelope, SlackEvent};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed slack payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("slack payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid datepicker value `{0}`")]
    InvalidDate(String),
}

/// What an Events API POST asks of the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsApiRequest {
    UrlVerification { challenge: String },
    Event(SlackEnvelope),
}

#[derive(Deserialize)]
struct EventsApiBody {
    #[serde(rename = "type")]
    kind: String,
    challenge: Option<String>,
    event_id: Option<String>,
    #[serde(default)]
    event: Value,
}

#[derive(Deserialize)]
struct MessageEvent {
    #[serde(rename = "type")]
    kind: String,
    channel_type: Option<String>,
    subtype: Option<String>,
    bot_id: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct SlashCommandBody {
    command: String,
    #[serde(default)]
    text: String,
    channel_id: String,
    user_id: String,
    #[serde(default)]
    trigger_id: String,
}

#[derive(Deserialize)]
struct InteractiveBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    trigger_id: String,
    user: IdRef,
    channel: Option<IdRef>,
    container: Option<Container>,
    #[serde(default)]
    actions: Vec<ActionBody>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct Container {
    channel_id: Option<String>,
}

#[derive(Deserialize)]
struct ActionBody {
    action_id: String,
    value: Option<String>,
    selected_date: Option<String>,
}

pub fn parse_events_request(raw: &str) -> Result<EventsApiRequest, PayloadError> {
    let body: EventsApiBody = serde_json::from_str(raw)?;
    match body.kind.as_str() {
        "url_verification" => {
            let challenge = body.challenge.ok_or(PayloadError::MissingField("challenge"))?;
            Ok(EventsApiRequest::UrlVerification { challenge })
        }
        "event_callback" => {
            let envelope_id = body.event_id.ok_or(PayloadError::MissingField("event_id"))?;
            let event = decode_message_event(body.event)?;
            Ok(EventsApiRequest::Event(SlackEnvelope { envelope_id, event }))
        }
        other => Ok(EventsApiRequest::Event(SlackEnvelope {
            envelope_id: body.event_id.unwrap_or_default(),
            event: SlackEvent::Unsupported { event_type: other.to_owned() },
        })),
    }
}

/// Slash command form fields. The trigger id doubles as request id.
pub fn parse_slash_command_form(
    fields: &HashMap<String, String>,
) -> Result<SlackEnvelope, PayloadError> {
    let body: SlashCommandBody = serde_json::from_value(serde_json::to_value(fields)?)?;
    let envelope_id =
        if body.trigger_id.is_empty() { "slash-command".to_owned() } else { body.trigger_id };
    Ok(SlackEnvelope {
        envelope_id: envelope_id.clone(),
        event: SlackEvent::SlashCommand(SlashCommandPayload {
            command: body.command,
            text: body.text,
            channel_id: body.channel_id,
            user_id: body.user_id,
            trigger_ts: envelope_id.clone(),
            request_id: envelope_id,
        }),
    })
}

pub fn parse_interaction_form(
    fields: &HashMap<String, String>,
) -> Result<SlackEnvelope, PayloadError> {
    let raw = fields.get("payload").ok_or(PayloadError::MissingField("payload"))?;
    let body: InteractiveBody = serde_json::from_str(raw)?;
    let envelope_id =
        if body.trigger_id.is_empty() { "interaction".to_owned() } else { body.trigger_id.clone() };
    Ok(SlackEnvelope { envelope_id, event: decode_interactive(body)? })
}

fn decode_message_event(event: Value) -> Result<SlackEvent, PayloadError> {
    let event: MessageEvent = serde_json::from_value(event)?;
    let is_direct_message = event.kind == "message"
        && event.channel_type.as_deref() == Some("im")
        && event.subtype.is_none()
        && event.bot_id.is_none();
    if !is_direct_message {
        let event_type = match event.subtype {
            Some(subtype) => format!("{}.{subtype}", event.kind),
            None => event.kind,
        };
        return Ok(SlackEvent::Unsupported { event_type });
    }

    Ok(SlackEvent::DirectMessage(DirectMessageEvent {
        channel_id: event.channel.ok_or(PayloadError::MissingField("event.channel"))?,
        user_id: event.user.ok_or(PayloadError::MissingField("event.user"))?,
        text: event.text,
    }))
}

fn decode_interactive(body: InteractiveBody) -> Result<SlackEvent, PayloadError> {
    if body.kind != "block_actions" {
        return Ok(SlackEvent::Unsupported { event_type: body.kind });
    }
    let channel_id = body
        .channel
        .map(|channel| channel.id)
        .or_else(|| body.container.and_then(|container| container.channel_id))
        .ok_or(PayloadError::MissingField("channel"))?;
    let action =
        body.actions.into_iter().next().ok_or(PayloadError::MissingField("actions"))?;
    let selected_date = action
        .selected_date
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| PayloadError::InvalidDate(raw))
        })
        .transpose()?;

    Ok(SlackEvent::BlockAction(BlockActionEvent {
        channel_id,
        user_id: body.user.id,
        action_id: action.action_id,
        value: action.value,
        selected_date,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use super::{
        parse_events_request, parse_interaction_form, parse_slash_command_form, EventsApiRequest,
        PayloadError,
    };
    use crate::events::{SlackEnvelope, SlackEvent};

    fn envelope(raw: &str) -> SlackEnvelope {
        match parse_events_request(raw).expect("request parses") {
            EventsApiRequest::Event(envelope) => envelope,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(key, value)| ((*key).to_owned(), (*value).to_owned())).collect()
    }

    #[test]
    fn url_verification_returns_the_challenge() {
        let raw = r#"{"type":"url_verification","challenge":"3eZbrw1a","token":"x"}"#;
        let request = parse_events_request(raw).expect("handshake");

        assert_eq!(request, EventsApiRequest::UrlVerification { challenge: "3eZbrw1a".to_owned() });
    }

    #[test]
    fn direct_message_event() {
        let envelope = envelope(
            r#"{"type":"event_callback","event_id":"Ev1","event":{
                "type":"message","channel_type":"im","user":"U1","channel":"D1",
                "text":"Beaker"}}"#,
        );

        let SlackEvent::DirectMessage(message) = envelope.event else {
            panic!("expected a direct message");
        };
        assert_eq!(envelope.envelope_id, "Ev1");
        assert_eq!(message.user_id, "U1");
        assert_eq!(message.channel_id, "D1");
        assert_eq!(message.text, "Beaker");
    }

    #[test]
    fn bot_echoes_and_edits_are_unsupported() {
        let bot = envelope(
            r#"{"type":"event_callback","event_id":"Ev2","event":{
                "type":"message","channel_type":"im","bot_id":"B1","channel":"D1","text":"hi"}}"#,
        );
        let edited = envelope(
            r#"{"type":"event_callback","event_id":"Ev3","event":{
                "type":"message","subtype":"message_changed","channel_type":"im",
                "channel":"D1"}}"#,
        );

        assert!(matches!(bot.event, SlackEvent::Unsupported { .. }));
        assert_eq!(
            edited.event,
            SlackEvent::Unsupported { event_type: "message.message_changed".to_owned() }
        );
    }

    #[test]
    fn slash_command_form_uses_trigger_id_as_request_id() {
        let envelope = parse_slash_command_form(&form(&[
            ("command", "/borrow"),
            ("text", "search beaker"),
            ("channel_id", "C1"),
            ("user_id", "U1"),
            ("trigger_id", "t-1"),
            ("team_id", "T1"),
        ]))
        .expect("command");

        let SlackEvent::SlashCommand(payload) = envelope.event else {
            panic!("expected a slash command");
        };
        assert_eq!(payload.text, "search beaker");
        assert_eq!(payload.request_id, "t-1");
        assert_eq!(envelope.envelope_id, "t-1");
    }

    #[test]
    fn datepicker_interaction_carries_selected_date() {
        let envelope = parse_interaction_form(&form(&[(
            "payload",
            r#"{"type":"block_actions","trigger_id":"t-2","user":{"id":"U1"},
                "container":{"channel_id":"D1"},
                "actions":[{"action_id":"borrow.due_date.v1","type":"datepicker",
                "selected_date":"2030-01-31"}]}"#,
        )]))
        .expect("interaction");

        let SlackEvent::BlockAction(action) = envelope.event else {
            panic!("expected a block action");
        };
        assert_eq!(envelope.envelope_id, "t-2");
        assert_eq!(action.channel_id, "D1");
        assert_eq!(action.selected_date, NaiveDate::from_ymd_opt(2030, 1, 31));
    }

    #[test]
    fn invalid_requests_are_errors() {
        assert!(matches!(parse_events_request("not json"), Err(PayloadError::Json(_))));
        assert!(matches!(
            parse_events_request(r#"{"type":"event_callback","event":{"type":"message"}}"#),
            Err(PayloadError::MissingField("event_id"))
        ));
        assert!(matches!(
            parse_interaction_form(&form(&[("token", "x")])),
            Err(PayloadError::MissingField("payload"))
        ));
        assert!(matches!(
            parse_slash_command_form(&form(&[("command", "/borrow")])),
            Err(PayloadError::Json(_))
        ));
        assert!(matches!(
            parse_interaction_form(&form(&[(
                "payload",
                r#"{"type":"block_actions","user":{"id":"U1"},"channel":{"id":"D1"},
                "actions":[{"action_id":"borrow.due_date.v1","selected_date":"31.01.2030"}]}"#
            )])),
            Err(PayloadError::InvalidDate(_))
        ));
    }
}
