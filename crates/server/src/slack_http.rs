//! Slack's HTTP callbacks: Events API, interactivity and the `/borrow` slash command.
//!
//! Each request is decoded and dispatched before the response goes back, so the
//! conversation state is current when Slack sees the 200. Replies are posted
//! from a spawned task.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use lagertool_slack::events::SlackEnvelope;
use lagertool_slack::ingress::SlackIngress;
use lagertool_slack::payload::{
    parse_events_request, parse_interaction_form, parse_slash_command_form, EventsApiRequest,
    PayloadError,
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct Challenge {
    challenge: String,
}

pub fn router(ingress: Arc<SlackIngress>) -> Router {
    Router::new()
        .route("/slack/events", post(events))
        .route("/slack/interactivity", post(interactivity))
        .route("/slack/commands", post(commands))
        .with_state(ingress)
}

pub async fn events(State(ingress): State<Arc<SlackIngress>>, body: String) -> Response {
    match parse_events_request(&body) {
        Ok(EventsApiRequest::UrlVerification { challenge }) => {
            Json(Challenge { challenge }).into_response()
        }
        Ok(EventsApiRequest::Event(envelope)) => accept(ingress, envelope).await,
        Err(error) => rejected("events", &error),
    }
}

pub async fn interactivity(
    State(ingress): State<Arc<SlackIngress>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    match parse_interaction_form(&fields) {
        Ok(envelope) => accept(ingress, envelope).await,
        Err(error) => rejected("interactivity", &error),
    }
}

pub async fn commands(
    State(ingress): State<Arc<SlackIngress>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    match parse_slash_command_form(&fields) {
        Ok(envelope) => accept(ingress, envelope).await,
        Err(error) => rejected("commands", &error),
    }
}

async fn accept(ingress: Arc<SlackIngress>, envelope: SlackEnvelope) -> Response {
    let replies = ingress.handle(&envelope).await;
    if !replies.is_empty() {
        tokio::spawn(async move {
            ingress.deliver_all(&replies, &envelope.envelope_id).await;
        });
    }
    StatusCode::OK.into_response()
}

fn rejected(route: &'static str, error: &PayloadError) -> Response {
    warn!(
        event_name = "ingress.slack.payload_rejected",
        correlation_id = "unknown",
        route,
        error = %error,
        "could not decode slack callback"
    );
    StatusCode::BAD_REQUEST.into_response()
}
