use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use lagertool_core::config::SlackConfig;

use crate::blocks::MessageTemplate;
use crate::ingress::{DeliveryError, MessagePoster};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("slack web api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack web api `{method}` returned error `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack web api `{method}` response is missing `{field}`")]
    MissingField { method: &'static str, field: &'static str },
}

impl From<WebApiError> for DeliveryError {
    fn from(error: WebApiError) -> Self {
        match error {
            WebApiError::Api { error, .. } => Self::Rejected(error),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    body: Value,
}

#[derive(Deserialize)]
struct UserInfo {
    name: String,
    real_name: Option<String>,
    #[serde(default)]
    profile: UserProfile,
}

#[derive(Default, Deserialize)]
struct UserProfile {
    display_name: Option<String>,
}

/// Thin client for the handful of Web API methods the bot calls.
#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Result<Self, WebApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    pub async fn post_message(
        &self,
        channel: &str,
        template: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        let channel = self.resolve_channel(channel).await?;
        self.call("chat.postMessage", message_body(&channel, None, template)).await?;
        Ok(())
    }

    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        template: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        self.call("chat.postEphemeral", message_body(channel, Some(user_id), template)).await?;
        Ok(())
    }

    /// Opens (or reuses) the bot's DM channel with `user_id`.
    pub async fn open_direct_message(&self, user_id: &str) -> Result<String, WebApiError> {
        const METHOD: &str = "conversations.open";
        let body = self.call(METHOD, json!({ "users": user_id })).await?;
        body.pointer("/channel/id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(WebApiError::MissingField { method: METHOD, field: "channel.id" })
    }

    pub async fn user_display_name(&self, user_id: &str) -> Result<String, WebApiError> {
        const METHOD: &str = "users.info";
        let body = self.call(METHOD, json!({ "user": user_id })).await?;
        let user = body
            .get("user")
            .cloned()
            .ok_or(WebApiError::MissingField { method: METHOD, field: "user" })?;
        let user: UserInfo = serde_json::from_value(user)
            .map_err(|_| WebApiError::MissingField { method: METHOD, field: "user.name" })?;
        Ok(display_name(user))
    }

    /// Workflow messages may target a bare user id; those go to the user's DM.
    async fn resolve_channel(&self, channel: &str) -> Result<String, WebApiError> {
        if channel.starts_with('U') || channel.starts_with('W') {
            return self.open_direct_message(channel).await;
        }
        Ok(channel.to_owned())
    }

    async fn call(&self, method: &'static str, body: Value) -> Result<Value, WebApiError> {
        debug!(event_name = "egress.slack.web_api", method, "calling slack web api");
        let envelope: ApiEnvelope = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        interpret(method, envelope)
    }
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        template: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        SlackWebClient::post_message(self, channel, template).await.map_err(DeliveryError::from)
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user_id: &str,
        template: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        SlackWebClient::post_ephemeral(self, channel, user_id, template)
            .await
            .map_err(DeliveryError::from)
    }
}

fn message_body(channel: &str, user_id: Option<&str>, template: &MessageTemplate) -> Value {
    let mut body = json!({
        "channel": channel,
        "text": template.fallback_text,
        "blocks": template.blocks,
    });
    if let Some(user_id) = user_id {
        body["user"] = Value::String(user_id.to_owned());
    }
    body
}

fn interpret(method: &'static str, envelope: ApiEnvelope) -> Result<Value, WebApiError> {
    if envelope.ok {
        return Ok(envelope.body);
    }
    let error = envelope.error.unwrap_or_else(|| "unknown_error".to_owned());
    warn!(event_name = "egress.slack.web_api_error", method, error = %error, "slack api error");
    Err(WebApiError::Api { method, error })
}

fn display_name(user: UserInfo) -> String {
    let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    non_empty(user.profile.display_name).or_else(|| non_empty(user.real_name)).unwrap_or(user.name)
}
