use async_trait::async_trait;
use thiserror::Error;

use crate::blocks::{self, MessageTemplate, Reply};

pub const BORROW_COMMAND: &str = "/borrow";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

/// A `/borrow` invocation with its verb split off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub verb: String,
    pub args: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BorrowCommand {
    Start,
    Search { queries: Vec<String> },
    Cancel,
    Help,
    Unknown { verb: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn normalize_borrow_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command != BORROW_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let text = payload.text.trim();
    let (verb, args) = match text.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (text, ""),
    };

    Ok(CommandEnvelope {
        verb: verb.to_ascii_lowercase(),
        args: args.to_owned(),
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        trigger_ts: payload.trigger_ts,
        request_id: payload.request_id,
    })
}

/// A bare `/borrow` starts a request, same as `/borrow start`.
pub fn classify_borrow_command(verb: &str, args: &str) -> BorrowCommand {
    match verb {
        "" | "start" => BorrowCommand::Start,
        "search" => BorrowCommand::Search {
            queries: args
                .split(',')
                .map(str::trim)
                .filter(|query| !query.is_empty())
                .map(str::to_owned)
                .collect(),
        },
        "cancel" => BorrowCommand::Cancel,
        "help" => BorrowCommand::Help,
        other => BorrowCommand::Unknown { verb: other.to_owned() },
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: BorrowCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(&self, envelope: CommandEnvelope) -> Result<Vec<Reply>, CommandRouteError> {
        let ephemeral = |template: MessageTemplate| {
            Reply::ephemeral(&envelope.channel_id, &envelope.user_id, template)
        };
        match classify_borrow_command(&envelope.verb, &envelope.args) {
            BorrowCommand::Start => self.service.start_borrow(&envelope).await,
            BorrowCommand::Search { queries } if queries.is_empty() => {
                Ok(vec![ephemeral(blocks::error_message(
                    "Tell me what to look for, e.g. `/borrow search beaker, pipette`.",
                    &envelope.request_id,
                ))])
            }
            BorrowCommand::Search { queries } => {
                self.service.search_catalog(queries, &envelope).await
            }
            BorrowCommand::Cancel => self.service.cancel_borrow(&envelope).await,
            BorrowCommand::Help => Ok(vec![ephemeral(blocks::help_message())]),
            BorrowCommand::Unknown { verb } => Ok(vec![ephemeral(blocks::error_message(
                &format!("Unsupported command `/borrow {verb}`. Try `/borrow help`."),
                &envelope.request_id,
            ))]),
        }
    }
}

#[async_trait]
pub trait BorrowCommandService: Send + Sync {
    async fn start_borrow(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError>;

    async fn search_catalog(
        &self,
        queries: Vec<String>,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError>;

    async fn cancel_borrow(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError>;
}

/// Acknowledges every command without touching any state.
#[derive(Default)]
pub struct NoopBorrowCommandService;

#[async_trait]
impl BorrowCommandService for NoopBorrowCommandService {
    async fn start_borrow(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError> {
        Ok(vec![Reply::ephemeral(
            &envelope.channel_id,
            &envelope.user_id,
            blocks::start_ack_message(),
        )])
    }

    async fn search_catalog(
        &self,
        queries: Vec<String>,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError> {
        Ok(vec![Reply::ephemeral(
            &envelope.channel_id,
            &envelope.user_id,
            blocks::search_results_message(&queries, &[]),
        )])
    }

    async fn cancel_borrow(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<Vec<Reply>, CommandRouteError> {
        Ok(vec![Reply::ephemeral(
            &envelope.channel_id,
            &envelope.user_id,
            blocks::text_message("Nothing to cancel."),
        )])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{
        classify_borrow_command, normalize_borrow_command, BorrowCommand, BorrowCommandService,
        CommandEnvelope, CommandParseError, CommandRouteError, CommandRouter,
        NoopBorrowCommandService, SlashCommandPayload,
    };
    use crate::blocks::{self, Delivery, Reply};

    fn payload(command: &str, text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_ts: "1730000000.0001".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    fn envelope(text: &str) -> CommandEnvelope {
        normalize_borrow_command(payload("/borrow", text)).expect("normalize")
    }

    #[test]
    fn classifies_known_verbs() {
        assert_eq!(classify_borrow_command("", ""), BorrowCommand::Start);
        assert_eq!(classify_borrow_command("start", ""), BorrowCommand::Start);
        assert_eq!(classify_borrow_command("cancel", ""), BorrowCommand::Cancel);
        assert_eq!(classify_borrow_command("help", ""), BorrowCommand::Help);
        assert_eq!(
            classify_borrow_command("search", "beaker,  pipette ,"),
            BorrowCommand::Search { queries: vec!["beaker".to_owned(), "pipette".to_owned()] }
        );
        assert_eq!(
            classify_borrow_command("return", "beaker"),
            BorrowCommand::Unknown { verb: "return".to_owned() }
        );
    }

    #[test]
    fn normalize_splits_verb_and_rejects_other_commands() {
        let normalized = envelope("  SEARCH  Bunsen Burner, flask ");
        assert_eq!(normalized.verb, "search");
        assert_eq!(normalized.args, "Bunsen Burner, flask");

        assert_eq!(
            normalize_borrow_command(payload("/deploy", "new")),
            Err(CommandParseError::UnsupportedCommand("/deploy".to_owned()))
        );
    }

    #[tokio::test]
    async fn help_and_unknown_are_answered_without_the_service() {
        let router = CommandRouter::new(NoopBorrowCommandService);

        let help = router.route(envelope("help")).await.expect("help");
        let unknown = router.route(envelope("dance")).await.expect("unknown");

        assert_eq!(help, vec![Reply::ephemeral("C1", "U1", blocks::help_message())]);
        assert!(unknown[0].template.fallback_text.contains("/borrow dance"));
        assert!(matches!(unknown[0].delivery, Delivery::Ephemeral { .. }));
    }

    #[derive(Default)]
    struct RecordingService {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingService {
        fn record(&self, call: String) -> Result<Vec<Reply>, CommandRouteError> {
            let mut calls =
                self.calls.lock().map_err(|_| CommandRouteError::Service("poisoned".into()))?;
            calls.push(call);
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl BorrowCommandService for RecordingService {
        async fn start_borrow(
            &self,
            envelope: &CommandEnvelope,
        ) -> Result<Vec<Reply>, CommandRouteError> {
            self.record(format!("start:{}", envelope.channel_id))
        }

        async fn search_catalog(
            &self,
            queries: Vec<String>,
            _envelope: &CommandEnvelope,
        ) -> Result<Vec<Reply>, CommandRouteError> {
            self.record(format!("search:{}", queries.join("|")))
        }

        async fn cancel_borrow(
            &self,
            envelope: &CommandEnvelope,
        ) -> Result<Vec<Reply>, CommandRouteError> {
            self.record(format!("cancel:{}", envelope.user_id))
        }
    }

    #[tokio::test]
    async fn router_calls_service_entrypoints() {
        let service = RecordingService::default();
        let calls = Arc::clone(&service.calls);
        let router = CommandRouter::new(service);

        for text in ["", "start", "search beaker, flask", "cancel", "search  "] {
            router.route(envelope(text)).await.expect("route");
        }

        let calls = calls.lock().expect("calls").clone();
        assert_eq!(calls, vec!["start:C1", "start:C1", "search:beaker|flask", "cancel:U1"]);
    }
}
