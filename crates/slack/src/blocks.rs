use chrono::NaiveDate;
use serde::Serialize;

pub const DUE_DATE_ACTION_ID: &str = "borrow.due_date.v1";
pub const HELP_ACTION_ID: &str = "borrow.help.v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatePickerElement {
    pub action_id: String,
    /// Rendered by Slack as `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
}

impl DatePickerElement {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), initial_date: None, placeholder: None }
    }

    pub fn initial_date(mut self, date: NaiveDate) -> Self {
        self.initial_date = Some(date.format("%Y-%m-%d").to_string());
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(TextObject::plain(text));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
    #[serde(rename = "datepicker")]
    DatePicker(DatePickerElement),
}

impl ActionElement {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.action_id,
            Self::DatePicker(picker) => &picker.action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ActionElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

/// Where a rendered message goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Channel(String),
    /// Visible only to `user_id` inside `channel`.
    Ephemeral { channel: String, user_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub delivery: Delivery,
    pub template: MessageTemplate,
}

impl Reply {
    pub fn to_channel(channel: impl Into<String>, template: MessageTemplate) -> Self {
        Self { delivery: Delivery::Channel(channel.into()), template }
    }

    pub fn ephemeral(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        template: MessageTemplate,
    ) -> Self {
        Self {
            delivery: Delivery::Ephemeral { channel: channel.into(), user_id: user_id.into() },
            template,
        }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.elements });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.elements });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    pub fn date_picker(&mut self, picker: DatePickerElement) -> &mut Self {
        self.elements.push(ActionElement::DatePicker(picker));
        self
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }
}

/// Single mrkdwn section; what most conversation replies look like.
pub fn text_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text)
        .section("borrow.reply.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn due_date_picker_message(prompt: &str, initial_date: NaiveDate) -> MessageTemplate {
    MessageBuilder::new(format!("{prompt} (reply with YYYY-MM-DD if the picker is unavailable)"))
        .section("borrow.due_date.prompt.v1", |section| {
            section.mrkdwn(prompt);
        })
        .actions("borrow.due_date.actions.v1", |actions| {
            actions.date_picker(
                DatePickerElement::new(DUE_DATE_ACTION_ID)
                    .initial_date(initial_date)
                    .placeholder("Select a due date"),
            );
        })
        .build()
}

pub fn start_ack_message() -> MessageTemplate {
    text_message("Got it! I'll DM you to finish your borrow request.")
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("borrow.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("borrow.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Borrow command help")
        .section("borrow.help.summary.v1", |section| {
            section.mrkdwn(
                "*Available commands*\n\
                 • `/borrow` or `/borrow start` to begin a request in a DM\n\
                 • `/borrow search <item>, <item>` to look items up\n\
                 • `/borrow cancel` to drop the request in progress\n\
                 • `/borrow help`",
            );
        })
        .build()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRow {
    pub name: String,
    pub on_hand: u64,
}

pub fn search_results_message(queries: &[String], rows: &[SearchRow]) -> MessageTemplate {
    let asked = queries.join(", ");
    if rows.is_empty() {
        return MessageBuilder::new(format!("No catalog items match {asked}"))
            .section("borrow.search.empty.v1", |section| {
                section.mrkdwn(format!("No catalog items match `{asked}`."));
            })
            .build();
    }

    let lines = rows
        .iter()
        .map(|row| format!("• *{}*: {} on hand", row.name, row.on_hand))
        .collect::<Vec<_>>()
        .join("\n");
    MessageBuilder::new(format!("{} catalog matches for {asked}", rows.len()))
        .section("borrow.search.results.v1", |section| {
            section.mrkdwn(format!("*Matches for* `{asked}`\n{lines}"));
        })
        .context("borrow.search.hint.v1", |context| {
            context.plain("Send me the exact item name in a DM to borrow it.");
        })
        .build()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        due_date_picker_message, error_message, search_results_message, ActionElement, Block,
        ButtonElement, MessageBuilder, SearchRow, TextObject, DUE_DATE_ACTION_ID,
    };

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("borrow.summary.v1", |section| {
                section.mrkdwn("*Borrow summary*");
            })
            .actions("borrow.summary.actions.v1", |actions| {
                actions.button(ButtonElement::new(super::HELP_ACTION_ID, "Help"));
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, text: TextObject::Mrkdwn { .. } }
                if block_id == "borrow.summary.v1"
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Actions { elements, .. } if elements.len() == 1
        ));
    }

    #[test]
    fn date_picker_serializes_as_slack_block_kit() {
        let today = NaiveDate::from_ymd_opt(2030, 3, 1).expect("date");
        let message = due_date_picker_message("Pick a due date.", today);

        let Block::Actions { elements, .. } = &message.blocks[1] else {
            panic!("expected actions block, got {:?}", message.blocks[1]);
        };
        assert!(matches!(&elements[0], ActionElement::DatePicker(_)));
        assert_eq!(elements[0].action_id(), DUE_DATE_ACTION_ID);

        let json = serde_json::to_value(&message.blocks).expect("serialize blocks");
        assert_eq!(json[1]["elements"][0]["type"], "datepicker");
        assert_eq!(json[1]["elements"][0]["initial_date"], "2030-03-01");
        assert_eq!(json[1]["elements"][0]["placeholder"]["type"], "plain_text");
        assert_eq!(json[0]["text"]["type"], "mrkdwn");
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message = error_message("Cannot process request", "req-123");

        let Block::Context { elements, .. } = &message.blocks[1] else {
            panic!("expected context block");
        };
        assert!(matches!(
            elements.first(),
            Some(TextObject::Plain { text }) if text.contains("req-123")
        ));
    }

    #[test]
    fn search_results_list_every_row() {
        let rows = vec![
            SearchRow { name: "Beaker".to_owned(), on_hand: 10 },
            SearchRow { name: "Pipette".to_owned(), on_hand: 25 },
        ];

        let message = search_results_message(&["beakr".to_owned(), "pipete".to_owned()], &rows);

        assert!(message.fallback_text.starts_with("2 catalog matches"));
        assert!(matches!(
            &message.blocks[0],
            Block::Section { text: TextObject::Mrkdwn { text }, .. }
                if text.contains("*Beaker*: 10 on hand") && text.contains("*Pipette*: 25 on hand")
        ));
    }

    #[test]
    fn empty_search_says_so() {
        let message = search_results_message(&["centrifuge".to_owned()], &[]);

        assert_eq!(message.blocks.len(), 1);
        assert!(message.fallback_text.contains("centrifuge"));
    }
}
