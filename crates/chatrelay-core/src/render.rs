//! Chat widget markup.
//!
//! The colour palette is an argument, not ambient state: callers derive it
//! from the selected [`ChatContext`] (or build one by hand) and pass it in.

use chatrelay_types::{ChatContext, ChatMessage, MessageContent, Palette};
use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::ChatError;

const WIDGET_TEMPLATE: &str = include_str!("../templates/widget.html");

/// Non-colour settings for the widget.
#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub assistant_name: String,
    pub tagline: String,
    /// Context shown as selected in the context picker.
    pub context: ChatContext,
    pub full_screen: bool,
    /// Quick-action buttons shown under the transcript.
    pub actions: Vec<String>,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            assistant_name: "Ava".into(),
            tagline: "Ask me anything or pick a place to start".into(),
            context: ChatContext::default(),
            full_screen: false,
            actions: vec!["Create Report this month".into(), "Call Lead".into()],
        }
    }
}

#[derive(Serialize)]
struct MessageView<'a> {
    id: String,
    is_bot: bool,
    text: Option<&'a str>,
    structured: Option<String>,
}

#[derive(Serialize)]
struct ContextOption {
    name: &'static str,
    palette: Palette,
    selected: bool,
}

impl<'a> From<&'a ChatMessage> for MessageView<'a> {
    fn from(m: &'a ChatMessage) -> Self {
        let structured = match &m.content {
            MessageContent::Structured(v) => {
                Some(serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
            }
            MessageContent::Text(_) => None,
        };
        Self { id: m.id.to_string(), is_bot: m.is_bot(), text: m.text(), structured }
    }
}

/// Render the widget for `messages` as an HTML fragment. All message text is
/// HTML-escaped.
pub fn render_widget(
    messages: &[ChatMessage],
    palette: &Palette,
    options: &WidgetOptions,
) -> Result<String, ChatError> {
    let mut env = Environment::new();
    env.add_template("widget.html", WIDGET_TEMPLATE)?;

    let messages: Vec<MessageView<'_>> = messages.iter().map(MessageView::from).collect();
    let contexts: Vec<ContextOption> = ChatContext::SELECTABLE
        .iter()
        .map(|&ctx| ContextOption {
            name: ctx.into(),
            palette: ctx.palette(),
            selected: ctx == options.context,
        })
        .collect();

    let html = env.get_template("widget.html")?.render(context! {
        messages,
        palette,
        contexts,
        assistant_name => &options.assistant_name,
        tagline => &options.tagline,
        full_screen => options.full_screen,
        actions => &options.actions,
    })?;
    Ok(html)
}
