//! chatrelay – command-line chat client.
//!
//! Talks to a running chatrelay-server. Every command first loads the
//! transcript from the relay so ids refer to the backend's messages.

use std::io::Write;

use anyhow::Context;
use chatrelay_core::{
    render_widget, ChatClient, ChatContext, ChatMessage, ChatSession, MessageContent, MessageId,
    Sender, StreamPhase, WidgetOptions,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "chatrelay", version, about = "Chat with the backend through chatrelay-server")]
struct Cli {
    /// Base URL of the relay.
    #[arg(long, env = "CHATRELAY_URL", default_value = "http://localhost:3000")]
    relay_url: String,

    /// `tracing` filter for diagnostics on stderr.
    #[arg(long, env = "CHATRELAY_CLI_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the transcript.
    List,
    /// Send a message and stream the reply.
    Send { text: String },
    /// Replace a message's text and stream the regenerated reply.
    Edit {
        #[arg(long)]
        id: Option<String>,
        text: String,
    },
    /// Delete a message.
    Delete {
        #[arg(long)]
        id: Option<String>,
    },
    /// Render the transcript as widget HTML.
    Widget {
        #[arg(long, default_value = "Onboarding")]
        context: String,
        #[arg(long)]
        full_screen: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_new(&cli.log)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut session = ChatSession::new(ChatClient::new(cli.relay_url.clone()));
    session
        .refresh()
        .await
        .with_context(|| format!("failed to load messages from {}", cli.relay_url))?;

    match cli.command {
        Command::List => print_transcript(session.messages()),
        Command::Send { text } => {
            let phase = session.send(&text, print_delta).await?;
            finish_stream(phase);
        }
        Command::Edit { id, text } => {
            let id = parse_id(id.as_deref())?;
            let phase = session.edit(id, &text, print_delta).await?;
            finish_stream(phase);
        }
        Command::Delete { id } => {
            let id = parse_id(id.as_deref())?;
            session.delete(id).await?;
            info!(remaining = session.messages().len(), "message deleted");
            print_transcript(session.messages());
        }
        Command::Widget { context, full_screen } => {
            let context = ChatContext::from_name(&context);
            let options = WidgetOptions { context, full_screen, ..Default::default() };
            println!("{}", render_widget(session.messages(), &context.palette(), &options)?);
        }
    }
    Ok(())
}

/// `None` stays `None` so the session reports the missing id itself.
fn parse_id(raw: Option<&str>) -> anyhow::Result<Option<MessageId>> {
    match raw {
        None => Ok(None),
        Some(raw) => Ok(Some(MessageId::parse_required(Some(raw))?)),
    }
}

fn print_delta(delta: &str) {
    print!("{delta}");
    let _ = std::io::stdout().flush();
}

fn finish_stream(phase: StreamPhase) {
    println!();
    if phase != StreamPhase::Done {
        warn!(?phase, "reply stream did not complete");
    }
}

fn print_transcript(messages: &[ChatMessage]) {
    for m in messages {
        let who = match m.sender {
            Sender::User => "you",
            Sender::Bot => "bot",
        };
        match &m.content {
            MessageContent::Text(text) => println!("[{}] {who}: {text}", m.id),
            MessageContent::Structured(value) => println!("[{}] {who}: {value}", m.id),
        }
    }
}
