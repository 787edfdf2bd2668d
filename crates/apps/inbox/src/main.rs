//! Inbox - terminal front-end for the brokerage Gmail mailbox
//!
//! Each invocation connects, runs one command against the mailbox and
//! prints the resulting state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use mailbox::mailbox::{HttpSyncTrigger, LogNotifier, Notifier};
use mailbox::{
    GmailClient, GmailCredentials, Mailbox, MailboxSettings, Prompt, StoredTokenSource, Token,
    TokenBroker, TokenProvider,
};

mod commands;

use commands::ConsoleNotifier;

#[derive(Debug, Parser)]
#[command(name = "inbox", version, about = "Gmail inbox for the brokerage desk")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Label to list instead of the configured one
    #[arg(long, global = true)]
    label: Option<String>,

    /// Thread page size
    #[arg(long, global = true)]
    max_results: Option<u32>,

    /// Print state as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Send notices to the log only
    #[arg(long, global = true)]
    quiet: bool,

    /// Access token to use instead of the stored one
    #[arg(long, env = "GMAIL_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List threads, newest first
    List,
    /// Show every message in a thread
    Show { thread: String },
    /// Mark a thread read
    Read { thread: String },
    /// Mark a thread unread
    Unread { thread: String },
    Star { thread: String },
    Unstar { thread: String },
    /// Remove a thread from the inbox
    Archive { thread: String },
    Spam { thread: String },
    Trash { thread: String },
    /// Move a thread to a user label (id or name)
    Move { thread: String, label: String },
    /// List user labels
    Labels,
    /// Compose and send a new message
    Send(SendArgs),
    /// Reply to the sender
    Reply(RespondArgs),
    /// Reply to the sender and every other recipient
    ReplyAll(RespondArgs),
    /// Forward a message
    Forward(RespondArgs),
    /// Save an attachment (filename or attachment id)
    Attachment {
        message: String,
        attachment: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ask the backend to clean up and sync the mailbox
    Sync,
}

#[derive(Debug, Args)]
struct SendArgs {
    #[arg(long, required = true)]
    to: String,
    #[arg(long, default_value = "")]
    cc: String,
    #[arg(long, default_value = "")]
    bcc: String,
    #[arg(long, default_value = "")]
    subject: String,
    #[arg(long, default_value = "")]
    body: String,
    /// File to attach; repeatable
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct RespondArgs {
    thread: String,
    /// Message to respond to; defaults to the latest in the thread
    #[arg(long)]
    message: Option<String>,
    /// Recipients; replaces the derived ones
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    cc: Option<String>,
    /// Text placed above the quoted message
    #[arg(long, default_value = "")]
    body: String,
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let mut settings = MailboxSettings::load()?;
    if let Some(label) = &cli.label {
        settings.label = label.clone();
    }
    if let Some(max) = cli.max_results {
        settings.max_results = max;
    }

    let credentials = match GmailCredentials::load() {
        Ok(creds) => Some(creds),
        Err(e) => {
            warn!("Gmail credentials not found; stored tokens cannot be refreshed: {}", e);
            None
        }
    };
    let source = StoredTokenSource::new(credentials).context("Failed to locate token store")?;
    let broker = Arc::new(TokenBroker::new(source));

    let notifier: Arc<dyn Notifier> = if cli.quiet {
        Arc::new(LogNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    };
    let client = GmailClient::with_base_url(broker.clone(), settings.gmail_base_url.as_str());
    let mut mailbox = Mailbox::new(Arc::new(client), broker.clone(), notifier, settings.clone());
    if let Some(api_base_url) = settings.api_base_url.as_deref() {
        mailbox = mailbox.with_sync_trigger(Arc::new(HttpSyncTrigger::new(api_base_url)));
    }
    let mailbox = Arc::new(mailbox);

    // Every new token (re)connects the mailbox
    let _subscription = mailbox.watch_tokens();

    match &cli.access_token {
        Some(access_token) => broker.seed(Token::new(access_token.as_str())),
        None => {
            if let Err(e) = broker.request_token(Prompt::None) {
                warn!("No usable Gmail token: {}", e);
            }
        }
    }
    if broker.token().is_none() {
        // Leaves the mailbox in its disconnected state
        mailbox.connect()?;
    }

    info!("Mailbox phase: {:?}", mailbox.snapshot().phase);
    commands::run(&mailbox, cli.command, cli.json)
}
