//! Command execution and terminal rendering

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local, Utc};
use mailbox::compose::{ComposeContext, ComposeDraft, ComposeMode, OutgoingAttachment};
use mailbox::mailbox::{MailboxState, Notice, NoticeLevel, Notifier, Phase, ThreadAction};
use mailbox::{Mailbox, Message, Thread};

use crate::{Command, RespondArgs, SendArgs};

/// Prints notices to stderr
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

pub fn run(mailbox: &Mailbox, command: Command, json: bool) -> Result<()> {
    let state = mailbox.snapshot();
    if state.phase != Phase::Ready {
        let reason = state
            .placeholder
            .unwrap_or_else(|| format!("Mailbox is {:?}", state.phase));
        bail!(reason);
    }

    match command {
        Command::List => print_threads(&mailbox.snapshot(), json)?,
        Command::Show { thread } => {
            let thread = mailbox
                .select_thread(&thread)
                .ok_or_else(|| anyhow!("Thread {} is not in the current list", thread))?;
            print_thread(&thread);
        }
        Command::Read { thread } => mailbox.run_thread_action(&thread, ThreadAction::MarkRead)?,
        Command::Unread { thread } => mailbox.run_thread_action(&thread, ThreadAction::MarkUnread)?,
        Command::Star { thread } => mailbox.run_thread_action(&thread, ThreadAction::Star)?,
        Command::Unstar { thread } => mailbox.run_thread_action(&thread, ThreadAction::Unstar)?,
        Command::Archive { thread } => mailbox.run_thread_action(&thread, ThreadAction::Archive)?,
        Command::Spam { thread } => mailbox.run_thread_action(&thread, ThreadAction::Spam)?,
        Command::Trash { thread } => mailbox.run_thread_action(&thread, ThreadAction::Trash)?,
        Command::Move { thread, label } => {
            let action = state
                .find_label(&label)
                .map(ThreadAction::move_to)
                .ok_or_else(|| anyhow!("No user label named {}", label))?;
            mailbox.run_thread_action(&thread, action)?;
        }
        Command::Labels => {
            for label in &state.labels {
                println!("{:<24} {}", label.id.as_str(), label.name);
            }
        }
        Command::Send(args) => send(mailbox, args)?,
        Command::Reply(args) => respond(mailbox, ComposeMode::Reply, args)?,
        Command::ReplyAll(args) => respond(mailbox, ComposeMode::ReplyAll, args)?,
        Command::Forward(args) => respond(mailbox, ComposeMode::Forward, args)?,
        Command::Attachment {
            message,
            attachment,
            out,
        } => save_attachment(mailbox, &state, &message, &attachment, out)?,
        Command::Sync => {
            mailbox.handle_sync()?;
            println!("{}", mailbox.snapshot().sync_status);
        }
    }
    Ok(())
}

fn load_attachments(paths: &[PathBuf]) -> Result<Vec<OutgoingAttachment>> {
    paths
        .iter()
        .map(|path| {
            OutgoingAttachment::from_path(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))
        })
        .collect()
}

fn send(mailbox: &Mailbox, args: SendArgs) -> Result<()> {
    let attachments = load_attachments(&args.attachments)?;
    mailbox.open_compose(ComposeContext::new_message());
    let draft = ComposeDraft {
        to: args.to,
        cc: args.cc,
        bcc: args.bcc,
        subject: args.subject,
        body: args.body,
        attachments,
    };
    let sent = mailbox.send_compose(&draft)?;
    println!("Sent {}", sent.id);
    Ok(())
}

fn respond(mailbox: &Mailbox, mode: ComposeMode, args: RespondArgs) -> Result<()> {
    let attachments = load_attachments(&args.attachments)?;
    let context = mailbox.reply_context(mode, &args.thread, args.message.as_deref())?;
    let mut draft = mailbox.open_compose(context);

    if let Some(to) = args.to {
        draft.to = to;
    }
    if let Some(cc) = args.cc {
        draft.cc = cc;
    }
    if !args.body.is_empty() {
        draft.body = format!("{}\n{}", args.body, draft.body);
    }
    draft.attachments = attachments;

    if draft.to.trim().is_empty() {
        mailbox.close_compose();
        bail!("{} needs --to", mode.title());
    }
    let sent = mailbox.send_compose(&draft)?;
    println!("Sent {}", sent.id);
    Ok(())
}

fn save_attachment(
    mailbox: &Mailbox,
    state: &MailboxState,
    message_id: &str,
    wanted: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let message = state
        .threads
        .iter()
        .find_map(|t| t.find_message(message_id))
        .ok_or_else(|| anyhow!("Message {} is not in the current list", message_id))?;
    let attachment = message
        .attachments
        .iter()
        .find(|a| a.attachment_id == wanted || a.filename == wanted)
        .ok_or_else(|| anyhow!("Message {} has no attachment {}", message_id, wanted))?;

    let bytes = mailbox.download_attachment(message_id, attachment)?;
    let path = out.unwrap_or_else(|| PathBuf::from(&attachment.filename));
    fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn local_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.with_timezone(&Local).format("%b %-d %H:%M").to_string())
        .unwrap_or_default()
}

fn print_threads(state: &MailboxState, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(state).context("Failed to serialize mailbox state")?
        );
        return Ok(());
    }
    if let Some(placeholder) = &state.placeholder {
        println!("{}", placeholder);
        return Ok(());
    }

    let selected = state.selected_thread_id.as_ref();
    for thread in &state.threads {
        let last = thread.last_message();
        println!(
            "{}{}{} {:<18} {:<13} {:<28} {}",
            if selected == Some(&thread.id) { ">" } else { " " },
            if thread.is_unread() { "*" } else { " " },
            if thread.is_starred() { "★" } else { " " },
            thread.id.as_str(),
            local_date(last.date),
            truncate(last.sender().label(), 28),
            thread.subject
        );
    }
    Ok(())
}

fn print_thread(thread: &Thread) {
    println!("{}", thread.subject);
    for message in thread.messages() {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    println!("\n--- {} ---", message.id.as_str());
    println!("From: {}", message.from);
    if !message.to.is_empty() {
        println!("To: {}", message.to);
    }
    if !message.cc.is_empty() {
        println!("Cc: {}", message.cc);
    }
    println!("Date: {}", local_date(message.date));
    for attachment in &message.attachments {
        println!(
            "Attachment: {} ({}, {} bytes)",
            attachment.filename, attachment.mime_type, attachment.size
        );
    }
    println!("\n{}", message.plain_text().trim_end());
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
