//! Mailbox crate - Gmail state reconciliation for the brokerage inbox
//!
//! This crate provides:
//! - Domain models (Thread, Message, Label, EmailAddress)
//! - A blocking Gmail REST client and payload decoding
//! - OAuth token brokering with listener fan-out
//! - The mailbox state machine (connect, load, actions, sync)
//! - Compose, reply and forward derivation and MIME serialization
//!
//! It has no UI dependencies; views read [`MailboxState`] snapshots and
//! receive [`Notice`]s through a [`Notifier`].

pub mod auth;
pub mod compose;
pub mod config;
pub mod error;
pub mod gmail;
pub mod mailbox;
pub mod models;

pub use auth::{Prompt, StoredTokenSource, Subscription, Token, TokenBroker, TokenProvider, TokenSource};
pub use compose::{
    ComposeContext, ComposeDraft, ComposeMode, EncodedMessage, OutgoingAttachment,
    OutgoingMessage, SendPath, build_mime_message,
};
pub use crate::config::{GmailCredentials, MailboxSettings};
pub use error::{MailError, Result};
pub use gmail::{GmailClient, MailApi, SendOptions, ThreadQuery, normalize_thread};
pub use mailbox::{
    HttpSyncTrigger, LoadOutcome, LogNotifier, Mailbox, MailboxState, Notice, NoticeLevel,
    Notifier, Phase, SyncJob, SyncTrigger, ThreadAction,
};
pub use models::{
    Attachment, EmailAddress, Label, LabelId, LabelKind, Message, MessageId, Profile, Thread,
    ThreadId,
};
