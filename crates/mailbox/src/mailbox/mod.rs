//! Mailbox state machine and its collaborators
//!
//! `Mailbox` reconciles local thread state against Gmail: every mutation is
//! a single API call followed by a full reload.

mod actions;
mod machine;
mod notify;
mod state;
mod sync;

pub use actions::ThreadAction;
pub use machine::{LoadOutcome, Mailbox};
pub use notify::{LogNotifier, Notice, NoticeLevel, Notifier};
pub use state::{
    MailboxState, PLACEHOLDER_DISCONNECTED, PLACEHOLDER_EMPTY, PLACEHOLDER_LOAD_FAILED, Phase,
};
pub use sync::{HttpSyncTrigger, SyncJob, SyncTrigger};
