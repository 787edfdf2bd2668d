//! Mailbox view state

use serde::Serialize;

use crate::models::{Label, Profile, Thread, ThreadId};

pub const PLACEHOLDER_DISCONNECTED: &str = "Connect your Gmail account to load messages.";
pub const PLACEHOLDER_EMPTY: &str = "Your inbox is empty.";
pub const PLACEHOLDER_LOAD_FAILED: &str = "Unable to load messages. Try reconnecting Gmail.";

/// Connection lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No usable token
    #[default]
    Disconnected,
    /// Profile, labels and the first thread page are loading
    Initializing,
    /// A load has completed; refreshes keep this phase
    Ready,
    /// The initial load failed; only a refresh or reconnect recovers
    Failed,
}

/// Snapshot handed to the view layer.
///
/// Threads are newest-first. `selected_thread_id` is only an id: resolve it
/// with [`MailboxState::selected_thread`] on every read.
#[derive(Debug, Clone, Serialize)]
pub struct MailboxState {
    pub phase: Phase,
    pub threads: Vec<Thread>,
    pub selected_thread_id: Option<ThreadId>,
    /// User-created labels only
    pub labels: Vec<Label>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub syncing: bool,
    pub sync_status: String,
    /// Text shown in place of the thread list, if any
    pub placeholder: Option<String>,
}

impl Default for MailboxState {
    fn default() -> Self {
        Self {
            phase: Phase::Disconnected,
            threads: Vec::new(),
            selected_thread_id: None,
            labels: Vec::new(),
            profile: None,
            loading: false,
            syncing: false,
            sync_status: String::new(),
            placeholder: Some(PLACEHOLDER_DISCONNECTED.to_string()),
        }
    }
}

impl MailboxState {
    pub fn find_thread(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id.as_str() == id)
    }

    /// The selected thread, if it is still in the list
    pub fn selected_thread(&self) -> Option<&Thread> {
        self.selected_thread_id
            .as_ref()
            .and_then(|id| self.find_thread(id.as_str()))
    }

    pub fn own_email(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.email_address.as_str())
    }

    /// User labels a thread could be moved to (those it does not carry yet)
    pub fn move_targets(&self, thread: &Thread) -> Vec<&Label> {
        let current = thread.label_ids();
        self.labels
            .iter()
            .filter(|l| !current.contains(l.id.as_str()))
            .collect()
    }

    pub fn find_label(&self, id_or_name: &str) -> Option<&Label> {
        self.labels
            .iter()
            .find(|l| l.id.as_str() == id_or_name)
            .or_else(|| {
                self.labels
                    .iter()
                    .find(|l| l.name.eq_ignore_ascii_case(id_or_name))
            })
    }

    /// Replace the thread list, applying the selection rule: keep the
    /// previous selection if asked to and it still exists, else the first
    /// thread, else nothing.
    pub(crate) fn replace_threads(&mut self, threads: Vec<Thread>, preserve_selection: bool) {
        let previous = self
            .selected_thread_id
            .take()
            .filter(|_| preserve_selection)
            .filter(|id| threads.iter().any(|t| &t.id == id));

        self.selected_thread_id = previous.or_else(|| threads.first().map(|t| t.id.clone()));
        self.placeholder = threads
            .is_empty()
            .then(|| PLACEHOLDER_EMPTY.to_string());
        self.threads = threads;
    }
}
