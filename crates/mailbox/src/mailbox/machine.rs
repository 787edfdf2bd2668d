//! The mailbox state machine
//!
//! Owns [`MailboxState`] and is the only writer to it. Every operation
//! blocks on network I/O, so view layers call it off their UI thread and
//! read [`Mailbox::snapshot`] to render.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::actions::ThreadAction;
use super::notify::{Notice, Notifier};
use super::state::{MailboxState, PLACEHOLDER_LOAD_FAILED, Phase};
use super::sync::{SyncJob, SyncTrigger};
use crate::auth::{Prompt, Subscription, TokenProvider};
use crate::compose::{
    ComposeContext, ComposeDraft, ComposeMode, OutgoingMessage, build_mime_message,
};
use crate::config::MailboxSettings;
use crate::error::{MailError, Result};
use crate::gmail::api::{GmailThread, SentMessage};
use crate::gmail::{MailApi, SendOptions, ThreadQuery, decode_attachment_data, normalize_thread};
use crate::models::{
    Attachment, Label, LabelId, LabelKind, Profile, Thread, sort_newest_first,
};

/// Result of a thread list load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Results were committed to state
    Loaded { threads: usize },
    /// A newer load or a disconnect happened first; results were discarded
    Superseded,
    /// No token; state was cleared
    Disconnected,
    /// Another connect is already running
    AlreadyRunning,
}

/// Clears an atomic flag when dropped
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct ComposeSession {
    id: u64,
    context: ComposeContext,
}

/// Mailbox state machine over a [`MailApi`]
pub struct Mailbox {
    api: Arc<dyn MailApi>,
    tokens: Arc<dyn TokenProvider>,
    notifier: Arc<dyn Notifier>,
    sync: Option<Arc<dyn SyncTrigger>>,
    settings: MailboxSettings,
    state: RwLock<MailboxState>,
    /// Bumped by every load and by disconnect; stale loads never commit
    generation: AtomicU64,
    initializing: AtomicBool,
    syncing: AtomicBool,
    compose: Mutex<Option<ComposeSession>>,
    next_compose_id: AtomicU64,
}

impl Mailbox {
    pub fn new(
        api: Arc<dyn MailApi>,
        tokens: Arc<dyn TokenProvider>,
        notifier: Arc<dyn Notifier>,
        settings: MailboxSettings,
    ) -> Self {
        Self {
            api,
            tokens,
            notifier,
            sync: None,
            settings,
            state: RwLock::new(MailboxState::default()),
            generation: AtomicU64::new(0),
            initializing: AtomicBool::new(false),
            syncing: AtomicBool::new(false),
            compose: Mutex::new(None),
            next_compose_id: AtomicU64::new(0),
        }
    }

    /// Enable [`Mailbox::handle_sync`]
    pub fn with_sync_trigger(mut self, trigger: Arc<dyn SyncTrigger>) -> Self {
        self.sync = Some(trigger);
        self
    }

    pub fn settings(&self) -> &MailboxSettings {
        &self.settings
    }

    /// Copy of the current state for rendering
    pub fn snapshot(&self) -> MailboxState {
        self.read_state().clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MailboxState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MailboxState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut MailboxState)) {
        f(&mut self.write_state());
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// Account address: profile first, then the token's owner
    fn own_email(&self) -> String {
        let from_profile = self.read_state().own_email().map(str::to_string);
        from_profile
            .or_else(|| self.tokens.token().and_then(|t| t.account_email))
            .unwrap_or_default()
    }

    // === Connection ===

    /// Load profile, labels and the first thread page, in that order.
    ///
    /// Profile and label failures are logged and tolerated. A second call
    /// while one is running returns [`LoadOutcome::AlreadyRunning`].
    pub fn connect(&self) -> Result<LoadOutcome> {
        if self.tokens.token().is_none() {
            self.disconnect();
            return Ok(LoadOutcome::Disconnected);
        }
        let Some(_initializing) = FlagGuard::try_acquire(&self.initializing) else {
            debug!("Mailbox initialization already in progress");
            return Ok(LoadOutcome::AlreadyRunning);
        };

        info!("Connecting mailbox");
        self.update(|s| {
            s.phase = Phase::Initializing;
            s.placeholder = None;
        });

        let profile = match self.api.get_profile() {
            Ok(p) => Some(Profile {
                email_address: p.email_address,
                messages_total: p.messages_total,
                threads_total: p.threads_total,
                history_id: p.history_id,
            }),
            Err(e) => {
                warn!("Failed to load Gmail profile: {}", e);
                None
            }
        };

        let labels = match self.api.list_labels() {
            Ok(labels) => labels
                .into_iter()
                .filter(|l| LabelKind::from_api(l.kind.as_deref()) == LabelKind::User)
                .map(|l| Label::user(l.id, l.name))
                .collect(),
            Err(e) => {
                warn!("Failed to load Gmail labels: {}", e);
                Vec::new()
            }
        };

        self.update(|s| {
            if profile.is_some() {
                s.profile = profile;
            }
            s.labels = labels;
        });

        self.load_threads(false)
    }

    /// Clear all state and forget the compose session. In-flight loads are
    /// discarded when they finish.
    pub fn disconnect(&self) {
        {
            let mut state = self.write_state();
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = MailboxState::default();
        }
        *self.compose.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Mailbox state cleared");
    }

    /// Keep the mailbox connected: every new token triggers [`Mailbox::connect`]
    pub fn watch_tokens(self: &Arc<Self>) -> Subscription {
        let mailbox = Arc::downgrade(self);
        self.tokens.subscribe(Box::new(move |_token| {
            if let Some(mailbox) = mailbox.upgrade()
                && let Err(e) = mailbox.connect()
            {
                warn!("Reconnect after new token failed: {}", e);
            }
        }))
    }

    /// Ask for a fresh token after a 401; false if none could be had
    fn reauthorize(&self) -> bool {
        info!("Gmail rejected the token; requesting a new one");
        match self.tokens.request_token(Prompt::None) {
            Ok(_) => true,
            Err(e) => {
                warn!("Re-authorization failed: {}", e);
                false
            }
        }
    }

    // === Threads ===

    /// Replace the thread list with a fresh page from Gmail.
    ///
    /// Details are fetched concurrently and joined all-or-nothing. Results
    /// are only committed if no newer load or disconnect started meanwhile.
    pub fn load_threads(&self, preserve_selection: bool) -> Result<LoadOutcome> {
        if self.tokens.token().is_none() {
            self.disconnect();
            return Ok(LoadOutcome::Disconnected);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|s| s.loading = true);

        let result = self.fetch_threads();

        let error = {
            let mut state = self.write_state();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding superseded thread load {}", generation);
                return Ok(LoadOutcome::Superseded);
            }
            state.loading = false;

            match result {
                Ok(threads) => {
                    let count = threads.len();
                    state.replace_threads(threads, preserve_selection);
                    state.phase = Phase::Ready;
                    info!("Loaded {} threads", count);
                    return Ok(LoadOutcome::Loaded { threads: count });
                }
                Err(e) => {
                    if state.phase != Phase::Ready {
                        state.phase = Phase::Failed;
                        state.threads.clear();
                        state.selected_thread_id = None;
                        state.placeholder = Some(PLACEHOLDER_LOAD_FAILED.to_string());
                    }
                    e
                }
            }
        };

        warn!("Unable to load messages: {}", error);
        self.notify(Notice::error(error.to_string()));
        if error.is_auth() && !self.reauthorize() {
            self.disconnect();
        }
        Err(error)
    }

    fn fetch_threads(&self) -> Result<Vec<Thread>> {
        let query = ThreadQuery::new()
            .label(self.settings.label.as_str())
            .max_results(self.settings.max_results);
        let page = self.api.list_threads(&query)?;
        if page.threads.is_empty() {
            return Ok(Vec::new());
        }

        let detail_query = ThreadQuery::new();
        let raw: Vec<GmailThread> = page
            .threads
            .par_iter()
            .map(|summary| self.api.get_thread(&summary.id, &detail_query))
            .collect::<Result<_>>()?;

        let mut threads: Vec<Thread> = raw.iter().filter_map(normalize_thread).collect();
        sort_newest_first(&mut threads);
        Ok(threads)
    }

    /// Select a thread by id, resolved against the current list
    pub fn select_thread(&self, id: &str) -> Option<Thread> {
        let mut state = self.write_state();
        let thread = state.find_thread(id).cloned()?;
        state.selected_thread_id = Some(thread.id.clone());
        Some(thread)
    }

    pub fn selected_thread(&self) -> Option<Thread> {
        self.read_state().selected_thread().cloned()
    }

    fn thread(&self, id: &str) -> Result<Thread> {
        self.read_state()
            .find_thread(id)
            .cloned()
            .ok_or_else(|| MailError::invalid_argument(format!("Unknown thread {}", id)))
    }

    // === Actions ===

    /// Apply `action`, then reload with the selection preserved.
    ///
    /// On failure the error is surfaced as a notice (after requesting a new
    /// token for a 401) and state is left as it was. Nothing is retried.
    pub fn run_thread_action(&self, thread_id: &str, action: ThreadAction) -> Result<()> {
        let message = action.success_message();
        self.mutate(message, || action.apply(self.api.as_ref(), thread_id))
    }

    pub fn toggle_read(&self, thread_id: &str) -> Result<()> {
        let action = ThreadAction::toggle_read(&self.thread(thread_id)?);
        self.run_thread_action(thread_id, action)
    }

    pub fn toggle_star(&self, thread_id: &str) -> Result<()> {
        let action = ThreadAction::toggle_star(&self.thread(thread_id)?);
        self.run_thread_action(thread_id, action)
    }

    /// Mark a single message read or unread
    pub fn set_message_read(&self, message_id: &str, read: bool) -> Result<()> {
        let (add, remove, message) = if read {
            (Vec::new(), vec![LabelId::UNREAD], "Marked as read")
        } else {
            (vec![LabelId::UNREAD], Vec::new(), "Marked as unread")
        };
        self.mutate(message.to_string(), || {
            self.api.modify_message(message_id, &add, &remove)
        })
    }

    fn mutate(&self, success: String, call: impl FnOnce() -> Result<()>) -> Result<()> {
        match call() {
            Ok(()) => {
                self.notify(Notice::info(success));
                if let Err(e) = self.load_threads(true) {
                    debug!("Reconcile after action failed: {}", e);
                }
                Ok(())
            }
            Err(e) => {
                self.surface_error(&e);
                Err(e)
            }
        }
    }

    fn surface_error(&self, error: &MailError) {
        warn!("Mailbox action failed: {}", error);
        if error.is_auth() {
            self.reauthorize();
        }
        self.notify(Notice::error(error.to_string()));
    }

    /// Download and decode an attachment
    pub fn download_attachment(&self, message_id: &str, attachment: &Attachment) -> Result<Vec<u8>> {
        match self.api.get_attachment(message_id, &attachment.attachment_id) {
            Ok(data) => {
                let bytes = decode_attachment_data(&data);
                debug!("Downloaded {} ({} bytes)", attachment.filename, bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                self.surface_error(&e);
                Err(e)
            }
        }
    }

    // === Sync ===

    /// Ask the backend to clean up and sync the mailbox, then reload.
    ///
    /// Rejected with [`MailError::SyncInFlight`] while a sync is running.
    pub fn handle_sync(&self) -> Result<SyncJob> {
        let Some(trigger) = self.sync.as_ref() else {
            self.notify(Notice::error("API base URL is not configured"));
            return Err(MailError::NotConfigured {
                what: "API base URL".to_string(),
            });
        };
        let Some(token) = self.tokens.token() else {
            self.notify(Notice::error("Connect Gmail before syncing"));
            return Err(MailError::missing_token());
        };
        let Some(_syncing) = FlagGuard::try_acquire(&self.syncing) else {
            debug!("Sync request ignored; one is already running");
            return Err(MailError::SyncInFlight);
        };

        self.update(|s| {
            s.syncing = true;
            s.sync_status = "Syncing mailbox…".to_string();
        });

        match trigger.trigger(Some(&token)) {
            Ok(job) => {
                let status = job.status_text();
                info!("Mailbox sync accepted: {}", status);
                self.update(|s| s.sync_status = status);
                self.notify(Notice::info("Mailbox sync triggered"));
                if let Err(e) = self.load_threads(true) {
                    debug!("Reload after sync failed: {}", e);
                }
                self.update(|s| s.syncing = false);
                Ok(job)
            }
            Err(e) => {
                self.update(|s| {
                    s.syncing = false;
                    s.sync_status = "Sync failed".to_string();
                });
                self.surface_error(&e);
                Err(e)
            }
        }
    }

    // === Compose ===

    /// Open a compose session and return its pre-filled form.
    ///
    /// Replaces any session already open.
    pub fn open_compose(&self, context: ComposeContext) -> ComposeDraft {
        let draft = context.derive_draft(&self.own_email());
        let id = self.next_compose_id.fetch_add(1, Ordering::SeqCst) + 1;
        *self.compose.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(ComposeSession { id, context });
        draft
    }

    pub fn compose_context(&self) -> Option<ComposeContext> {
        self.compose
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.context.clone())
    }

    pub fn close_compose(&self) {
        *self.compose.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Close the session only if it is still the one with `id`
    fn close_compose_session(&self, id: u64) {
        let mut compose = self.compose.lock().unwrap_or_else(PoisonError::into_inner);
        if compose.as_ref().is_some_and(|s| s.id == id) {
            *compose = None;
        }
    }

    /// Send the open compose session's draft.
    ///
    /// Messages with attachments go through a draft first. On success the
    /// session is closed and the thread list reloaded.
    pub fn send_compose(&self, draft: &ComposeDraft) -> Result<SentMessage> {
        let (session_id, context) = self
            .compose
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| (s.id, s.context.clone()))
            .ok_or(MailError::NoCompose)?;

        if self.tokens.token().is_none() {
            self.notify(Notice::error("Connect Gmail before sending messages"));
            self.close_compose_session(session_id);
            return Err(MailError::missing_token());
        }
        if draft.to.trim().is_empty() {
            self.notify(Notice::error("Recipient is required"));
            return Err(MailError::invalid_argument("Recipient is required"));
        }

        let threading = context.threading();
        let outgoing = OutgoingMessage::from_draft(draft, &self.own_email(), &threading);
        let encoded = build_mime_message(&outgoing);
        let options = SendOptions {
            thread_id: threading.thread_id,
            use_draft: encoded.send_path().use_draft(),
        };

        info!(
            "Sending message ({:?}, {} attachments)",
            encoded.send_path(),
            draft.attachments.len()
        );
        match self.api.send_message(&encoded.raw, &options) {
            Ok(sent) => {
                self.notify(Notice::info("Message sent"));
                self.close_compose_session(session_id);
                if let Err(e) = self.load_threads(true) {
                    debug!("Reload after send failed: {}", e);
                }
                Ok(sent)
            }
            Err(e) => {
                self.surface_error(&e);
                Err(e)
            }
        }
    }

    /// Compose context answering `message_id` (default: the latest
    /// message) in a loaded thread
    pub fn reply_context(
        &self,
        mode: ComposeMode,
        thread_id: &str,
        message_id: Option<&str>,
    ) -> Result<ComposeContext> {
        let thread = self.thread(thread_id)?;
        let message = match message_id {
            Some(id) => thread.find_message(id).cloned().ok_or_else(|| {
                MailError::invalid_argument(format!("Unknown message {} in thread {}", id, thread_id))
            })?,
            None => thread.last_message().clone(),
        };
        Ok(ComposeContext {
            mode,
            message: Some(message),
            thread: Some(thread),
        })
    }
}
