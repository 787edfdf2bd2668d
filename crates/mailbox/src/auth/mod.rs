//! Token acquisition and change notification
//!
//! The mailbox never owns credentials. It borrows a token per request from a
//! [`TokenProvider`] and asks for a fresh one when Gmail answers 401.

mod broker;
mod stored;
mod token;

pub use broker::TokenBroker;
pub use stored::StoredTokenSource;
pub use token::{Prompt, Token};

use crate::error::Result;

/// Callback fired after each successful (re)authorization
pub type TokenListener = Box<dyn Fn(&Token) + Send + Sync>;

/// Source of bearer tokens for Gmail requests
pub trait TokenProvider: Send + Sync {
    /// Current token without blocking; `None` if absent or expired
    fn token(&self) -> Option<Token>;

    /// Acquire a token, blocking until the acquisition settles.
    ///
    /// Concurrent callers share a single pending acquisition.
    fn request_token(&self, prompt: Prompt) -> Result<Token>;

    /// Register a listener; it stays registered until the returned handle
    /// is dropped or unsubscribed.
    fn subscribe(&self, listener: TokenListener) -> Subscription;
}

/// Where a [`TokenBroker`] gets new tokens from
pub trait TokenSource: Send + Sync {
    fn acquire(&self, prompt: Prompt) -> anyhow::Result<Token>;
}

/// Handle returned by [`TokenProvider::subscribe`]
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
