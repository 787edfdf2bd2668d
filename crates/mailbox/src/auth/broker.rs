//! Token cache with single-flight acquisition and pub/sub

use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, Weak};

use super::{Prompt, Subscription, Token, TokenListener, TokenProvider, TokenSource};
use crate::error::{MailError, Result};

type SharedListener = Arc<dyn Fn(&Token) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, SharedListener)>,
}

/// One pending acquisition; every waiter receives the same outcome
#[derive(Default)]
struct Inflight {
    outcome: Mutex<Option<Result<Token>>>,
    settled: Condvar,
}

impl Inflight {
    fn wait(&self) -> Result<Token> {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            outcome = self
                .settled
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn settle(&self, result: Result<Token>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.settled.notify_all();
    }
}

/// [`TokenProvider`] over a pluggable [`TokenSource`]
pub struct TokenBroker {
    source: Box<dyn TokenSource>,
    current: RwLock<Option<Token>>,
    inflight: Mutex<Option<Arc<Inflight>>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl TokenBroker {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            current: RwLock::new(None),
            inflight: Mutex::new(None),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Install a token obtained elsewhere and notify listeners
    pub fn seed(&self, token: Token) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        self.notify(&token);
    }

    /// Forget the current token (sign-out). Listeners are not notified.
    pub fn revoke(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        log::info!("Gmail token revoked");
    }

    fn notify(&self, token: &Token) {
        // Listeners run outside the lock so they may call back into the broker
        let listeners: Vec<SharedListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(token);
        }
    }

    fn acquire(&self, prompt: Prompt) -> Result<Token> {
        log::debug!("Acquiring Gmail token (prompt={})", prompt.as_str());
        self.source.acquire(prompt).map_err(|e| MailError::Auth {
            message: format!("{:#}", e),
            payload: None,
        })
    }
}

impl TokenProvider for TokenBroker {
    fn token(&self) -> Option<Token> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|t| !t.is_expired())
            .cloned()
    }

    fn request_token(&self, prompt: Prompt) -> Result<Token> {
        let (flight, leader) = {
            let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Inflight::default());
                    *slot = Some(Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            log::debug!("Joining in-flight token request");
            return flight.wait();
        }

        let outcome = self.acquire(prompt);
        match &outcome {
            Ok(token) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
            }
            Err(e) => log::warn!("Token request failed: {}", e),
        }

        *self.inflight.lock().unwrap_or_else(PoisonError::into_inner) = None;
        flight.settle(outcome.clone());

        if let Ok(token) = &outcome {
            self.notify(token);
        }
        outcome
    }

    fn subscribe(&self, listener: TokenListener) -> Subscription {
        let id = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::from(listener)));
            id
        };

        let registry: Weak<Mutex<Listeners>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .retain(|(entry, _)| *entry != id);
            }
        })
    }
}
