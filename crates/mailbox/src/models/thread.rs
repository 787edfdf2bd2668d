//! Thread model: a conversation of one or more messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{LabelId, Message};

/// Unique identifier for a thread (Gmail thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A conversation view model.
///
/// `messages` is never empty and always ascending by `internal_date`.
/// Everything else about the thread (unread, starred, labels, ordering key)
/// is computed from `messages` on demand so it cannot drift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    pub id: ThreadId,
    pub history_id: Option<String>,
    pub subject: String,
    pub snippet: String,
    messages: Vec<Message>,
}

impl Thread {
    /// Build a thread from messages in any order.
    ///
    /// Returns `None` for an empty message list. The sort is stable, so
    /// messages sharing a timestamp keep their provider order.
    pub fn from_messages(
        id: ThreadId,
        history_id: Option<String>,
        snippet: impl Into<String>,
        mut messages: Vec<Message>,
    ) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        messages.sort_by_key(|m| m.internal_date);

        let last = &messages[messages.len() - 1];
        let subject = last.subject.clone();
        let snippet = match snippet.into() {
            s if s.is_empty() => last.snippet.clone(),
            s => s,
        };

        Some(Self {
            id,
            history_id,
            subject,
            snippet,
            messages,
        })
    }

    /// Messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    pub fn last_message(&self) -> &Message {
        // non-empty by construction
        &self.messages[self.messages.len() - 1]
    }

    /// True if any message carries UNREAD
    pub fn is_unread(&self) -> bool {
        self.messages.iter().any(|m| m.has_label(LabelId::UNREAD))
    }

    /// True if any message carries STARRED
    pub fn is_starred(&self) -> bool {
        self.messages.iter().any(|m| m.has_label(LabelId::STARRED))
    }

    /// Union of every message's labels
    pub fn label_ids(&self) -> BTreeSet<String> {
        self.messages
            .iter()
            .flat_map(|m| m.label_ids.iter().cloned())
            .collect()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.messages.iter().any(|m| m.has_label(label))
    }

    /// List ordering key; identical to the last message's timestamp
    pub fn latest_internal_date(&self) -> i64 {
        self.last_message().internal_date
    }

    pub fn find_message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id.as_str() == id)
    }
}

/// Sort newest-first by `latest_internal_date`, keeping ties in input order
pub fn sort_newest_first(threads: &mut [Thread]) {
    threads.sort_by(|a, b| b.latest_internal_date().cmp(&a.latest_internal_date()));
}
