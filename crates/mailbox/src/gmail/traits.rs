//! The mail API seam the state machine is written against

use super::api::{GmailThread, LabelResource, ListThreadsResponse, ProfileResponse, SentMessage};
use crate::error::Result;

/// Free-form query parameters for the thread endpoints.
///
/// Parameters keep insertion order. Empty values are dropped when the URL is
/// built, so callers can pass optional filters without branching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadQuery {
    params: Vec<(String, String)>,
}

impl ThreadQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a single label (Gmail `labelIds`)
    pub fn label(self, label: impl Into<String>) -> Self {
        self.param("labelIds", label)
    }

    pub fn max_results(self, max: u32) -> Self {
        self.param("maxResults", max.to_string())
    }

    /// Gmail search syntax (`q`)
    pub fn search(self, query: impl Into<String>) -> Self {
        self.param("q", query)
    }

    pub fn page_token(self, token: impl Into<String>) -> Self {
        self.param("pageToken", token)
    }

    /// Add an arbitrary parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Parameters that will actually be sent (empty values removed)
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// How `send_message` delivers a raw message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Gmail thread to attach the message to
    pub thread_id: Option<String>,
    /// Create a draft first, then send it by draft id
    pub use_draft: bool,
}

/// Authenticated access to the Gmail REST API.
///
/// Every method blocks. Failures are normalized into [`crate::MailError`];
/// a missing token fails with an auth error before any request is made.
pub trait MailApi: Send + Sync {
    /// One page of thread summaries
    fn list_threads(&self, query: &ThreadQuery) -> Result<ListThreadsResponse>;

    /// Full thread with nested messages (`format=full` is always sent)
    fn get_thread(&self, id: &str, query: &ThreadQuery) -> Result<GmailThread>;

    /// Every label, system and user. Callers filter.
    fn list_labels(&self) -> Result<Vec<LabelResource>>;

    fn get_profile(&self) -> Result<ProfileResponse>;

    fn modify_thread(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()>;

    fn modify_message(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()>;

    fn trash_thread(&self, id: &str) -> Result<()>;

    /// Send a base64url-encoded RFC 822 message
    fn send_message(&self, raw: &str, options: &SendOptions) -> Result<SentMessage>;

    /// Attachment payload as Gmail returns it (base64url)
    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_omitted() {
        let query = ThreadQuery::new()
            .label("INBOX")
            .search("")
            .max_results(25)
            .page_token("");
        let pairs: Vec<_> = query.pairs().collect();
        assert_eq!(pairs, vec![("labelIds", "INBOX"), ("maxResults", "25")]);
    }

    #[test]
    fn test_params_keep_insertion_order() {
        let query = ThreadQuery::new().param("b", "2").param("a", "1");
        let keys: Vec<_> = query.pairs().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
