//! Gmail thread normalization
//!
//! Converts a raw `threads.get` response into the [`Thread`] view model.

use super::api::GmailThread;
use super::decode::{decode_message, unescape_html};
use crate::models::{Thread, ThreadId};

/// Decode every message and fold them into a thread.
///
/// Returns `None` when the thread has no messages; such a thread never
/// enters mailbox state.
pub fn normalize_thread(raw: &GmailThread) -> Option<Thread> {
    let messages: Vec<_> = raw
        .messages
        .iter()
        .map(|m| decode_message(m, &raw.id))
        .collect();

    if messages.is_empty() {
        log::debug!("Skipping thread {} with no messages", raw.id);
    }

    let snippet = unescape_html(raw.snippet.as_deref().unwrap_or(""));
    Thread::from_messages(ThreadId::new(raw.id.clone()), raw.history_id.clone(), snippet, messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{GmailMessage, Header, MessagePart};

    fn raw_message(id: &str, internal_date: i64, subject: &str, labels: &[&str]) -> GmailMessage {
        GmailMessage {
            id: id.to_string(),
            thread_id: Some("t1".to_string()),
            label_ids: labels.iter().map(|l| l.to_string()).collect(),
            snippet: Some(format!("snippet {}", id)),
            internal_date: Some(internal_date.to_string()),
            payload: Some(MessagePart {
                headers: vec![Header {
                    name: "Subject".to_string(),
                    value: subject.to_string(),
                }],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_out_of_order_messages_are_sorted() {
        let raw = GmailThread {
            id: "t1".to_string(),
            history_id: Some("991".to_string()),
            snippet: None,
            messages: vec![
                raw_message("m2", 200, "Re: Listing", &["INBOX"]),
                raw_message("m1", 100, "Listing", &["INBOX", "UNREAD"]),
            ],
        };

        let thread = normalize_thread(&raw).unwrap();
        let ids: Vec<_> = thread.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(thread.subject, "Re: Listing");
        assert_eq!(thread.snippet, "snippet m2");
        assert_eq!(thread.latest_internal_date(), 200);
        assert_eq!(thread.history_id.as_deref(), Some("991"));
        assert!(thread.is_unread());
    }

    #[test]
    fn test_thread_snippet_is_unescaped() {
        let raw = GmailThread {
            id: "t1".to_string(),
            snippet: Some("Tom &amp; Jerry&#39;s offer".to_string()),
            messages: vec![raw_message("m1", 100, "Offer", &[])],
            ..Default::default()
        };
        assert_eq!(normalize_thread(&raw).unwrap().snippet, "Tom & Jerry's offer");
    }

    #[test]
    fn test_empty_thread_is_dropped() {
        let raw = GmailThread {
            id: "t0".to_string(),
            ..Default::default()
        };
        assert!(normalize_thread(&raw).is_none());
    }
}
