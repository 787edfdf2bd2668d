//! Message model: one decoded Gmail message

use super::ThreadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Parse `"Jane Doe" <jane@example.com>`, `<jane@example.com>` or a bare address.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(open) = s.rfind('<')
            && let Some(close) = s.rfind('>')
            && open < close
        {
            let name = s[..open].trim().trim_matches('"').trim();
            return Self {
                name: (!name.is_empty()).then(|| name.to_string()),
                email: s[open + 1..close].trim().to_string(),
            };
        }

        Self {
            name: None,
            email: s.replace('"', "").trim().to_string(),
        }
    }

    /// Parse a header value holding a comma-separated address list.
    ///
    /// Commas inside quoted display names do not split.
    pub fn parse_list(value: &str) -> Vec<Self> {
        split_addresses(value)
            .into_iter()
            .map(Self::parse)
            .filter(|addr| !addr.email.is_empty())
            .collect()
    }

    /// Name for list rows: display name, else the address
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

fn split_addresses(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => depth += 1,
            '>' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                out.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(value[start..].trim());
    out.retain(|part| !part.is_empty());
    out
}

/// Decoded body content. Either side may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub html: String,
    pub text: String,
}

impl MessageBody {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.text.is_empty()
    }
}

/// Attachment descriptor; bytes are fetched lazily via `getAttachment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub attachment_id: String,
}

/// A single decoded message. Header-derived strings are empty, never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub reply_to: String,
    /// Resolved date, if the provider timestamp or `Date` header was usable
    pub date: Option<DateTime<Utc>>,
    /// Milliseconds since epoch; 0 when no date could be resolved
    pub internal_date: i64,
    pub snippet: String,
    pub label_ids: BTreeSet<String>,
    pub body: MessageBody,
    pub attachments: Vec<Attachment>,
    /// RFC 822 `Message-ID` header
    pub message_id: String,
    pub references: String,
}

impl Message {
    pub fn builder(id: MessageId, thread_id: ThreadId) -> MessageBuilder {
        MessageBuilder::new(id, thread_id)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.contains(label)
    }

    pub fn sender(&self) -> EmailAddress {
        EmailAddress::parse(&self.from)
    }

    /// Plain text suitable for quoting: text body, else HTML rendered to
    /// text, else the snippet.
    pub fn plain_text(&self) -> String {
        if !self.body.text.is_empty() {
            return self.body.text.clone();
        }
        if !self.body.html.is_empty() {
            let stripped = strip_html(&self.body.html);
            if !stripped.trim().is_empty() {
                return stripped;
            }
        }
        self.snippet.clone()
    }
}

/// Column width used when rendering HTML bodies as text
const TEXT_RENDER_WIDTH: usize = 120;

/// Render HTML to plain text. html2text can panic on pathological markup,
/// in which case the input comes back unchanged.
pub fn strip_html(html: &str) -> String {
    std::panic::catch_unwind(|| html2text::from_read(html.as_bytes(), TEXT_RENDER_WIDTH))
        .map(|rendered| {
            rendered
                .lines()
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|_| {
            log::debug!("html2text panicked; using raw HTML as text");
            html.to_string()
        })
}

/// Builder for Message instances
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    fn new(id: MessageId, thread_id: ThreadId) -> Self {
        Self {
            message: Message {
                id,
                thread_id,
                subject: String::new(),
                from: String::new(),
                to: String::new(),
                cc: String::new(),
                bcc: String::new(),
                reply_to: String::new(),
                date: None,
                internal_date: 0,
                snippet: String::new(),
                label_ids: BTreeSet::new(),
                body: MessageBody::default(),
                attachments: Vec::new(),
                message_id: String::new(),
                references: String::new(),
            },
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.subject = subject.into();
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.message.from = from.into();
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.message.to = to.into();
        self
    }

    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.message.cc = cc.into();
        self
    }

    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.message.bcc = bcc.into();
        self
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.message.reply_to = reply_to.into();
        self
    }

    /// Set the timestamp (milliseconds) and the matching date
    pub fn internal_date(mut self, millis: i64) -> Self {
        self.message.internal_date = millis;
        self.message.date = DateTime::from_timestamp_millis(millis);
        self
    }

    pub fn date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.message.date = date;
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.message.snippet = snippet.into();
        self
    }

    pub fn label_ids<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message.label_ids = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn body(mut self, body: MessageBody) -> Self {
        self.message.body = body;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.message.body.text = text.into();
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.message.body.html = html.into();
        self
    }

    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.message.attachments = attachments;
        self
    }

    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message.message_id = message_id.into();
        self
    }

    pub fn references(mut self, references: impl Into<String>) -> Self {
        self.message.references = references.into();
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_with_name() {
        let addr = EmailAddress::parse("John Doe <john@example.com>");
        assert_eq!(addr.name, Some("John Doe".to_string()));
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_email_with_quoted_name() {
        let addr = EmailAddress::parse("\"Doe, John\" <john@example.com>");
        assert_eq!(addr.name, Some("Doe, John".to_string()));
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_email_with_angle_brackets_no_name() {
        let addr = EmailAddress::parse("<john@example.com>");
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_list_respects_quotes() {
        let list = EmailAddress::parse_list("\"Doe, John\" <john@example.com>, amy@example.com, ,");
        let emails: Vec<_> = list.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["john@example.com", "amy@example.com"]);
    }

    #[test]
    fn test_label_prefers_name() {
        assert_eq!(EmailAddress::parse("Amy <amy@x.com>").label(), "Amy");
        assert_eq!(EmailAddress::parse("amy@x.com").label(), "amy@x.com");
    }

    #[test]
    fn test_plain_text_falls_back_to_html_then_snippet() {
        let html = Message::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .html("<p>Hello <b>there</b></p>")
            .snippet("snip")
            .build();
        assert!(html.plain_text().contains("Hello"));
        assert!(!html.plain_text().contains("<p>"));

        let bare = Message::builder(MessageId::new("m2"), ThreadId::new("t1"))
            .snippet("only snippet")
            .build();
        assert_eq!(bare.plain_text(), "only snippet");
    }

    #[test]
    fn test_internal_date_sets_date() {
        let msg = Message::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .internal_date(1_700_000_000_000)
            .build();
        assert_eq!(msg.date.map(|d| d.timestamp_millis()), Some(1_700_000_000_000));
    }
}
