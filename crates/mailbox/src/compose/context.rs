//! Pre-filling replies and forwards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mime::OutgoingAttachment;
use crate::models::{EmailAddress, Message, Thread};

/// What the compose window was opened for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComposeMode {
    #[default]
    Compose,
    Reply,
    ReplyAll,
    Forward,
}

impl ComposeMode {
    /// Window title
    pub fn title(&self) -> &'static str {
        match self {
            ComposeMode::Compose => "New Message",
            ComposeMode::Reply => "Reply",
            ComposeMode::ReplyAll => "Reply all",
            ComposeMode::Forward => "Forward",
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, ComposeMode::Reply | ComposeMode::ReplyAll)
    }
}

/// The message (and thread) a compose session responds to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeContext {
    pub mode: ComposeMode,
    pub message: Option<Message>,
    pub thread: Option<Thread>,
}

impl ComposeContext {
    pub fn new_message() -> Self {
        Self::default()
    }

    pub fn reply(message: Message, thread: Option<Thread>) -> Self {
        Self::responding(ComposeMode::Reply, message, thread)
    }

    pub fn reply_all(message: Message, thread: Option<Thread>) -> Self {
        Self::responding(ComposeMode::ReplyAll, message, thread)
    }

    pub fn forward(message: Message, thread: Option<Thread>) -> Self {
        Self::responding(ComposeMode::Forward, message, thread)
    }

    fn responding(mode: ComposeMode, message: Message, thread: Option<Thread>) -> Self {
        Self {
            mode,
            message: Some(message),
            thread,
        }
    }

    /// Pre-filled form for this context. `own_email` is excluded from
    /// derived recipients.
    pub fn derive_draft(&self, own_email: &str) -> ComposeDraft {
        let mut draft = ComposeDraft::default();
        let Some(message) = &self.message else {
            return draft;
        };

        match self.mode {
            ComposeMode::Compose => {}
            ComposeMode::Reply | ComposeMode::ReplyAll => {
                let recipients =
                    reply_recipients(message, own_email, self.mode == ComposeMode::ReplyAll);
                draft.to = recipients.to.join(", ");
                draft.cc = recipients.cc.join(", ");
                draft.subject = ensure_prefix(&message.subject, "Re:");
                draft.body = quoted_reply(message);
            }
            ComposeMode::Forward => {
                draft.subject = ensure_prefix(&message.subject, "Fwd:");
                draft.body = forwarded_body(message);
            }
        }
        draft
    }

    /// Threading metadata for the outgoing message. Only replies thread.
    pub fn threading(&self) -> Threading {
        let Some(message) = self.message.as_ref().filter(|_| self.mode.is_reply()) else {
            return Threading::default();
        };

        let thread_id = self
            .thread
            .as_ref()
            .map(|t| t.id.as_str())
            .filter(|id| !id.is_empty())
            .unwrap_or(message.thread_id.as_str());

        let (in_reply_to, references) = threading_headers(message);
        Threading {
            thread_id: (!thread_id.is_empty()).then(|| thread_id.to_string()),
            in_reply_to,
            references,
        }
    }
}

/// Editable compose form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeDraft {
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<OutgoingAttachment>,
}

/// Reply threading: Gmail thread plus RFC 822 headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Threading {
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

/// Derived reply recipients, bare addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyRecipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

/// Prefix `subject` unless it already starts with `prefix` (any case).
/// The subject is used as given; only an empty one is replaced.
pub fn ensure_prefix(subject: &str, prefix: &str) -> String {
    if subject.is_empty() {
        return format!("{} (no subject)", prefix);
    }
    let already = subject
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
    if already {
        subject.to_string()
    } else {
        format!("{} {}", prefix, subject)
    }
}

fn addresses(value: &str) -> impl Iterator<Item = String> + '_ {
    EmailAddress::parse_list(value).into_iter().map(|a| a.email)
}

/// Keep the first occurrence of each address, case-insensitively
fn dedupe(list: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    list.into_iter()
        .filter(|addr| seen.insert(addr.to_lowercase()))
        .collect()
}

/// Reply targets: `Reply-To` else `From`, minus the account's own address.
///
/// For reply-all the original To and Cc (minus own address and anything
/// already in To) become Cc. If To ends up empty, the first Cc candidate is
/// promoted into To and removed from Cc.
pub fn reply_recipients(message: &Message, own_email: &str, reply_all: bool) -> ReplyRecipients {
    let own = own_email.trim().to_lowercase();
    let not_own = |addr: &String| own.is_empty() || addr.to_lowercase() != own;

    let source = if message.reply_to.trim().is_empty() {
        &message.from
    } else {
        &message.reply_to
    };
    let initial = dedupe(addresses(source));
    let mut to: Vec<String> = initial.iter().filter(|a| not_own(a)).cloned().collect();

    if !reply_all {
        return ReplyRecipients { to, cc: Vec::new() };
    }

    let initial_lower: Vec<String> = initial.iter().map(|a| a.to_lowercase()).collect();
    let mut cc: Vec<String> = dedupe(addresses(&message.to).chain(addresses(&message.cc)))
        .into_iter()
        .filter(|a| not_own(a))
        .filter(|a| !initial_lower.contains(&a.to_lowercase()))
        .collect();

    if to.is_empty() && !cc.is_empty() {
        to.push(cc.remove(0));
    }

    ReplyRecipients { to, cc }
}

/// Human-readable timestamp used in quote and forward headers
pub fn format_full_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%a, %b %-d, %Y at %-I:%M %p").to_string())
        .unwrap_or_default()
}

/// `"\n\nOn <date> <from> wrote:\n"` followed by the original, each line
/// prefixed with `"> "` (blank lines become `">"`)
pub fn quoted_reply(message: &Message) -> String {
    let quoted = message
        .plain_text()
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line.trim_end_matches('\r'))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n\nOn {} {} wrote:\n{}",
        format_full_date(message.date),
        message.from,
        quoted
    )
}

pub const FORWARD_MARKER: &str = "---------- Forwarded message ---------";

/// Forwarded-message header block followed by the original body
pub fn forwarded_body(message: &Message) -> String {
    format!(
        "{}\nFrom: {}\nDate: {}\nSubject: {}\nTo: {}\n\n{}",
        FORWARD_MARKER,
        message.from,
        format_full_date(message.date),
        message.subject,
        message.to,
        message.plain_text()
    )
}

/// `In-Reply-To` and `References` for a reply to `message`.
///
/// Both are absent when the original has no Message-ID. References extend
/// the original chain, never replace it.
pub fn threading_headers(message: &Message) -> (Option<String>, Option<String>) {
    let message_id = message.message_id.trim();
    if message_id.is_empty() {
        return (None, None);
    }
    let references = match message.references.trim() {
        "" => message_id.to_string(),
        refs => format!("{} {}", refs, message_id),
    };
    (Some(message_id.to_string()), Some(references))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, ThreadId};

    fn original() -> Message {
        Message::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .subject("Showing on Saturday")
            .from("Dana Broker <dana@realty.example>")
            .to("agent@example.com, \"Lee, Sam\" <sam@buyers.example>")
            .cc("ops@realty.example, AGENT@example.com")
            .internal_date(1_704_103_200_000)
            .text("Line one\n\nLine three")
            .message_id("<m1@realty.example>")
            .references("<root@realty.example>")
            .build()
    }

    #[test]
    fn test_ensure_prefix() {
        assert_eq!(ensure_prefix("Hi", "Re:"), "Re: Hi");
        assert_eq!(ensure_prefix("re: Hi", "Re:"), "re: Hi");
        assert_eq!(ensure_prefix("RE: Hi", "Re:"), "RE: Hi");
        assert_eq!(ensure_prefix("", "Fwd:"), "Fwd: (no subject)");
        assert_eq!(ensure_prefix("FWD: deck", "Fwd:"), "FWD: deck");
        assert_eq!(ensure_prefix("é", "Re:"), "Re: é");
    }

    #[test]
    fn test_prefix_is_idempotent() {
        let once = ensure_prefix("Offer", "Re:");
        assert_eq!(ensure_prefix(&once, "Re:"), once);
    }

    #[test]
    fn test_prefix_keeps_subject_whitespace() {
        assert_eq!(ensure_prefix(" Re: Offer", "Re:"), "Re:  Re: Offer");
        assert_eq!(ensure_prefix("Offer ", "Re:"), "Re: Offer ");
        assert_eq!(ensure_prefix("  ", "Fwd:"), "Fwd:   ");
        assert_eq!(ensure_prefix("Re:Offer", "Re:"), "Re:Offer");
    }

    #[test]
    fn test_reply_uses_reply_to_when_present() {
        let mut msg = original();
        msg.reply_to = "listings@realty.example".to_string();
        let recipients = reply_recipients(&msg, "agent@example.com", false);
        assert_eq!(recipients.to, vec!["listings@realty.example"]);
        assert!(recipients.cc.is_empty());
    }

    #[test]
    fn test_reply_all_excludes_self_and_sender() {
        let recipients = reply_recipients(&original(), "agent@example.com", true);
        assert_eq!(recipients.to, vec!["dana@realty.example"]);
        assert_eq!(
            recipients.cc,
            vec!["sam@buyers.example", "ops@realty.example"]
        );
    }

    #[test]
    fn test_reply_all_to_own_message_promotes_first_cc() {
        let mut msg = original();
        msg.from = "Agent <agent@example.com>".to_string();
        let recipients = reply_recipients(&msg, "agent@example.com", true);
        assert_eq!(recipients.to, vec!["sam@buyers.example"]);
        assert_eq!(recipients.cc, vec!["ops@realty.example"]);
    }

    #[test]
    fn test_quoted_reply() {
        let quoted = quoted_reply(&original());
        assert!(quoted.starts_with("\n\nOn Mon, Jan 1, 2024 at 10:00 AM Dana Broker <dana@realty.example> wrote:\n"));
        assert!(quoted.ends_with("> Line one\n>\n> Line three"));
    }

    #[test]
    fn test_forwarded_body() {
        let body = forwarded_body(&original());
        assert!(body.starts_with(FORWARD_MARKER));
        assert!(body.contains("\nSubject: Showing on Saturday\n"));
        assert!(body.ends_with("\n\nLine one\n\nLine three"));
    }

    #[test]
    fn test_derive_reply_draft() {
        let draft = ComposeContext::reply(original(), None).derive_draft("agent@example.com");
        assert_eq!(draft.to, "dana@realty.example");
        assert_eq!(draft.cc, "");
        assert_eq!(draft.subject, "Re: Showing on Saturday");
        assert!(draft.body.contains("> Line one"));
    }

    #[test]
    fn test_derive_forward_draft_has_no_recipients() {
        let draft = ComposeContext::forward(original(), None).derive_draft("agent@example.com");
        assert_eq!(draft.to, "");
        assert_eq!(draft.subject, "Fwd: Showing on Saturday");
    }

    #[test]
    fn test_new_message_is_blank() {
        assert_eq!(
            ComposeContext::new_message().derive_draft("agent@example.com"),
            ComposeDraft::default()
        );
    }

    #[test]
    fn test_threading_only_for_replies() {
        let reply = ComposeContext::reply(original(), None).threading();
        assert_eq!(reply.thread_id.as_deref(), Some("t1"));
        assert_eq!(reply.in_reply_to.as_deref(), Some("<m1@realty.example>"));
        assert_eq!(
            reply.references.as_deref(),
            Some("<root@realty.example> <m1@realty.example>")
        );

        assert_eq!(
            ComposeContext::forward(original(), None).threading(),
            Threading::default()
        );
    }

    #[test]
    fn test_threading_headers_without_message_id() {
        let mut msg = original();
        msg.message_id.clear();
        assert_eq!(threading_headers(&msg), (None, None));

        msg.message_id = "<solo@x>".to_string();
        msg.references.clear();
        assert_eq!(
            threading_headers(&msg),
            (Some("<solo@x>".to_string()), Some("<solo@x>".to_string()))
        );
    }
}
