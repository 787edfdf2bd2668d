//! Composing, replying and forwarding
//!
//! [`ComposeContext`] derives a pre-filled [`ComposeDraft`]; the draft plus
//! threading metadata becomes an [`OutgoingMessage`], which
//! [`build_mime_message`] serializes for transport.

mod context;
mod mime;

pub use context::{
    ComposeContext, ComposeDraft, ComposeMode, FORWARD_MARKER, ReplyRecipients, Threading,
    ensure_prefix, format_full_date, forwarded_body, quoted_reply, reply_recipients,
    threading_headers,
};
pub use mime::{
    EncodedMessage, OutgoingAttachment, OutgoingMessage, SendPath, build_mime_message,
    render_mime_message, wrap_base64,
};

impl OutgoingMessage {
    /// Outgoing message for a submitted draft
    pub fn from_draft(draft: &ComposeDraft, from: &str, threading: &Threading) -> Self {
        Self {
            to: draft.to.trim().to_string(),
            cc: draft.cc.trim().to_string(),
            bcc: draft.bcc.trim().to_string(),
            from: from.to_string(),
            subject: draft.subject.trim().to_string(),
            body: draft.body.clone(),
            in_reply_to: threading.in_reply_to.clone(),
            references: threading.references.clone(),
            attachments: draft.attachments.clone(),
        }
    }
}
