//! Domain models for mail entities

mod label;
mod message;
mod thread;

pub use label::{Label, LabelId, LabelKind};
pub use message::{
    Attachment, EmailAddress, Message, MessageBody, MessageBuilder, MessageId, strip_html,
};
pub use thread::{Thread, ThreadId, sort_newest_first};

use serde::{Deserialize, Serialize};

/// The signed-in Gmail account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email_address: String,
    pub messages_total: Option<u64>,
    pub threads_total: Option<u64>,
    pub history_id: Option<String>,
}
