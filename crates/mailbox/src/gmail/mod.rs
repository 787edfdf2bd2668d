//! Gmail API integration
//!
//! This module provides:
//! - the `MailApi` trait and its HTTP implementation (`GmailClient`)
//! - decoding of Gmail's MIME part trees into `Message`
//! - folding raw threads into the `Thread` view model

mod client;
mod decode;
mod normalize;
mod traits;

pub use client::GmailClient;
pub use decode::{decode_attachment_data, decode_base64url, decode_message};
pub use normalize::normalize_thread;
pub use traits::{MailApi, SendOptions, ThreadQuery};

/// Gmail API wire types
///
/// Only the fields the mailbox reads are modelled; everything is optional
/// because Gmail omits empty fields.
pub mod api {
    use serde::{Deserialize, Deserializer, Serialize};

    /// Response from `users.threads.list`
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListThreadsResponse {
        #[serde(default)]
        pub threads: Vec<ThreadRef>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Thread summary returned by the list call
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ThreadRef {
        pub id: String,
        pub snippet: Option<String>,
        pub history_id: Option<String>,
    }

    /// Full thread from `users.threads.get?format=full`
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailThread {
        pub id: String,
        pub history_id: Option<String>,
        pub snippet: Option<String>,
        #[serde(default)]
        pub messages: Vec<GmailMessage>,
    }

    /// Full message as embedded in a thread
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        #[serde(default)]
        pub label_ids: Vec<String>,
        pub snippet: Option<String>,
        /// Milliseconds since epoch. Gmail sends a string; numbers are accepted too.
        #[serde(default, deserialize_with = "string_or_number")]
        pub internal_date: Option<String>,
        pub payload: Option<MessagePart>,
    }

    /// A node of the MIME tree. The message payload is the root part.
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        #[serde(default)]
        pub headers: Vec<Header>,
        pub body: Option<PartBody>,
        #[serde(default)]
        pub parts: Vec<MessagePart>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        #[serde(default)]
        pub value: String,
    }

    /// Part body: inline base64url data or a reference to fetch later
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PartBody {
        pub size: Option<u64>,
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct ListLabelsResponse {
        #[serde(default)]
        pub labels: Vec<LabelResource>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LabelResource {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub kind: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        pub email_address: String,
        pub messages_total: Option<u64>,
        pub threads_total: Option<u64>,
        pub history_id: Option<String>,
    }

    /// Body of `threads.modify` / `messages.modify`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyRequest<'a> {
        pub add_label_ids: &'a [&'a str],
        pub remove_label_ids: &'a [&'a str],
    }

    /// Message resource used by send and draft calls
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawMessage<'a> {
        pub raw: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub thread_id: Option<&'a str>,
    }

    #[derive(Debug, Serialize)]
    pub struct DraftRequest<'a> {
        pub message: RawMessage<'a>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct DraftResponse {
        pub id: Option<String>,
        pub message: Option<SentMessage>,
    }

    /// Message reference returned by send calls
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SentMessage {
        #[serde(default)]
        pub id: String,
        pub thread_id: Option<String>,
        #[serde(default)]
        pub label_ids: Vec<String>,
    }

    /// Response from `messages.attachments.get`
    #[derive(Debug, Default, Deserialize)]
    pub struct AttachmentResponse {
        pub size: Option<u64>,
        #[serde(default)]
        pub data: String,
    }

    /// Gmail error envelope: `{"error": {"code": 401, "message": "..."}}`
    #[derive(Debug, Deserialize)]
    pub struct ErrorEnvelope {
        pub error: Option<ErrorDetail>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorDetail {
        pub code: Option<u16>,
        pub message: Option<String>,
        pub status: Option<String>,
    }

    fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        }))
    }

}
