//! Gmail API HTTP client
//!
//! Every request goes through [`GmailClient::execute`], the single place where
//! tokens are attached and failures are normalized into [`MailError`].
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use ureq::http::Response;
use ureq::{Agent, Body};
use url::Url;

use super::api::{
    AttachmentResponse, DraftRequest, DraftResponse, ErrorEnvelope, GmailThread,
    LabelResource, ListLabelsResponse, ListThreadsResponse, ModifyRequest, ProfileResponse,
    RawMessage, SentMessage,
};
use super::traits::{MailApi, SendOptions, ThreadQuery};
use crate::auth::TokenProvider;
use crate::config::DEFAULT_GMAIL_BASE_URL;
use crate::error::{MailError, Result};

/// Largest response body the client will read (attachments are inline base64)
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Gmail API client bound to a token provider
pub struct GmailClient {
    agent: Agent,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GmailClient {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(tokens, DEFAULT_GMAIL_BASE_URL)
    }

    /// Client against a non-default API root (proxies, tests)
    pub fn with_base_url(tokens: Arc<dyn TokenProvider>, base_url: impl Into<String>) -> Self {
        // Status codes are inspected here, not turned into transport errors
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/users/me/{segments...}` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let path: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let raw = format!("{}/users/me/{}", self.base_url, path.join("/"));
        Url::parse(&raw).map_err(|e| MailError::invalid_argument(format!("Invalid Gmail URL {}: {}", raw, e)))
    }

    fn url_with_query(&self, segments: &[&str], query: &ThreadQuery) -> Result<Url> {
        let mut url = self.url(segments)?;
        let mut pairs = query.pairs().peekable();
        if pairs.peek().is_some() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Bearer header for the current token, or an auth error without any I/O
    fn authorization(&self) -> Result<String> {
        self.tokens
            .token()
            .map(|t| t.bearer())
            .ok_or_else(MailError::missing_token)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let auth = self.authorization()?;
        log::debug!("GET {}", url.path());
        let response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &auth)
            .call()?;
        parse_json(&Self::execute(response)?)
    }

    fn post<B: Serialize>(&self, url: Url, body: Option<&B>) -> Result<String> {
        let auth = self.authorization()?;
        log::debug!("POST {}", url.path());
        let request = self
            .agent
            .post(url.as_str())
            .header("Authorization", &auth);
        let response = match body {
            Some(body) => request.send_json(body)?,
            None => request.send_empty()?,
        };
        Self::execute(response)
    }

    /// Read the body; non-2xx statuses become typed errors
    fn execute(mut response: Response<Body>) -> Result<String> {
        let status = response.status();
        let text = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(MailError::from)?;

        if status.is_success() {
            return Ok(text);
        }

        let message = error_message(&text, status.canonical_reason());
        let payload = serde_json::from_str(&text).ok();
        log::warn!("Gmail request failed ({}): {}", status.as_u16(), message);
        Err(MailError::from_status(status.as_u16(), message, payload))
    }
}

/// Message for a failed response: `error.message`, else the raw text,
/// else the reason phrase, else a generic fallback
fn error_message(text: &str, reason: Option<&str>) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(text)
        && let Some(message) = envelope
            .error
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
    {
        return message;
    }
    if !text.trim().is_empty() {
        return text.trim().to_string();
    }
    reason
        .filter(|r| !r.is_empty())
        .unwrap_or("Gmail request failed")
        .to_string()
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    // 204 and empty bodies read as an empty object
    let text = if text.trim().is_empty() { "{}" } else { text };
    serde_json::from_str(text).map_err(|e| MailError::InvalidResponse {
        message: e.to_string(),
    })
}

impl MailApi for GmailClient {
    fn list_threads(&self, query: &ThreadQuery) -> Result<ListThreadsResponse> {
        self.get_json(self.url_with_query(&["threads"], query)?)
    }

    fn get_thread(&self, id: &str, query: &ThreadQuery) -> Result<GmailThread> {
        let query = query.clone().param("format", "full");
        self.get_json(self.url_with_query(&["threads", id], &query)?)
    }

    fn list_labels(&self) -> Result<Vec<LabelResource>> {
        let response: ListLabelsResponse = self.get_json(self.url(&["labels"])?)?;
        Ok(response.labels)
    }

    fn get_profile(&self) -> Result<ProfileResponse> {
        self.get_json(self.url(&["profile"])?)
    }

    fn modify_thread(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        self.post(self.url(&["threads", id, "modify"])?, Some(&body))?;
        Ok(())
    }

    fn modify_message(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        self.post(self.url(&["messages", id, "modify"])?, Some(&body))?;
        Ok(())
    }

    fn trash_thread(&self, id: &str) -> Result<()> {
        self.post::<()>(self.url(&["threads", id, "trash"])?, None)?;
        Ok(())
    }

    fn send_message(&self, raw: &str, options: &SendOptions) -> Result<SentMessage> {
        let message = RawMessage {
            raw,
            thread_id: options.thread_id.as_deref().filter(|id| !id.is_empty()),
        };

        if !options.use_draft {
            let text = self.post(self.url(&["messages", "send"])?, Some(&message))?;
            return parse_json(&text);
        }

        let draft_text = self.post(
            self.url(&["drafts"])?,
            Some(&DraftRequest {
                message: message.clone(),
            }),
        )?;
        let draft: DraftResponse = parse_json(&draft_text)?;

        let send_url = self.url(&["drafts", "send"])?;
        let text = match draft.id {
            Some(id) => {
                log::debug!("Sending draft {}", id);
                self.post(send_url, Some(&serde_json::json!({ "id": id })))?
            }
            None => self.post(send_url, Some(&DraftRequest { message }))?,
        };

        // drafts.send answers with the sent message resource
        parse_json(&text)
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        let response: AttachmentResponse =
            self.get_json(self.url(&["messages", message_id, "attachments", attachment_id])?)?;
        Ok(response.data)
    }
}
