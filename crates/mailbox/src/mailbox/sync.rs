//! Backend mailbox clean-up/sync trigger

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use ureq::Agent;

use crate::auth::Token;
use crate::compose::format_full_date;
use crate::error::{MailError, Result};

/// Job state reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncJob {
    #[serde(default = "SyncJob::default_status")]
    pub status: String,
    #[serde(default)]
    pub last_run: Option<String>,
}

impl SyncJob {
    fn default_status() -> String {
        "queued".to_string()
    }

    /// `last_run` as a timestamp; naive values are taken as UTC
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_run.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|n| n.and_utc())
            })
    }

    /// Status line shown next to the sync button
    pub fn status_text(&self) -> String {
        if self.status == "syncing" {
            return "Mailbox syncing…".to_string();
        }
        match self.last_run_at() {
            Some(at) => format!("Last sync: {}", format_full_date(Some(at))),
            None => "Mailbox sync requested".to_string(),
        }
    }
}

/// Requests an out-of-band mailbox sync
pub trait SyncTrigger: Send + Sync {
    fn trigger(&self, token: Option<&Token>) -> Result<SyncJob>;
}

/// `POST {api_base_url}/emails/gmail/clean-sync`
pub struct HttpSyncTrigger {
    agent: Agent,
    url: String,
}

impl HttpSyncTrigger {
    pub fn new(api_base_url: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            url: format!("{}/emails/gmail/clean-sync", api_base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Error text from a failed sync response: `detail`, else `error`
fn failure_message(payload: &serde_json::Value) -> String {
    ["detail", "error"]
        .iter()
        .find_map(|key| payload.get(key).and_then(|v| v.as_str()))
        .filter(|m| !m.is_empty())
        .unwrap_or("Mailbox sync failed")
        .to_string()
}

impl SyncTrigger for HttpSyncTrigger {
    fn trigger(&self, token: Option<&Token>) -> Result<SyncJob> {
        log::info!("Requesting mailbox sync at {}", self.url);
        let mut request = self.agent.post(self.url.as_str());
        if let Some(token) = token {
            request = request.header("Authorization", &token.bearer());
        }
        let mut response = request.send_empty()?;

        let status = response.status();
        let text = response.body_mut().read_to_string().unwrap_or_default();
        // Unparseable bodies count as empty
        let payload: serde_json::Value =
            serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({}));

        if !status.is_success() {
            return Err(MailError::from_status(
                status.as_u16(),
                failure_message(&payload),
                Some(payload),
            ));
        }

        serde_json::from_value(payload).map_err(|e| MailError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_text() {
        let syncing: SyncJob = serde_json::from_value(json!({"status": "syncing"})).unwrap();
        assert_eq!(syncing.status_text(), "Mailbox syncing…");

        let queued: SyncJob = serde_json::from_value(json!({})).unwrap();
        assert_eq!(queued.status, "queued");
        assert_eq!(queued.status_text(), "Mailbox sync requested");

        let done: SyncJob =
            serde_json::from_value(json!({"status": "done", "last_run": "2024-01-01T10:00:00"}))
                .unwrap();
        assert_eq!(done.status_text(), "Last sync: Mon, Jan 1, 2024 at 10:00 AM");
    }

    #[test]
    fn test_last_run_with_offset() {
        let job = SyncJob {
            status: "done".to_string(),
            last_run: Some("2024-01-01T12:00:00+02:00".to_string()),
        };
        assert_eq!(job.last_run_at().unwrap().timestamp(), 1_704_103_200);
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(failure_message(&json!({"detail": "Gmail not linked"})), "Gmail not linked");
        assert_eq!(failure_message(&json!({"error": "boom"})), "boom");
        assert_eq!(failure_message(&json!({})), "Mailbox sync failed");
    }

    #[test]
    fn test_url_joins_base() {
        assert_eq!(
            HttpSyncTrigger::new("http://localhost:8000/api/").url(),
            "http://localhost:8000/api/emails/gmail/clean-sync"
        );
    }
}
