//! Configuration loading for the mailbox
//!
//! `MailboxSettings` comes from `mailbox.json` in the estatedesk config
//! directory, with environment overrides for the service URLs.
//!
//! OAuth credentials (only needed to refresh stored tokens) are loaded from,
//! in order of priority:
//! 1. JSON file (Google Cloud Console format)
//! 2. Runtime environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename in the config directory
const SETTINGS_FILE: &str = "mailbox.json";

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

pub const DEFAULT_GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Tunables for the mailbox state machine and its collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxSettings {
    /// Label the thread list is filtered to
    pub label: String,
    /// Page size for the thread list
    pub max_results: u32,
    pub gmail_base_url: String,
    /// Backend hosting the mailbox sync endpoint; sync is disabled when unset
    pub api_base_url: Option<String>,
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            label: "INBOX".to_string(),
            max_results: 25,
            gmail_base_url: DEFAULT_GMAIL_BASE_URL.to_string(),
            api_base_url: None,
        }
    }
}

impl MailboxSettings {
    pub const API_BASE_URL_ENV: &'static str = "ESTATEDESK_API_BASE_URL";
    pub const GMAIL_BASE_URL_ENV: &'static str = "ESTATEDESK_GMAIL_BASE_URL";

    /// Load `mailbox.json` (defaults if missing), then apply env overrides
    pub fn load() -> Result<Self> {
        let settings: Self =
            config::load_json_or_default(SETTINGS_FILE).context("Failed to load mailbox settings")?;
        Ok(settings.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Apply overrides from a variable lookup; blank values are ignored
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(Self::GMAIL_BASE_URL_ENV) {
            self.gmail_base_url = url;
        }
        if let Some(url) = non_empty(Self::API_BASE_URL_ENV) {
            self.api_base_url = Some(url);
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }
}

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load from `google-credentials.json`, falling back to environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }
        Self::from_env()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Desktop ("installed") and web client files share the same fields
        let secrets = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
        })
    }

    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    pub fn is_available() -> bool {
        config::config_exists(CREDENTIALS_FILE)
            || (std::env::var("GMAIL_CLIENT_ID").is_ok()
                && std::env::var("GMAIL_CLIENT_SECRET").is_ok())
    }
}
