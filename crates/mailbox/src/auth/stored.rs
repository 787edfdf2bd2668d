//! File-backed Gmail tokens with refresh
//!
//! Reads `gmail-tokens.json` from the config directory. A token with more
//! than five minutes left is returned as-is; otherwise the stored refresh
//! token is exchanged at Google's token endpoint and the result persisted.
//! This source never opens a browser: with nothing usable on disk it fails.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Prompt, Token, TokenSource};
use crate::config::GmailCredentials;

/// Stored token data
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix seconds
    expires_at: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    account_email: Option<String>,
}

impl StoredToken {
    fn into_token(self) -> Token {
        Token {
            access_token: self.access_token,
            expires_at: self.expires_at.and_then(|s| DateTime::from_timestamp(s, 0)),
            scope: self.scope,
            account_email: self.account_email,
        }
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

/// [`TokenSource`] over the on-disk token file
pub struct StoredTokenSource {
    credentials: Option<GmailCredentials>,
    token_path: PathBuf,
    token_url: String,
}

impl StoredTokenSource {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Seconds of remaining lifetime below which the token is refreshed
    const REFRESH_BUFFER_SECS: i64 = 300;

    /// Token file in the default config location
    pub fn new(credentials: Option<GmailCredentials>) -> Result<Self> {
        let token_path = Self::default_token_path()?;
        Ok(Self::with_path(credentials, token_path))
    }

    pub fn with_path(credentials: Option<GmailCredentials>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            token_path: token_path.into(),
            token_url: Self::TOKEN_URL.to_string(),
        }
    }

    /// Point refreshes at a different token endpoint
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// `~/.config/estatedesk/gmail-tokens.json`
    fn default_token_path() -> Result<PathBuf> {
        config::config_path("gmail-tokens.json").context("Could not determine config directory")
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Whether a token file exists at all
    pub fn has_stored_token(&self) -> bool {
        self.token_path.exists()
    }

    /// Persist a token obtained elsewhere, keeping any refresh token on disk
    pub fn save(&self, token: &Token, refresh_token: Option<&str>) -> Result<()> {
        let refresh_token = refresh_token
            .map(str::to_string)
            .or_else(|| self.load().ok().and_then(|t| t.refresh_token));

        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token,
            expires_at: token.expires_at.map(|at| at.timestamp()),
            scope: token.scope.clone(),
            account_email: token.account_email.clone(),
        };
        config::save_json_file(&self.token_path, &stored)
    }

    /// Clear stored tokens (logout)
    pub fn clear(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path).with_context(|| {
                format!("Failed to remove token file: {}", self.token_path.display())
            })?;
        }
        Ok(())
    }

    fn load(&self) -> Result<StoredToken> {
        config::load_json_file(&self.token_path)
    }

    fn is_fresh(stored: &StoredToken) -> bool {
        stored
            .expires_at
            .is_some_and(|at| at > Utc::now().timestamp() + Self::REFRESH_BUFFER_SECS)
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let credentials = self
            .credentials
            .as_ref()
            .context("Gmail OAuth client credentials are not configured")?;

        let mut response = ureq::post(&self.token_url)
            .send_form([
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }
}

impl TokenSource for StoredTokenSource {
    fn acquire(&self, prompt: Prompt) -> Result<Token> {
        if prompt != Prompt::None {
            log::debug!(
                "Interactive prompt '{}' not supported; using stored token",
                prompt.as_str()
            );
        }

        let stored = self.load().context("No stored Gmail token; sign in first")?;
        if Self::is_fresh(&stored) {
            return Ok(stored.into_token());
        }

        let refresh_token = stored
            .refresh_token
            .clone()
            .context("Stored Gmail token expired and has no refresh token")?;

        log::info!("Refreshing Gmail access token");
        let response = self.refresh_access_token(&refresh_token)?;

        let mut token = Token::new(response.access_token);
        if let Some(seconds) = response.expires_in {
            token = token.expires_in(seconds);
        }
        token.scope = response.scope.or(stored.scope);
        token.account_email = stored.account_email;

        self.save(&token, response.refresh_token.as_deref())?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, json: serde_json::Value) {
        fs::write(path, serde_json::to_string(&json).unwrap()).unwrap();
    }

    #[test]
    fn test_fresh_token_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail-tokens.json");
        let expires_at = Utc::now().timestamp() + 3600;
        write(
            &path,
            serde_json::json!({
                "access_token": "ya29.fresh",
                "refresh_token": "1//refresh",
                "expires_at": expires_at,
                "account_email": "agent@example.com"
            }),
        );

        let source = StoredTokenSource::with_path(None, &path);
        let token = source.acquire(Prompt::None).unwrap();
        assert_eq!(token.access_token, "ya29.fresh");
        assert_eq!(token.account_email.as_deref(), Some("agent@example.com"));
        assert_eq!(token.expires_at.map(|t| t.timestamp()), Some(expires_at));
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = StoredTokenSource::with_path(None, dir.path().join("none.json"));
        let err = source.acquire(Prompt::Consent).unwrap_err();
        assert!(format!("{:#}", err).contains("No stored Gmail token"));
    }

    #[test]
    fn test_expired_without_refresh_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail-tokens.json");
        write(
            &path,
            serde_json::json!({"access_token": "old", "refresh_token": null, "expires_at": 10}),
        );

        let source = StoredTokenSource::with_path(None, &path);
        let err = source.acquire(Prompt::None).unwrap_err();
        assert!(err.to_string().contains("no refresh token"));
    }

    #[test]
    fn test_expired_without_credentials_fails_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail-tokens.json");
        write(
            &path,
            serde_json::json!({"access_token": "old", "refresh_token": "1//r", "expires_at": 10}),
        );

        let source = StoredTokenSource::with_path(None, &path)
            .with_token_url("http://127.0.0.1:9/unreachable");
        let err = source.acquire(Prompt::None).unwrap_err();
        assert!(format!("{:#}", err).contains("credentials are not configured"));
    }

    #[test]
    fn test_save_keeps_existing_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gmail-tokens.json");
        let source = StoredTokenSource::with_path(None, &path);

        source
            .save(&Token::new("first").expires_in(3600), Some("1//keep"))
            .unwrap();
        source.save(&Token::new("second").expires_in(3600), None).unwrap();

        let stored = source.load().unwrap();
        assert_eq!(stored.access_token, "second");
        assert_eq!(stored.refresh_token.as_deref(), Some("1//keep"));

        source.clear().unwrap();
        assert!(!source.has_stored_token());
    }
}
