//! Bearer token and acquisition hints

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens this close to expiry are treated as already expired
const EXPIRY_SKEW_SECS: i64 = 60;

/// An OAuth access token plus the metadata the provider returned with it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    /// Account the token was issued for, when known
    pub account_email: Option<String>,
}

impl Token {
    /// A token with no expiry or metadata
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
            scope: None,
            account_email: None,
        }
    }

    /// Set the expiry from a lifetime in seconds, as token endpoints report it
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_at = Some(Utc::now() + Duration::seconds(seconds));
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_account(mut self, email: impl Into<String>) -> Self {
        self.account_email = Some(email.into());
        self
    }

    /// True once the token is within a minute of its expiry
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("account_email", &self.account_email)
            .finish()
    }
}

/// How interactive an acquisition may be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Prompt {
    /// Silent; fail rather than ask the user
    #[default]
    None,
    SelectAccount,
    Consent,
}

impl Prompt {
    /// Value of the OAuth `prompt` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::None => "none",
            Prompt::SelectAccount => "select_account",
            Prompt::Consent => "consent",
        }
    }
}
