//! Error taxonomy for mailbox operations
//!
//! Every Gmail call funnels its failures into [`MailError`] so the state
//! machine can special-case authorization failures (status 401) and surface
//! everything else verbatim. Decoding never produces an error; see
//! `gmail::decode`.

use serde_json::Value;

/// HTTP status that signals a missing, expired or revoked token
pub const UNAUTHORIZED: u16 = 401;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MailError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MailError {
    /// Missing or rejected token. Always reports status 401.
    #[error("{message}")]
    Auth {
        message: String,
        payload: Option<Value>,
    },

    /// Any other non-2xx response from the provider
    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        payload: Option<Value>,
    },

    /// The request never produced an HTTP response
    #[error("Network error: {message}")]
    Network { message: String },

    /// A 2xx response whose body could not be understood
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("{message}")]
    InvalidArgument { message: String },

    /// A mailbox sync job is already running
    #[error("Mailbox sync already in progress")]
    SyncInFlight,

    /// No compose session is open (closed, sent, or replaced)
    #[error("Compose window is no longer open")]
    NoCompose,

    #[error("{what} is not configured")]
    NotConfigured { what: String },
}

impl MailError {
    /// Error for a request attempted without a token
    pub fn missing_token() -> Self {
        MailError::Auth {
            message: "Missing Gmail access token".to_string(),
            payload: None,
        }
    }

    /// Build the error for a non-2xx response
    pub fn from_status(status: u16, message: impl Into<String>, payload: Option<Value>) -> Self {
        let message = message.into();
        if status == UNAUTHORIZED {
            MailError::Auth { message, payload }
        } else {
            MailError::Api {
                message,
                status,
                payload,
            }
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        MailError::InvalidArgument {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            MailError::Auth { .. } => Some(UNAUTHORIZED),
            MailError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller should re-authorize before the user retries
    pub fn is_auth(&self) -> bool {
        self.status() == Some(UNAUTHORIZED)
    }

    /// Raw provider payload, when the response had one
    pub fn payload(&self) -> Option<&Value> {
        match self {
            MailError::Auth { payload, .. } | MailError::Api { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

impl From<ureq::Error> for MailError {
    fn from(e: ureq::Error) -> Self {
        match e {
            // Only reachable when an agent treats statuses as errors
            ureq::Error::StatusCode(status) => {
                MailError::from_status(status, format!("Gmail request failed ({})", status), None)
            }
            other => MailError::Network {
                message: other.to_string(),
            },
        }
    }
}
