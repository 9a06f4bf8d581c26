//! Error types for dacp-link.
//!
//! Every failure carries the server-provided code and message verbatim where
//! one exists, so callers can report diagnostics without re-querying.

use crate::models::ResultCode;
use thiserror::Error;

/// Result type for dacp-link operations
pub type Result<T> = std::result::Result<T, DacpLinkError>;

/// Errors that can occur while talking to the DACP SQL service
#[derive(Error, Debug)]
pub enum DacpLinkError {
    /// Login rejected, or the token stayed invalid after the single re-login
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Statement submission rejected by the server
    #[error("Execution error [{code}]: {message}")]
    ExecutionError { code: ResultCode, message: String },

    /// Page fetch failed (server code, or auth retry exhausted)
    #[error("Cursor error [{code}]: {message}")]
    CursorError { code: ResultCode, message: String },

    /// Task exceeded the configured timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Malformed value or type-signature mismatch
    #[error("Coercion error: {0}")]
    CoercionError(String),

    /// Non-200 HTTP status, connection failure or unparseable body
    #[error("Transport error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    TransportError {
        status: Option<u16>,
        message: String,
    },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The delegated engine could not be started or failed mid-stream
    #[error("Delegated engine error: {0}")]
    DelegatedEngineError(String),

    /// Operation attempted on a closed client
    #[error("Client is closed")]
    Closed,
}

impl DacpLinkError {
    pub(crate) fn execution(code: ResultCode, message: impl Into<String>) -> Self {
        Self::ExecutionError {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn cursor(code: ResultCode, message: impl Into<String>) -> Self {
        Self::CursorError {
            code,
            message: message.into(),
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransportError {
            status,
            message: message.into(),
        }
    }

    /// Server result code attached to this error, if any
    pub fn result_code(&self) -> Option<&ResultCode> {
        match self {
            Self::ExecutionError { code, .. } | Self::CursorError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True for the token-expired family of failures
    pub fn is_token_expired(&self) -> bool {
        matches!(self.result_code(), Some(ResultCode::TokenExpired))
    }
}

impl From<reqwest::Error> for DacpLinkError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_timeout() {
            return Self::TimeoutError(err.to_string());
        }
        Self::transport(status, err.to_string())
    }
}

impl From<serde_json::Error> for DacpLinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(None, format!("Unparseable response body: {}", err))
    }
}
