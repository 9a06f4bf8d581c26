//! Error types for dacp-cli
//!
//! Provides user-friendly error messages for common CLI failures.

use dacp_link::DacpLinkError;
use std::fmt;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CLIError>;

/// Errors that can occur in the CLI
#[derive(Debug)]
pub enum CLIError {
    /// Error from dacp-link
    LinkError(DacpLinkError),

    /// Configuration file or flag error
    ConfigurationError(String),

    /// File I/O error
    FileError(String),

    /// Output formatting error
    FormatError(String),
}

impl CLIError {
    fn format_link_error(err: &DacpLinkError) -> String {
        match err {
            DacpLinkError::AuthenticationError(msg) => {
                format!("Login failed: {}", Self::clean_nested_message(msg))
            }
            DacpLinkError::ExecutionError { code, message } => {
                format!("ERROR {}: {}", code, message)
            }
            DacpLinkError::CursorError { code, message } => {
                format!("ERROR {} while fetching results: {}", code, message)
            }
            DacpLinkError::TransportError { status, message } => match status {
                Some(status) => format!("HTTP {}: {}", status, Self::clean_nested_message(message)),
                None => Self::clean_nested_message(message),
            },
            DacpLinkError::TimeoutError(msg) => format!("Timed out: {}", msg),
            DacpLinkError::CoercionError(msg) => format!("Bad value in result: {}", msg),
            DacpLinkError::ConfigurationError(msg) => msg.clone(),
            DacpLinkError::DelegatedEngineError(msg) => format!("Delegated engine: {}", msg),
            DacpLinkError::Closed => "Client is closed".to_string(),
        }
    }

    fn clean_nested_message(message: &str) -> String {
        let mut cleaned = message.trim();
        let prefixes = [
            "Transport error:",
            "Authentication error:",
            "Login failed:",
            "error sending request:",
        ];

        loop {
            let mut stripped = false;
            for prefix in &prefixes {
                if let Some(rest) = cleaned.strip_prefix(prefix) {
                    cleaned = rest.trim_start();
                    stripped = true;
                    break;
                }
            }

            if !stripped {
                break;
            }
        }

        cleaned.to_string()
    }
}

impl fmt::Display for CLIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CLIError::LinkError(e) => write!(f, "{}", Self::format_link_error(e)),
            CLIError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CLIError::FileError(msg) => write!(f, "File error: {}", msg),
            CLIError::FormatError(msg) => write!(f, "Format error: {}", msg),
        }
    }
}

impl std::error::Error for CLIError {}

impl From<DacpLinkError> for CLIError {
    fn from(err: DacpLinkError) -> Self {
        CLIError::LinkError(err)
    }
}

impl From<std::io::Error> for CLIError {
    fn from(err: std::io::Error) -> Self {
        CLIError::FileError(err.to_string())
    }
}

impl From<toml::de::Error> for CLIError {
    fn from(err: toml::de::Error) -> Self {
        CLIError::ConfigurationError(format!("TOML parse error: {}", err))
    }
}

impl From<serde_json::Error> for CLIError {
    fn from(err: serde_json::Error) -> Self {
        CLIError::FormatError(err.to_string())
    }
}
