//! Library entry point for dacp-cli components.
//!
//! Exposes the configuration, formatting and session modules so integration
//! tests can drive them without going through the binary entry point.

pub mod config;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod session;

pub use config::CLIConfiguration;
pub use error::{CLIError, Result};
pub use formatter::OutputFormatter;
pub use session::{CLISession, OutputFormat, QueryOutput};
