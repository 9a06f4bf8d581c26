// Logging for the dacp binary, powered by tracing-subscriber.
//
// dacp-link logs through the `log` facade; `tracing_log::LogTracer` routes
// those records into the subscriber so one filter governs both.

use tracing_subscriber::EnvFilter;

use crate::error::{CLIError, Result};

/// Build the filter: `RUST_LOG` wins, otherwise `info` (or `debug` when
/// verbose) with noisy HTTP crates held at `warn`.
pub fn build_env_filter(verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = if verbose { "debug" } else { "info" };
    let directives = [level, "hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn", "h2=warn"];
    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str).map_err(|e| {
        CLIError::ConfigurationError(format!("Invalid tracing filter '{}': {}", filter_str, e))
    })
}

/// Install the stderr subscriber and the `log` bridge.
pub fn init_logging(verbose: bool) -> Result<()> {
    // ok() in case already initialized
    tracing_log::LogTracer::init().ok();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbose)?)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        CLIError::ConfigurationError(format!("Failed to install logger: {}", e))
    })
}
