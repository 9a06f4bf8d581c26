//! dacp - command-line SQL runner for the DACP HTTP/JSON SQL service
//!
//! # Usage
//!
//! ```bash
//! # Single statement
//! dacp -u http://localhost:8080 --user alice --password secret -c "SELECT * FROM orders"
//!
//! # Execute SQL file
//! dacp -u http://localhost:8080 --user alice --file queries.sql
//!
//! # CSV output, statements from stdin
//! echo "SELECT 1" | dacp --csv
//! ```

use clap::Parser;
use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use dacp_cli::{logging, CLIConfiguration, CLIError, CLISession, OutputFormat, Result};
use dacp_link::DacpLinkClient;

mod args;

use args::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("{}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = CLIConfiguration::load(&cli.config)?;
    let session = create_session(&cli, &config)?;

    let result = match (&cli.file, &cli.command) {
        (Some(file), None) => {
            let sql = std::fs::read_to_string(file).map_err(|e| {
                CLIError::FileError(format!("Failed to read {}: {}", file.display(), e))
            })?;
            session.execute_batch(&sql).await
        }

        (None, Some(command)) => session.execute(command).await,

        (None, None) => {
            let mut sql = String::new();
            std::io::stdin().read_to_string(&mut sql)?;
            session.execute_batch(&sql).await
        }

        (Some(_), Some(_)) => Err(CLIError::ConfigurationError(
            "Cannot specify both --file and --command".into(),
        )),
    };

    session.close();
    result
}

/// Merge flags over the config file and build the client
fn create_session(cli: &Cli, config: &CLIConfiguration) -> Result<CLISession> {
    let server = config.resolved_server();
    let auth = config.resolved_auth();
    let cursor = config.resolved_cursor();

    let url = cli
        .url
        .clone()
        .or(server.url)
        .ok_or_else(|| CLIError::ConfigurationError("No service URL; pass --url".into()))?;
    let user = cli
        .user
        .clone()
        .or(auth.user)
        .ok_or_else(|| CLIError::ConfigurationError("No user; pass --user".into()))?;

    let mut timeouts = config.to_timeouts();
    if let Some(secs) = cli.connection_timeout {
        timeouts.connection_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.receive_timeout {
        timeouts.receive_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.task_timeout {
        timeouts.task_timeout = Duration::from_secs(secs);
    }
    if let Some(millis) = cli.request_interval_ms {
        timeouts.request_interval = Duration::from_millis(millis);
    }

    let mut builder = DacpLinkClient::builder()
        .base_url(url)
        .user(user)
        .password(cli.password.clone().or(auth.password).unwrap_or_default())
        .token_expiry(Duration::from_secs(cli.token_expiry.unwrap_or(auth.token_expiry)))
        .page_size(cli.page_size.unwrap_or(cursor.page_size))
        .timeouts(timeouts);
    if let Some(database) = cli.database.clone().or(auth.database) {
        builder = builder.database(database);
    }
    let client = builder.build()?;

    let ui_format = config.resolved_ui().format;
    let format = match cli.output_format() {
        Some(format) => format,
        None => OutputFormat::from_name(&ui_format).ok_or_else(|| {
            CLIError::ConfigurationError(format!("Unknown output format '{}'", ui_format))
        })?,
    };

    log::debug!("[DACP_CLI] Connecting to {}", client.base_url());
    Ok(CLISession::new(client, format))
}
