use clap::Parser;
use dacp_cli::OutputFormat;
use std::path::PathBuf;

/// dacp - run SQL against a DACP service
#[derive(Parser, Debug)]
#[command(name = "dacp")]
#[command(author = "DACP Team")]
#[command(version)]
#[command(about = "Command-line SQL runner for the DACP HTTP/JSON SQL service", long_about = None)]
pub struct Cli {
    /// Service URL (e.g., http://localhost:8080)
    #[arg(short = 'u', long = "url", env = "DACP_URL")]
    pub url: Option<String>,

    /// Login user
    #[arg(long = "user", env = "DACP_USER")]
    pub user: Option<String>,

    /// Login password
    #[arg(long = "password", env = "DACP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database to log in to
    #[arg(short = 'd', long = "database")]
    pub database: Option<String>,

    /// Execute SQL from file and exit
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Execute SQL command and exit
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// Output format (defaults to the config file's [ui] format)
    #[arg(long = "format")]
    pub format: Option<OutputFormat>,

    /// Enable JSON output (shorthand for --format=json)
    #[arg(long = "json", conflicts_with_all = ["format", "csv"])]
    pub json: bool,

    /// Enable CSV output (shorthand for --format=csv)
    #[arg(long = "csv", conflicts_with = "format")]
    pub csv: bool,

    /// Configuration file path
    #[arg(long = "config", default_value = "~/.dacp/config.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Rows requested per result page
    #[arg(long = "page-size", value_name = "ROWS")]
    pub page_size: Option<u32>,

    /// Requested token lifetime in seconds
    #[arg(long = "token-expiry", value_name = "SECONDS")]
    pub token_expiry: Option<u64>,

    /// Connection timeout in seconds (TCP + TLS handshake)
    #[arg(long = "connection-timeout", value_name = "SECONDS")]
    pub connection_timeout: Option<u64>,

    /// Receive timeout in seconds, per HTTP request
    #[arg(long = "receive-timeout", value_name = "SECONDS")]
    pub receive_timeout: Option<u64>,

    /// Whole-task timeout in seconds (0 disables it)
    #[arg(long = "task-timeout", value_name = "SECONDS")]
    pub task_timeout: Option<u64>,

    /// Pause between page requests in milliseconds
    #[arg(long = "request-interval-ms", value_name = "MILLIS")]
    pub request_interval_ms: Option<u64>,
}

impl Cli {
    /// Output format from the flags, if any were given
    pub fn output_format(&self) -> Option<OutputFormat> {
        if self.json {
            Some(OutputFormat::Json)
        } else if self.csv {
            Some(OutputFormat::Csv)
        } else {
            self.format
        }
    }
}
