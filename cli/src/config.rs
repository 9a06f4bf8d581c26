//! Configuration file management
//!
//! CLIConfiguration with TOML parsing for ~/.dacp/config.toml
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "http://localhost:8080"  # DACP SQL service URL
//! connection_timeout = 10        # TCP + TLS handshake, seconds
//! receive_timeout = 30           # per HTTP request, seconds
//!
//! [auth]
//! user = "alice"
//! password = "secret"
//! database = "sales"
//! token_expiry = 3600            # requested token lifetime, seconds
//!
//! [cursor]
//! page_size = 1000
//! task_timeout = 30              # whole-task budget, seconds (0 = none)
//! request_interval_ms = 1000     # pause between page requests
//!
//! [ui]
//! format = "table"               # table, json, csv
//! ```

use dacp_link::DacpLinkTimeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CLIError, Result};

const DEFAULT_CONFIG_PATH: &str = "~/.dacp/config.toml";

/// CLI configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CLIConfiguration {
    /// Server connection settings
    pub server: Option<ServerConfig>,

    /// Login settings
    pub auth: Option<AuthConfig>,

    /// Result paging settings
    pub cursor: Option<CursorConfig>,

    /// UI preferences
    pub ui: Option<UIConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Service URL (e.g., http://localhost:8080)
    pub url: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Per-request receive timeout in seconds
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,

    /// Requested token lifetime in seconds
    #[serde(default = "default_token_expiry")]
    pub token_expiry: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Whole-task budget in seconds, 0 disables it
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,

    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UIConfig {
    /// Output format: table, json, csv
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_receive_timeout() -> u64 {
    30
}

fn default_token_expiry() -> u64 {
    3600
}

fn default_page_size() -> u32 {
    1000
}

fn default_task_timeout() -> u64 {
    30
}

fn default_request_interval_ms() -> u64 {
    1000
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for CLIConfiguration {
    fn default() -> Self {
        Self {
            server: Some(ServerConfig {
                url: Some("http://localhost:8080".to_string()),
                connection_timeout: default_connection_timeout(),
                receive_timeout: default_receive_timeout(),
            }),
            auth: None,
            cursor: Some(CursorConfig {
                page_size: default_page_size(),
                task_timeout: default_task_timeout(),
                request_interval_ms: default_request_interval_ms(),
            }),
            ui: Some(UIConfig {
                format: default_format(),
            }),
        }
    }
}

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or(DEFAULT_CONFIG_PATH);
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

impl CLIConfiguration {
    /// Load configuration from file
    ///
    /// Returns default configuration if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_config_path(path);
        let path = &expanded_path;

        if !path.exists() {
            log::debug!("[DACP_CLI] No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            CLIError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;

        let config: CLIConfiguration = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Build DacpLinkTimeouts from the [server] and [cursor] sections
    pub fn to_timeouts(&self) -> DacpLinkTimeouts {
        let server = self.resolved_server();
        let cursor = self.resolved_cursor();

        DacpLinkTimeouts::builder()
            .connection_timeout_secs(server.connection_timeout)
            .receive_timeout_secs(server.receive_timeout)
            .task_timeout_secs(cursor.task_timeout)
            .request_interval_millis(cursor.request_interval_ms)
            .build()
    }

    pub fn resolved_server(&self) -> ServerConfig {
        self.server.clone().unwrap_or(ServerConfig {
            url: None,
            connection_timeout: default_connection_timeout(),
            receive_timeout: default_receive_timeout(),
        })
    }

    pub fn resolved_auth(&self) -> AuthConfig {
        self.auth.clone().unwrap_or(AuthConfig {
            token_expiry: default_token_expiry(),
            ..AuthConfig::default()
        })
    }

    pub fn resolved_cursor(&self) -> CursorConfig {
        self.cursor.clone().unwrap_or(CursorConfig {
            page_size: default_page_size(),
            task_timeout: default_task_timeout(),
            request_interval_ms: default_request_interval_ms(),
        })
    }

    pub fn resolved_ui(&self) -> UIConfig {
        self.ui.clone().unwrap_or(UIConfig {
            format: default_format(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = CLIConfiguration::default();
        assert_eq!(
            config.server.as_ref().unwrap().url,
            Some("http://localhost:8080".to_string())
        );
        assert_eq!(config.resolved_cursor().page_size, 1000);
        assert_eq!(config.resolved_auth().token_expiry, 3600);
        assert_eq!(config.resolved_ui().format, "table");
    }

    #[test]
    fn test_config_serialization() {
        let config = CLIConfiguration::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("[server]"));
        assert!(toml.contains("url"));
        assert!(toml.contains("[cursor]"));
        assert!(toml.contains("page_size"));
    }

    #[test]
    fn test_to_timeouts() {
        let timeouts = CLIConfiguration::default().to_timeouts();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.receive_timeout, Duration::from_secs(30));
        assert_eq!(timeouts.task_timeout, Duration::from_secs(30));
        assert_eq!(timeouts.request_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CLIConfiguration::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.resolved_cursor().page_size, 1000);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nurl = \"https://dacp.example\"\n\n[auth]\nuser = \"bob\"\n\n[cursor]\npage_size = 50\n",
        )
        .unwrap();

        let config = CLIConfiguration::load(&path).unwrap();
        let server = config.resolved_server();
        assert_eq!(server.url.as_deref(), Some("https://dacp.example"));
        assert_eq!(server.receive_timeout, 30);

        let auth = config.resolved_auth();
        assert_eq!(auth.user.as_deref(), Some("bob"));
        assert_eq!(auth.password, None);
        assert_eq!(auth.token_expiry, 3600);

        let cursor = config.resolved_cursor();
        assert_eq!(cursor.page_size, 50);
        assert_eq!(cursor.request_interval_ms, 1000);

        assert!(config.ui.is_none());
        assert_eq!(config.resolved_ui().format, "table");
    }

    #[test]
    fn test_zero_task_timeout_disables_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cursor]\ntask_timeout = 0\n").unwrap();

        let config = CLIConfiguration::load(&path).unwrap();
        assert_eq!(config.resolved_cursor().task_timeout, 0);
        assert!(DacpLinkTimeouts::is_no_timeout(config.to_timeouts().task_timeout));
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cursor\npage_size = ").unwrap();

        match CLIConfiguration::load(&path) {
            Err(CLIError::ConfigurationError(msg)) => assert!(msg.contains("TOML")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
