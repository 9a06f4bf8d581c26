//! HTTP transport for the three DACP endpoints.
//!
//! Everything above this module speaks in terms of [`Transport::post_json`],
//! so the protocol engine can be driven by a scripted transport in tests.

use crate::error::{DacpLinkError, Result};
use crate::timeouts::DacpLinkTimeouts;
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};

pub const LOGIN_PATH: &str = "/sql/login";
pub const EXECUTE_PATH: &str = "/sql/execute";
pub const RESULT_PATH: &str = "/sql/getResult";

const CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Status and raw body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200` reply carrying `body` serialized as JSON
    pub fn ok_json(body: &JsonValue) -> Self {
        Self::new(200, body.to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body of a `200` reply.
    ///
    /// Non-200 statuses, empty bodies and unparseable bodies all become
    /// [`DacpLinkError::TransportError`]; callers re-map them per endpoint.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_ok() {
            return Err(DacpLinkError::transport(
                Some(self.status),
                format!("unexpected HTTP status: {}", preview(&self.body)),
            ));
        }
        if self.body.trim().is_empty() {
            return Err(DacpLinkError::transport(Some(self.status), "empty response body"));
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Carries a JSON POST to a DACP endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `path` (relative to the server base URL).
    ///
    /// `timeout` bounds this one exchange; `None` uses the transport default.
    async fn post_json(
        &self,
        path: &str,
        body: &JsonValue,
        timeout: Option<Duration>,
    ) -> Result<HttpReply>;
}

/// [`Transport`] over `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeouts: &DacpLinkTimeouts) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(DacpLinkError::ConfigurationError(format!(
                "base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let mut client_builder = reqwest::Client::builder()
            .user_agent(user_agent())
            .connect_timeout(timeouts.connection_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));
        if !DacpLinkTimeouts::is_no_timeout(timeouts.receive_timeout) {
            client_builder = client_builder.timeout(timeouts.receive_timeout);
        }

        let http_client = client_builder
            .build()
            .map_err(|e| DacpLinkError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &JsonValue,
        timeout: Option<Duration>,
    ) -> Result<HttpReply> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body.to_string());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(
            "[DACP_HTTP] POST {} status={} bytes={} duration_ms={}",
            path,
            status,
            body.len(),
            start.elapsed().as_millis()
        );

        Ok(HttpReply { status, body })
    }
}

/// `User-Agent` sent with every request
pub fn user_agent() -> String {
    format!("dacp-link/{}", crate::VERSION)
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        format!("{}...", trimmed.chars().take(200).collect::<String>())
    } else if trimmed.is_empty() {
        "<empty body>".to_string()
    } else {
        trimmed.to_string()
    }
}
