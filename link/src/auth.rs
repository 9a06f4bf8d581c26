//! Token lifecycle for the DACP SQL service.
//!
//! [`AuthManager`] owns the session as an immutable [`SessionSnapshot`]
//! behind an `Arc`; a login or invalidation swaps the whole snapshot, so
//! readers never observe a token without its expiry or engine URL.

use crate::error::{DacpLinkError, Result};
use crate::models::result_code::describe_failure;
use crate::models::{LoginRequest, LoginResponse};
use crate::transport::{Transport, LOGIN_PATH};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Default token lifetime requested at login, in seconds
pub const DEFAULT_TOKEN_EXPIRY_SECS: u64 = 3600;

/// Login credentials, fixed for the lifetime of a client.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub requested_expiry_seconds: u64,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            database: None,
            requested_expiry_seconds: DEFAULT_TOKEN_EXPIRY_SECS,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_expiry_seconds(mut self, seconds: u64) -> Self {
        self.requested_expiry_seconds = seconds;
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("requested_expiry_seconds", &self.requested_expiry_seconds)
            .finish()
    }
}

/// Point-in-time view of the session.
#[derive(Clone, Default)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    /// Base URL of the delegated engine, as reported at login
    pub delegated_engine_url: Option<String>,
    pub user: Option<String>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// True once the locally computed expiry has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry.map(|exp| exp <= now).unwrap_or(false)
    }
}

impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("token_expiry", &self.token_expiry)
            .field("delegated_engine_url", &self.delegated_engine_url)
            .field("user", &self.user)
            .finish()
    }
}

/// Obtains, caches and invalidates the access token.
pub struct AuthManager {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    session: RwLock<Arc<SessionSnapshot>>,
    request_timeout: Option<Duration>,
}

impl AuthManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            credentials,
            session: RwLock::new(Arc::new(SessionSnapshot::default())),
            request_timeout,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current session snapshot
    pub fn session(&self) -> Arc<SessionSnapshot> {
        self.session.read().clone()
    }

    /// Token of the current session, logging in first when there is none
    pub async fn ensure_authenticated(&self) -> Result<String> {
        if let Some(token) = self.session().access_token.clone() {
            return Ok(token);
        }
        self.login().await
    }

    /// Drop the token; the next [`ensure_authenticated`](Self::ensure_authenticated) logs in again
    pub fn invalidate(&self) {
        let mut session = self.session.write();
        if session.access_token.is_some() {
            debug!("[DACP_LOGIN] Invalidating session token for user '{}'", self.credentials.user);
        }
        let cleared = SessionSnapshot {
            access_token: None,
            token_expiry: None,
            ..SessionSnapshot::clone(&session)
        };
        *session = Arc::new(cleared);
    }

    /// Invalidate and log in again
    pub async fn relogin(&self) -> Result<String> {
        self.invalidate();
        self.login().await
    }

    /// Whether the locally computed expiry has passed.
    ///
    /// Informational only: the server decides, via code `700`.
    pub fn is_token_expired(&self) -> bool {
        self.session().is_expired_at(Utc::now())
    }

    async fn login(&self) -> Result<String> {
        let request = LoginRequest {
            user: self.credentials.user.clone(),
            pwd: self.credentials.password.clone(),
            database: self.credentials.database.clone(),
            expires: self.credentials.requested_expiry_seconds,
        };
        let body = serde_json::to_value(&request)?;

        debug!(
            "[DACP_LOGIN] Authenticating user '{}' database={:?}",
            request.user, request.database
        );

        let response = match self.fetch_login(&body).await {
            Ok(response) => response,
            Err(e) => {
                warn!("[DACP_LOGIN] Login request failed: {}", e);
                self.invalidate();
                return Err(e);
            }
        };

        if !response.code.is_success() {
            let message = describe_failure(&response.code, &[response.msg.as_deref()]);
            warn!("[DACP_LOGIN] Login rejected: code={} msg=\"{}\"", response.code, message);
            self.invalidate();
            return Err(DacpLinkError::AuthenticationError(format!(
                "[{}] {}",
                response.code, message
            )));
        }

        if response.access_token.is_empty() {
            self.invalidate();
            return Err(DacpLinkError::AuthenticationError(
                "login succeeded but no access token was returned".to_string(),
            ));
        }

        let granted = if response.expires > 0 {
            response.expires
        } else {
            self.credentials.requested_expiry_seconds
        };
        let token_expiry = i64::try_from(granted)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        let user = if response.user.is_empty() {
            self.credentials.user.clone()
        } else {
            response.user.clone()
        };

        let token = response.access_token;
        *self.session.write() = Arc::new(SessionSnapshot {
            access_token: Some(token.clone()),
            token_expiry,
            delegated_engine_url: response.olk_url.filter(|url| !url.is_empty()),
            user: Some(user),
        });

        debug!(
            "[DACP_LOGIN] Authenticated user '{}' token_expiry={:?}",
            self.credentials.user, token_expiry
        );
        Ok(token)
    }

    async fn fetch_login(&self, body: &serde_json::Value) -> Result<LoginResponse> {
        let reply = self
            .transport
            .post_json(LOGIN_PATH, body, self.request_timeout)
            .await
            .map_err(as_auth_error)?;
        reply.json::<LoginResponse>().map_err(as_auth_error)
    }
}

/// Transport failures at login surface as authentication failures
fn as_auth_error(err: DacpLinkError) -> DacpLinkError {
    match err {
        DacpLinkError::TransportError { status: Some(status), message } => {
            DacpLinkError::AuthenticationError(format!("Login failed (HTTP {}): {}", status, message))
        }
        DacpLinkError::TransportError { status: None, message } => {
            DacpLinkError::AuthenticationError(format!("Login failed: {}", message))
        }
        other => other,
    }
}
