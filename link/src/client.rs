//! Main DACP client with builder pattern.
//!
//! Ties authentication, submission and the three result paths together:
//! direct results come back whole, cursor results as a lazy [`RowStream`],
//! delegated results from the configured [`DelegatedEngine`].

use crate::{
    auth::{AuthManager, Credentials, SessionSnapshot, DEFAULT_TOKEN_EXPIRY_SECS},
    coerce::{self, Row},
    cursor::{CursorPager, RowStream, DEFAULT_PAGE_SIZE},
    delegated::{as_engine_error, DelegatedEngine, DelegatedResult, DelegatedSession},
    error::{DacpLinkError, Result},
    execute::{sql_preview, ExecuteManager},
    models::{ExecuteOutcome, PageResult, ResultMode},
    timeouts::DacpLinkTimeouts,
    transport::{user_agent, HttpTransport, Transport},
};
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Where the client is in the statement lifecycle.
///
/// With several statements in flight this reflects the most recent
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeState {
    Unauthenticated,
    Authenticated,
    Submitted,
    DirectReady,
    CursorStreaming,
    DelegatedHandoff,
    Closed,
}

/// Results of one statement, by delivery mode
#[derive(Debug)]
pub enum ResultHandle {
    /// Complete result, already coerced
    Direct(PageResult),
    /// Lazily paged cursor
    Cursor(RowStream),
    /// Rows produced by the delegated engine
    Delegated(DelegatedResult),
}

impl ResultHandle {
    pub fn mode(&self) -> ResultMode {
        match self {
            Self::Direct(_) => ResultMode::Direct,
            Self::Cursor(_) => ResultMode::Cursor,
            Self::Delegated(_) => ResultMode::Delegated,
        }
    }

    /// Drain every remaining row, whatever the mode
    pub async fn collect_rows(self) -> Result<Vec<Row>> {
        match self {
            Self::Direct(page) => Ok(page.rows),
            Self::Cursor(stream) => stream.collect_rows().await,
            Self::Delegated(result) => result.collect_rows().await,
        }
    }
}

/// Main DACP client.
///
/// Cheap to clone; clones share the session, so a re-login on one is seen
/// by all.
///
/// # Examples
///
/// ```rust,no_run
/// use dacp_link::{DacpLinkClient, ResultHandle};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DacpLinkClient::builder()
///     .base_url("http://localhost:8080")
///     .user("alice")
///     .password("secret")
///     .database("sales")
///     .build()?;
///
/// match client.run_query("SELECT * FROM orders").await? {
///     ResultHandle::Direct(page) => println!("{} rows", page.row_count()),
///     ResultHandle::Cursor(mut rows) => {
///         while let Some(row) = rows.next().await {
///             println!("{:?}", row?);
///         }
///     }
///     ResultHandle::Delegated(result) => println!("delegated: {}", result.sql()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DacpLinkClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    auth: Arc<AuthManager>,
    executor: ExecuteManager,
    pager: CursorPager,
    delegated_engine: Option<Arc<dyn DelegatedEngine>>,
    page_size: u32,
    timeouts: DacpLinkTimeouts,
    state: Mutex<FacadeState>,
    closed: Arc<AtomicBool>,
}

impl DacpLinkClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> DacpLinkClientBuilder {
        DacpLinkClientBuilder::new()
    }

    /// Run `sql` and return its results in whichever mode the server chose.
    ///
    /// Logs in first when the session has no token. A rejected statement is
    /// an [`DacpLinkError::ExecutionError`] carrying the server's code and
    /// detail; the client stays usable for the next statement.
    pub async fn run_query(&self, sql: &str) -> Result<ResultHandle> {
        self.ensure_open()?;
        let (outcome, token, started_at) = self.submit_with_token(sql).await?;

        let handle = match outcome.result_mode {
            ResultMode::Direct => self.direct_result(&outcome, &token, started_at).await,
            ResultMode::Cursor => Ok(self.cursor_result(&outcome, token, started_at)),
            ResultMode::Delegated => self.delegated_result(&outcome, token, sql).await,
        };
        let handle = handle.map_err(|e| self.fail(e))?;

        if self.is_closed() {
            return Err(DacpLinkError::Closed);
        }
        self.set_state(match handle.mode() {
            ResultMode::Direct => FacadeState::DirectReady,
            ResultMode::Cursor => FacadeState::CursorStreaming,
            ResultMode::Delegated => FacadeState::DelegatedHandoff,
        });
        Ok(handle)
    }

    /// Log in (if needed) and submit `sql`, without fetching any results
    pub async fn submit(&self, sql: &str) -> Result<ExecuteOutcome> {
        self.submit_with_token(sql).await.map(|(outcome, _, _)| outcome)
    }

    /// Also returns the token used and the submission instant, where the
    /// task deadline starts
    async fn submit_with_token(&self, sql: &str) -> Result<(ExecuteOutcome, String, Instant)> {
        self.ensure_open()?;
        debug!("[DACP_CLIENT] Submitting: \"{}\"", sql_preview(sql));

        let token = self.login().await?;

        let started_at = Instant::now();
        let outcome = match self.inner.executor.submit(sql, &token).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(e)),
        };
        self.ensure_open()?;
        self.set_state(FacadeState::Submitted);
        Ok((outcome, token, started_at))
    }

    /// Token of the current session, logging in when there is none
    pub async fn login(&self) -> Result<String> {
        self.ensure_open()?;
        let token = self.inner.auth.ensure_authenticated().await?;
        self.ensure_open()?;
        {
            let mut state = self.inner.state.lock();
            if *state == FacadeState::Unauthenticated {
                *state = FacadeState::Authenticated;
            }
        }
        Ok(token)
    }

    /// Fetch a single cursor page directly, without polling or re-login
    pub async fn fetch_page(&self, task_id: &str, page_num: u32, page_size: u32) -> Result<PageResult> {
        self.ensure_open()?;
        let token = self.login().await?;
        self.inner
            .pager
            .fetch_page(task_id, ResultMode::Cursor, page_num, page_size, &token)
            .await
    }

    /// Close the client.
    ///
    /// Nothing is sent to the server. Streams handed out earlier end at
    /// their next pull, and every later call fails with
    /// [`DacpLinkError::Closed`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("[DACP_CLIENT] Closing client for {}", self.inner.base_url);
        self.inner.auth.invalidate();
        *self.inner.state.lock() = FacadeState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> FacadeState {
        *self.inner.state.lock()
    }

    /// Current session snapshot (token, expiry, delegated engine URL)
    pub fn session(&self) -> Arc<SessionSnapshot> {
        self.inner.auth.session()
    }

    pub fn auth(&self) -> &AuthManager {
        &self.inner.auth
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    /// Get the configured timeouts
    pub fn timeouts(&self) -> &DacpLinkTimeouts {
        &self.inner.timeouts
    }

    async fn direct_result(
        &self,
        outcome: &ExecuteOutcome,
        token: &str,
        started_at: Instant,
    ) -> Result<ResultHandle> {
        let page = match &outcome.inline_result {
            Some(inline) => {
                let rows = coerce::fix(&inline.schema, &inline.data)?;
                let total = inline.total.unwrap_or(rows.len() as u64);
                PageResult {
                    rows,
                    schema: inline.schema.clone(),
                    page_num: 1,
                    page_size: self.inner.page_size,
                    total,
                }
            }
            None => {
                debug!(
                    "[DACP_CLIENT] Direct result for task_id={} not inlined; fetching",
                    outcome.task_id
                );
                self.inner
                    .pager
                    .fetch_direct(&outcome.task_id, self.inner.page_size, token, started_at)
                    .await?
            }
        };
        Ok(ResultHandle::Direct(page))
    }

    fn cursor_result(&self, outcome: &ExecuteOutcome, token: String, started_at: Instant) -> ResultHandle {
        ResultHandle::Cursor(self.inner.pager.consume(
            outcome.task_id.clone(),
            ResultMode::Cursor,
            self.inner.page_size,
            token,
            started_at,
        ))
    }

    async fn delegated_result(
        &self,
        outcome: &ExecuteOutcome,
        token: String,
        original_sql: &str,
    ) -> Result<ResultHandle> {
        let engine = self.inner.delegated_engine.clone().ok_or_else(|| {
            DacpLinkError::DelegatedEngineError(
                "server delegated the statement but no delegated engine is configured".to_string(),
            )
        })?;
        let sql = outcome.delegated_sql.clone().ok_or_else(|| {
            DacpLinkError::DelegatedEngineError("delegated result without rewritten SQL".to_string())
        })?;

        let snapshot = self.inner.auth.session();
        let credentials = self.inner.auth.credentials();
        let session = DelegatedSession {
            engine_url: snapshot.delegated_engine_url.clone(),
            user: snapshot.user.clone().unwrap_or_else(|| credentials.user.clone()),
            database: credentials.database.clone(),
            access_token: token,
            user_agent: user_agent(),
        };

        debug!(
            "[DACP_CLIENT] Delegating task_id={} engine={:?}: \"{}\" (submitted: \"{}\")",
            outcome.task_id,
            session.engine_url,
            sql_preview(&sql),
            sql_preview(original_sql)
        );
        let rows = engine
            .start_query(&session, &sql)
            .await
            .map_err(as_engine_error)?;

        Ok(ResultHandle::Delegated(DelegatedResult::new(
            outcome.task_id.clone(),
            sql,
            rows,
            self.inner.closed.clone(),
        )))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DacpLinkError::Closed);
        }
        Ok(())
    }

    fn set_state(&self, next: FacadeState) {
        let mut state = self.inner.state.lock();
        if *state != FacadeState::Closed {
            *state = next;
        }
    }

    /// Record a failed statement and pass the error through
    fn fail(&self, err: DacpLinkError) -> DacpLinkError {
        if self.is_closed() {
            return DacpLinkError::Closed;
        }
        let next = if self.inner.auth.session().is_authenticated() {
            FacadeState::Authenticated
        } else {
            FacadeState::Unauthenticated
        };
        self.set_state(next);
        err
    }
}

/// Builder for configuring [`DacpLinkClient`] instances.
pub struct DacpLinkClientBuilder {
    base_url: Option<String>,
    user: Option<String>,
    password: String,
    database: Option<String>,
    token_expiry_secs: u64,
    page_size: u32,
    timeouts: DacpLinkTimeouts,
    delegated_engine: Option<Arc<dyn DelegatedEngine>>,
    transport: Option<Arc<dyn Transport>>,
}

impl DacpLinkClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            user: None,
            password: String::new(),
            database: None,
            token_expiry_secs: DEFAULT_TOKEN_EXPIRY_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            timeouts: DacpLinkTimeouts::default(),
            delegated_engine: None,
            transport: None,
        }
    }

    /// Set the base URL for the DACP server
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Database the session is bound to
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Token lifetime requested at login
    pub fn token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry_secs = expiry.as_secs();
        self
    }

    /// Rows per cursor page (must be > 0)
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set comprehensive timeout configuration for all operations
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use dacp_link::{DacpLinkClient, DacpLinkTimeouts};
    ///
    /// # fn example() -> dacp_link::Result<()> {
    /// let client = DacpLinkClient::builder()
    ///     .base_url("http://localhost:8080")
    ///     .user("alice")
    ///     .timeouts(DacpLinkTimeouts::fast())
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn timeouts(mut self, timeouts: DacpLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Engine that runs statements the server delegates
    pub fn delegated_engine(mut self, engine: Arc<dyn DelegatedEngine>) -> Self {
        self.delegated_engine = Some(engine);
        self
    }

    /// Replace the HTTP transport (for proxies, custom TLS, or tests)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<DacpLinkClient> {
        let user = self
            .user
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| DacpLinkError::ConfigurationError("user is required".into()))?;
        if self.page_size == 0 {
            return Err(DacpLinkError::ConfigurationError(
                "page_size must be greater than 0".into(),
            ));
        }

        let (base_url, transport): (String, Arc<dyn Transport>) = match (self.base_url, self.transport) {
            (base_url, Some(transport)) => (base_url.unwrap_or_default(), transport),
            (Some(base_url), None) => {
                let http = HttpTransport::new(base_url, &self.timeouts)?;
                (http.base_url().to_string(), Arc::new(http) as Arc<dyn Transport>)
            }
            (None, None) => {
                return Err(DacpLinkError::ConfigurationError("base_url is required".into()))
            }
        };

        let request_timeout = if DacpLinkTimeouts::is_no_timeout(self.timeouts.receive_timeout) {
            None
        } else {
            Some(self.timeouts.receive_timeout)
        };

        let mut credentials = Credentials::new(user, self.password).with_expiry_seconds(self.token_expiry_secs);
        credentials.database = self.database;

        let closed = Arc::new(AtomicBool::new(false));
        let auth = Arc::new(AuthManager::new(transport.clone(), credentials, request_timeout));
        let executor = ExecuteManager::new(transport.clone(), auth.clone(), request_timeout);
        let pager = CursorPager::new(transport, auth.clone(), self.timeouts.clone(), closed.clone());

        debug!(
            "[DACP_CLIENT] Built client base_url={} page_size={} delegated_engine={}",
            base_url,
            self.page_size,
            self.delegated_engine.is_some()
        );

        Ok(DacpLinkClient {
            inner: Arc::new(ClientInner {
                base_url,
                auth,
                executor,
                pager,
                delegated_engine: self.delegated_engine,
                page_size: self.page_size,
                timeouts: self.timeouts,
                state: Mutex::new(FacadeState::Unauthenticated),
                closed,
            }),
        })
    }
}
