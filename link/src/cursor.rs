//! Paginated result retrieval from `/sql/getResult`.
//!
//! A [`RowStream`] is pull-driven: nothing is requested until the caller
//! asks for the next row or page, and the stream suspends just before each
//! page request. Dropping the stream stops paging; the server is not told.

use crate::auth::AuthManager;
use crate::coerce::{self, Row};
use crate::error::{DacpLinkError, Result};
use crate::models::result_code::describe_failure;
use crate::models::{Column, PageRequest, PageResponse, PageResult, ResultCode, ResultMode};
use crate::timeouts::DacpLinkTimeouts;
use crate::transport::{Transport, RESULT_PATH};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default rows per page
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Fetches result pages for submitted tasks.
#[derive(Clone)]
pub struct CursorPager {
    transport: Arc<dyn Transport>,
    auth: Arc<AuthManager>,
    timeouts: DacpLinkTimeouts,
    closed: Arc<AtomicBool>,
}

impl CursorPager {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<AuthManager>,
        timeouts: DacpLinkTimeouts,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            auth,
            timeouts,
            closed,
        }
    }

    /// Fetch and coerce exactly one page.
    ///
    /// No polling and no re-login: any code other than `000` is returned as
    /// a [`DacpLinkError::CursorError`].
    pub async fn fetch_page(
        &self,
        task_id: &str,
        mode: ResultMode,
        page_num: u32,
        page_size: u32,
        access_token: &str,
    ) -> Result<PageResult> {
        let request = PageRequest {
            task_id: task_id.to_string(),
            result_mode: mode,
            access_token: access_token.to_string(),
            page_num,
            page_size,
        };
        let response = self.request(&request, None).await?;
        let code = response.effective_code();
        if !code.is_success() {
            let message = describe_failure(&code, &[response.msg.as_deref()]);
            return Err(DacpLinkError::cursor(code, message));
        }
        let schema = response.schema.clone().unwrap_or_default();
        build_page(&response, schema, page_num, page_size)
    }

    /// Lazily consume every page of `task_id`, starting at page 1.
    ///
    /// `started_at` is the submission time; the task deadline is measured
    /// from it.
    pub fn consume(
        &self,
        task_id: impl Into<String>,
        mode: ResultMode,
        page_size: u32,
        access_token: impl Into<String>,
        started_at: Instant,
    ) -> RowStream {
        let deadline = if DacpLinkTimeouts::is_no_timeout(self.timeouts.task_timeout) {
            None
        } else {
            Some(started_at + self.timeouts.task_timeout)
        };

        RowStream {
            pager: self.clone(),
            task_id: task_id.into(),
            mode,
            page_size: page_size.max(1),
            access_token: access_token.into(),
            deadline,
            next_page_num: 1,
            total: None,
            schema: Vec::new(),
            last_request_at: None,
            buffered: VecDeque::new(),
            done: false,
            pages_fetched: 0,
        }
    }

    /// Whole result of a direct-mode task, as a single page 1 fetch
    pub(crate) async fn fetch_direct(
        &self,
        task_id: &str,
        page_size: u32,
        access_token: &str,
        started_at: Instant,
    ) -> Result<PageResult> {
        let mut stream = self.consume(task_id, ResultMode::Direct, page_size, access_token, started_at);
        match stream.next_page().await {
            Some(page) => page,
            None if self.is_closed() => Err(DacpLinkError::Closed),
            None => Ok(PageResult {
                rows: Vec::new(),
                schema: Vec::new(),
                page_num: 1,
                page_size,
                total: 0,
            }),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn request(&self, request: &PageRequest, timeout: Option<Duration>) -> Result<PageResponse> {
        let body = serde_json::to_value(request)?;
        let reply = self.transport.post_json(RESULT_PATH, &body, timeout).await?;
        reply.json::<PageResponse>()
    }
}

fn build_page(
    response: &PageResponse,
    schema: Vec<Column>,
    page_num: u32,
    page_size: u32,
) -> Result<PageResult> {
    let rows = match &response.data {
        Some(data) => coerce::fix(&schema, data)?,
        None => Vec::new(),
    };
    Ok(PageResult {
        rows,
        schema,
        page_num,
        page_size,
        total: response.total,
    })
}

/// Single-pass stream over the rows of one task.
///
/// Yields rows already coerced, then ends. After an error it yields that
/// error once and then `None`.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example(mut rows: dacp_link::RowStream) -> dacp_link::Result<()> {
/// while let Some(row) = rows.next().await {
///     let row = row?;
///     println!("{:?}", row);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RowStream {
    pager: CursorPager,
    task_id: String,
    mode: ResultMode,
    page_size: u32,
    access_token: String,
    deadline: Option<Instant>,
    next_page_num: u32,
    total: Option<u64>,
    schema: Vec<Column>,
    last_request_at: Option<Instant>,
    buffered: VecDeque<Row>,
    done: bool,
    pages_fetched: u32,
}

impl RowStream {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Schema of the most recent page (empty before the first page)
    pub fn schema(&self) -> &[Column] {
        &self.schema
    }

    /// Total row count reported by the server, once known
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Next row, fetching the next page when the current one is used up
    pub async fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Some(Ok(row));
            }
            match self.next_page().await? {
                Ok(page) => self.buffered.extend(page.rows),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Next whole page. Rows already buffered by [`next`](Self::next) are
    /// not repeated here.
    pub async fn next_page(&mut self) -> Option<Result<PageResult>> {
        if self.done || self.pager.is_closed() {
            return None;
        }
        let result = self.advance().await;
        match result {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                warn!("[DACP_CURSOR] task_id={} stopped: {}", self.task_id, e);
                self.done = true;
                Some(Err(e))
            }
        }
    }

    /// Drain the remaining rows into memory
    pub async fn collect_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    async fn advance(&mut self) -> Result<Option<PageResult>> {
        let page_num = self.next_page_num;
        let mut refreshed = false;

        loop {
            self.wait_for_slot().await?;
            if self.pager.is_closed() {
                return Ok(None);
            }

            let request = PageRequest {
                task_id: self.task_id.clone(),
                result_mode: self.mode,
                access_token: self.access_token.clone(),
                page_num,
                page_size: self.page_size,
            };
            debug!(
                "[DACP_CURSOR] Requesting task_id={} page={} size={}",
                self.task_id, page_num, self.page_size
            );
            let response = self.request_within_deadline(&request).await?;
            let code = response.effective_code();

            match code {
                ResultCode::Success => {}
                ResultCode::Running => {
                    debug!("[DACP_CURSOR] task_id={} page={} not ready", self.task_id, page_num);
                    continue;
                }
                ResultCode::TokenExpired if !refreshed => {
                    warn!(
                        "[DACP_CURSOR] Token expired on task_id={} page={}; logging in again",
                        self.task_id, page_num
                    );
                    self.access_token = self.pager.auth.relogin().await?;
                    refreshed = true;
                    continue;
                }
                other => {
                    let message = describe_failure(&other, &[response.msg.as_deref()]);
                    return Err(DacpLinkError::cursor(other, message));
                }
            }

            if response.page_num != 0 && response.page_num != page_num {
                return Err(DacpLinkError::cursor(
                    ResultCode::UnknownError,
                    format!("requested page {} but received page {}", page_num, response.page_num),
                ));
            }

            // A direct result is complete in one response
            if self.mode == ResultMode::Direct {
                return self.accept(&response, page_num, true).map(Some);
            }

            let row_count = response.row_count();
            let reached_end = u64::from(page_num) * u64::from(self.page_size) >= response.total;

            if row_count == 0 {
                if reached_end {
                    debug!(
                        "[DACP_CURSOR] task_id={} exhausted after {} pages (total={})",
                        self.task_id, self.pages_fetched, response.total
                    );
                    return Ok(None);
                }
                debug!(
                    "[DACP_CURSOR] task_id={} page={} empty before total={}, polling again",
                    self.task_id, page_num, response.total
                );
                continue;
            }

            if let Some(previous) = self.total {
                if previous != response.total {
                    return Err(DacpLinkError::cursor(
                        ResultCode::UnknownError,
                        format!("total changed from {} to {} mid-cursor", previous, response.total),
                    ));
                }
            }

            return self.accept(&response, page_num, reached_end).map(Some);
        }
    }

    fn accept(&mut self, response: &PageResponse, page_num: u32, last: bool) -> Result<PageResult> {
        if let Some(schema) = &response.schema {
            self.schema = schema.clone();
        }
        let page = build_page(response, self.schema.clone(), page_num, self.page_size)?;

        self.total = Some(response.total);
        self.pages_fetched += 1;
        self.next_page_num = page_num + 1;
        if last {
            self.done = true;
        }
        debug!(
            "[DACP_CURSOR] task_id={} page={} rows={} total={} last={}",
            self.task_id,
            page_num,
            page.row_count(),
            response.total,
            last
        );
        Ok(page)
    }

    /// Sleep until the request interval since the previous request has passed
    async fn wait_for_slot(&mut self) -> Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last_request_at {
            let ready_at = last + self.pager.timeouts.request_interval;
            if ready_at > now {
                if let Some(deadline) = self.deadline {
                    if ready_at >= deadline {
                        tokio::time::sleep_until(deadline).await;
                        return Err(self.timeout_error());
                    }
                }
                tokio::time::sleep_until(ready_at).await;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(self.timeout_error());
            }
        }
        self.last_request_at = Some(Instant::now());
        Ok(())
    }

    async fn request_within_deadline(&self, request: &PageRequest) -> Result<PageResponse> {
        let Some(deadline) = self.deadline else {
            return self.pager.request(request, None).await;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, self.pager.request(request, Some(remaining))).await {
            Ok(response) => response,
            Err(_) => Err(self.timeout_error()),
        }
    }

    fn timeout_error(&self) -> DacpLinkError {
        DacpLinkError::TimeoutError(format!(
            "task {} did not deliver page {} within {:?}",
            self.task_id, self.next_page_num, self.pager.timeouts.task_timeout
        ))
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("task_id", &self.task_id)
            .field("mode", &self.mode)
            .field("next_page_num", &self.next_page_num)
            .field("total", &self.total)
            .field("done", &self.done)
            .finish()
    }
}
