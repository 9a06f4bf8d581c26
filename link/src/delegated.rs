//! Hand-off to the delegated query engine.
//!
//! When the server answers a statement with result type `olk`, it has
//! rewritten the SQL for an external distributed engine. The engine's own
//! streaming client lives outside this crate and is plugged in through
//! [`DelegatedEngine`].

use crate::coerce::Row;
use crate::error::{DacpLinkError, Result};
use crate::models::Column;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything the delegated engine needs to run a query as the current user
#[derive(Clone)]
pub struct DelegatedSession {
    /// Engine base URL reported at login (`olkURL`)
    pub engine_url: Option<String>,
    pub user: String,
    pub database: Option<String>,
    pub access_token: String,
    pub user_agent: String,
}

impl std::fmt::Debug for DelegatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedSession")
            .field("engine_url", &self.engine_url)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("access_token", &"***")
            .finish()
    }
}

/// Client of an external query engine.
///
/// # Example
///
/// ```rust
/// use dacp_link::{BufferedRows, DelegatedEngine, DelegatedRows, DelegatedSession, Result};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl DelegatedEngine for Echo {
///     async fn start_query(
///         &self,
///         _session: &DelegatedSession,
///         sql: &str,
///     ) -> Result<Box<dyn DelegatedRows>> {
///         println!("running {}", sql);
///         Ok(Box::new(BufferedRows::new(Vec::new(), Vec::new())))
///     }
/// }
/// ```
#[async_trait]
pub trait DelegatedEngine: Send + Sync {
    /// Start `sql` (already rewritten by the server) and return its rows
    async fn start_query(&self, session: &DelegatedSession, sql: &str) -> Result<Box<dyn DelegatedRows>>;
}

/// Row stream produced by a [`DelegatedEngine`]
#[async_trait]
pub trait DelegatedRows: Send {
    /// Result columns, once the engine knows them
    fn columns(&self) -> Vec<Column>;

    async fn next_row(&mut self) -> Option<Result<Row>>;
}

/// In-memory [`DelegatedRows`], for engines that materialise their results
#[derive(Debug, Clone, Default)]
pub struct BufferedRows {
    columns: Vec<Column>,
    rows: VecDeque<Row>,
}

impl BufferedRows {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }
}

#[async_trait]
impl DelegatedRows for BufferedRows {
    fn columns(&self) -> Vec<Column> {
        self.columns.clone()
    }

    async fn next_row(&mut self) -> Option<Result<Row>> {
        self.rows.pop_front().map(Ok)
    }
}

/// Result of a statement handed to the delegated engine
pub struct DelegatedResult {
    task_id: String,
    sql: String,
    rows: Box<dyn DelegatedRows>,
    closed: Arc<AtomicBool>,
    failed: bool,
}

impl DelegatedResult {
    pub(crate) fn new(
        task_id: String,
        sql: String,
        rows: Box<dyn DelegatedRows>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            task_id,
            sql,
            rows,
            closed,
            failed: false,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// The SQL the engine is running (the server's rewrite)
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> Vec<Column> {
        self.rows.columns()
    }

    /// Next row from the engine; ends once the client is closed
    pub async fn next(&mut self) -> Option<Result<Row>> {
        if self.failed || self.closed.load(Ordering::SeqCst) {
            return None;
        }
        match self.rows.next_row().await? {
            Ok(row) => Some(Ok(row)),
            Err(e) => {
                self.failed = true;
                Some(Err(as_engine_error(e)))
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
}

impl std::fmt::Debug for DelegatedResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedResult")
            .field("task_id", &self.task_id)
            .field("sql", &self.sql)
            .finish()
    }
}

/// Failures inside the engine surface as [`DacpLinkError::DelegatedEngineError`]
pub(crate) fn as_engine_error(err: DacpLinkError) -> DacpLinkError {
    match err {
        e @ (DacpLinkError::DelegatedEngineError(_) | DacpLinkError::Closed) => e,
        other => DacpLinkError::DelegatedEngineError(other.to_string()),
    }
}
