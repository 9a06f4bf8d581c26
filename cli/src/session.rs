//! Statement runner
//!
//! Wraps a [`DacpLinkClient`], drains whichever result handle the server
//! picked and hands the rows to the [`OutputFormatter`].

use clap::ValueEnum;
use dacp_link::{Column, DacpLinkClient, ResultHandle, ResultMode, Row};
use std::time::Instant;

use crate::error::Result;
use crate::formatter::OutputFormatter;

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    /// Parse the `[ui] format` config value
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Everything one statement produced
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub mode: ResultMode,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub took_ms: f64,
}

impl QueryOutput {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A connected CLI session
pub struct CLISession {
    client: DacpLinkClient,
    formatter: OutputFormatter,
}

impl CLISession {
    pub fn new(client: DacpLinkClient, format: OutputFormat) -> Self {
        Self {
            client,
            formatter: OutputFormatter::new(format),
        }
    }

    pub fn client(&self) -> &DacpLinkClient {
        &self.client
    }

    /// Run one statement and drain its result
    pub async fn query(&self, sql: &str) -> Result<QueryOutput> {
        let started = Instant::now();
        let handle = self.client.run_query(sql).await?;
        let mode = handle.mode();

        let (columns, rows) = match handle {
            ResultHandle::Direct(page) => (page.schema, page.rows),
            ResultHandle::Cursor(mut stream) => {
                let mut columns = Vec::new();
                let mut rows = Vec::new();
                while let Some(page) = stream.next_page().await {
                    let page = page?;
                    log::debug!(
                        "[DACP_CLI] task={} page={} rows={} total={}",
                        stream.task_id(),
                        page.page_num,
                        page.row_count(),
                        page.total
                    );
                    if columns.is_empty() {
                        columns = page.schema;
                    }
                    rows.extend(page.rows);
                }
                if columns.is_empty() {
                    columns = stream.schema().to_vec();
                }
                (columns, rows)
            }
            ResultHandle::Delegated(result) => {
                log::info!("[DACP_CLI] Delegated task={} sql={}", result.task_id(), result.sql());
                let columns = result.columns();
                (columns, result.collect_rows().await?)
            }
        };

        Ok(QueryOutput {
            mode,
            columns,
            rows,
            took_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Run one statement and print its result
    pub async fn execute(&self, sql: &str) -> Result<()> {
        let output = self.query(sql).await?;
        println!("{}", self.formatter.format_output(&output)?);
        Ok(())
    }

    /// Run every statement in a script, stopping at the first failure
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        for statement in split_statements(sql) {
            self.execute(&statement).await?;
        }
        Ok(())
    }

    pub fn close(&self) {
        self.client.close();
    }
}

/// Split a script on `;`, ignoring semicolons inside quotes
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match (ch, quote) {
            ('\'' | '"', None) => {
                quote = Some(ch);
                current.push(ch);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(ch);
            }
            (';', None) => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    statements
}
