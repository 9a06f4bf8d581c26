//! Statement submission against `/sql/execute`.

use crate::auth::AuthManager;
use crate::error::{DacpLinkError, Result};
use crate::models::result_code::describe_failure;
use crate::models::{
    ExecuteOutcome, ExecuteRequest, ExecuteResponse, InlineResult, ResultCode, ResultMode,
};
use crate::transport::{Transport, EXECUTE_PATH};
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Submits SQL and validates the server's reply into an [`ExecuteOutcome`].
///
/// Submission is never retried: the server may already have started the
/// task, and a second submit would run the statement twice.
#[derive(Clone)]
pub struct ExecuteManager {
    transport: Arc<dyn Transport>,
    auth: Arc<AuthManager>,
    request_timeout: Option<Duration>,
}

impl ExecuteManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<AuthManager>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            auth,
            request_timeout,
        }
    }

    /// Submit `sql` with `access_token`.
    ///
    /// HTTP failures and code `700` clear the session token before the
    /// error is returned, so the next statement logs in again.
    pub async fn submit(&self, sql: &str, access_token: &str) -> Result<ExecuteOutcome> {
        let request = ExecuteRequest::new(sql, access_token);
        let body = serde_json::to_value(&request)?;

        debug!(
            "[DACP_EXECUTE] Submitting statement: \"{}\" (len={})",
            sql_preview(sql),
            sql.len()
        );
        let start = Instant::now();

        let response = match self.fetch(&body).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "[DACP_EXECUTE] Submit failed: {} duration_ms={}",
                    e,
                    start.elapsed().as_millis()
                );
                self.auth.invalidate();
                return Err(e);
            }
        };

        if response.code == ResultCode::TokenExpired {
            warn!("[DACP_EXECUTE] Token expired at submit; session invalidated");
            self.auth.invalidate();
        }

        let outcome = validate(response)?;
        debug!(
            "[DACP_EXECUTE] Accepted task_id={} type={} duration_ms={}",
            outcome.task_id,
            outcome.result_mode,
            start.elapsed().as_millis()
        );
        Ok(outcome)
    }

    async fn fetch(&self, body: &serde_json::Value) -> Result<ExecuteResponse> {
        let reply = self
            .transport
            .post_json(EXECUTE_PATH, body, self.request_timeout)
            .await
            .map_err(as_execution_error)?;
        reply.json::<ExecuteResponse>().map_err(as_execution_error)
    }
}

/// Turn a raw execute response into an outcome, or the error it describes
pub(crate) fn validate(response: ExecuteResponse) -> Result<ExecuteOutcome> {
    if !response.code.is_success() {
        let message = describe_failure(
            &response.code,
            &[response.err_detail.as_deref(), response.message.as_deref()],
        );
        warn!(
            "[DACP_EXECUTE] Statement rejected: code={} message=\"{}\"",
            response.code, message
        );
        return Err(DacpLinkError::execution(response.code, message));
    }

    let task_id = response
        .task_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            DacpLinkError::execution(ResultCode::UnknownError, "execute response carried no taskId")
        })?;

    let raw_type = response.result_type.unwrap_or_default();
    let result_mode = ResultMode::from_wire(&raw_type).ok_or_else(|| {
        DacpLinkError::execution(
            ResultCode::UnknownError,
            format!("unknown result type '{}'", raw_type),
        )
    })?;

    let delegated_sql = response.olk_sql.filter(|sql| !sql.trim().is_empty());
    if result_mode == ResultMode::Delegated && delegated_sql.is_none() {
        return Err(DacpLinkError::execution(
            ResultCode::UnknownError,
            "delegated result without olkSQL",
        ));
    }

    let inline_result = match (result_mode, response.data) {
        (ResultMode::Direct, Some(data)) => Some(InlineResult {
            schema: response.schema.unwrap_or_default(),
            data,
            total: response.total,
        }),
        _ => None,
    };

    Ok(ExecuteOutcome {
        task_id,
        result_mode,
        success: response.success,
        code: response.code,
        message: response.message,
        error_detail: response.err_detail,
        delegated_sql,
        inline_result,
    })
}

/// Transport failures at submit surface as execution failures
fn as_execution_error(err: DacpLinkError) -> DacpLinkError {
    match err {
        DacpLinkError::TransportError { status: Some(status), message } => DacpLinkError::execution(
            ResultCode::UnknownError,
            format!("Execute failed (HTTP {}): {}", status, message),
        ),
        DacpLinkError::TransportError { status: None, message } => DacpLinkError::execution(
            ResultCode::UnknownError,
            format!("Execute failed: {}", message),
        ),
        other => other,
    }
}

/// First 80 characters of a statement, on one line, for logs
pub(crate) fn sql_preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\r'], " ");
    if one_line.chars().count() > 80 {
        format!("{}...", one_line.chars().take(80).collect::<String>())
    } else {
        one_line
    }
}
