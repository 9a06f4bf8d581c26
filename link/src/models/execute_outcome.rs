use serde_json::Value as JsonValue;

use super::column::Column;
use super::result_code::ResultCode;
use super::result_mode::ResultMode;

/// Validated result of a successful `/sql/execute` call.
///
/// Only constructed by [`ExecuteManager`](crate::ExecuteManager), which
/// guarantees a non-empty `task_id`, `code == Success`, and a
/// `delegated_sql` whenever `result_mode` is [`ResultMode::Delegated`].
#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub task_id: String,
    pub result_mode: ResultMode,
    pub success: bool,
    pub code: ResultCode,
    pub message: Option<String>,
    pub error_detail: Option<String>,
    pub delegated_sql: Option<String>,
    /// Raw rows and schema the server inlined for a direct result
    pub inline_result: Option<InlineResult>,
}

/// Direct-mode payload carried in the execute response itself
#[derive(Debug, Clone)]
pub struct InlineResult {
    pub schema: Vec<Column>,
    pub data: Vec<Vec<JsonValue>>,
    pub total: Option<u64>,
}
