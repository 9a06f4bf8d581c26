use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::column::Column;
use super::result_code::ResultCode;

/// Raw response body from `/sql/execute`.
///
/// Fields are lenient on purpose: a rejected statement may come back without
/// a task id or type, and the code/detail must still reach the caller.
/// [`ExecuteManager`](crate::ExecuteManager) validates this into an
/// [`ExecuteOutcome`](super::ExecuteOutcome).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    #[serde(default)]
    pub task_id: Option<String>,

    /// `result`, `cursor` or `olk`
    #[serde(default, rename = "type")]
    pub result_type: Option<String>,

    #[serde(default)]
    pub success: bool,

    pub code: ResultCode,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub err_detail: Option<String>,

    /// Rewritten SQL for the delegated engine
    #[serde(default, rename = "olkSQL")]
    pub olk_sql: Option<String>,

    /// Inline rows for direct results, when the server sends them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Vec<JsonValue>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<Column>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}
