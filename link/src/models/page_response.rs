use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use super::column::Column;
use super::result_code::ResultCode;

/// Raw response body from `/sql/getResult`.
///
/// `code` is absent on plain successful pages; when present it follows the
/// same canonical table as the other endpoints (`700` = token expired).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    /// Rows as positional arrays, not yet coerced
    #[serde(default)]
    pub data: Option<Vec<Vec<JsonValue>>>,

    #[serde(default)]
    pub schema: Option<Vec<Column>>,

    #[serde(default, deserialize_with = "null_as_zero")]
    pub page_num: u32,

    #[serde(default, deserialize_with = "null_as_zero")]
    pub page_size: u32,

    #[serde(default, deserialize_with = "null_as_zero")]
    pub total: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResultCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Paging counters sent as `null` read as 0, like missing ones
fn null_as_zero<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PageResponse {
    pub fn row_count(&self) -> usize {
        self.data.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Code of this page, treating a missing code as success
    pub fn effective_code(&self) -> ResultCode {
        self.code.clone().unwrap_or(ResultCode::Success)
    }
}
