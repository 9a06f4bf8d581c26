use serde::{Deserialize, Serialize};

use super::result_mode::ResultMode;

/// Request payload for `/sql/getResult`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub task_id: String,

    #[serde(rename = "type")]
    pub result_mode: ResultMode,

    pub access_token: String,

    /// 1-based page number
    pub page_num: u32,

    pub page_size: u32,
}
