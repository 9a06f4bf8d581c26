use serde::{Deserialize, Serialize};

use super::result_code::ResultCode;

/// Login response from `/sql/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Access token for subsequent calls
    #[serde(default)]
    pub access_token: String,
    /// Token lifetime granted by the server, in seconds
    #[serde(default)]
    pub expires: u64,
    /// Echo of the authenticated user
    #[serde(default)]
    pub user: String,
    pub code: ResultCode,
    #[serde(default)]
    pub msg: Option<String>,
    /// Base URL of the delegated query engine, if the server has one
    #[serde(default, rename = "olkURL")]
    pub olk_url: Option<String>,
}
