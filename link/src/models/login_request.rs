use serde::{Deserialize, Serialize};

/// Login request body for `/sql/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub pwd: String,
    /// Database (catalog) the session is bound to
    #[serde(default)]
    pub database: Option<String>,
    /// Requested token lifetime in seconds
    pub expires: u64,
}
