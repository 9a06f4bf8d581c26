use serde::{Deserialize, Serialize};

/// Request payload for `/sql/execute`.
///
/// # Examples
///
/// ```rust
/// use dacp_link::ExecuteRequest;
///
/// let request = ExecuteRequest {
///     sql: "SELECT * FROM users".to_string(),
///     access_token: "tok".to_string(),
/// };
/// let body = serde_json::to_value(&request).unwrap();
/// assert_eq!(body["accessToken"], "tok");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// SQL text submitted for asynchronous execution
    pub sql: String,

    /// Token from the last successful login
    pub access_token: String,
}

impl ExecuteRequest {
    pub fn new(sql: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            access_token: access_token.into(),
        }
    }
}
