use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Three-digit result code returned in every DACP response body.
///
/// Unknown codes are kept verbatim in [`ResultCode::Other`] so nothing the
/// server says is lost on the way to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// `000`
    Success,
    /// `001` - task still running, poll again
    Running,
    /// `100`
    InputParamsError,
    /// `200`
    SqlSyntaxError,
    /// `300`
    SqlExecuteError,
    /// `400`
    SqlPermitError,
    /// `500`
    NullParamsError,
    /// `600`
    LoginError,
    /// `700` - triggers invalidate + single re-login on the cursor path
    TokenExpired,
    /// `999`
    UnknownError,
    /// Any code outside the canonical set
    Other(String),
}

impl ResultCode {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "000" => Self::Success,
            "001" => Self::Running,
            "100" => Self::InputParamsError,
            "200" => Self::SqlSyntaxError,
            "300" => Self::SqlExecuteError,
            "400" => Self::SqlPermitError,
            "500" => Self::NullParamsError,
            "600" => Self::LoginError,
            "700" => Self::TokenExpired,
            "999" => Self::UnknownError,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "000",
            Self::Running => "001",
            Self::InputParamsError => "100",
            Self::SqlSyntaxError => "200",
            Self::SqlExecuteError => "300",
            Self::SqlPermitError => "400",
            Self::NullParamsError => "500",
            Self::LoginError => "600",
            Self::TokenExpired => "700",
            Self::UnknownError => "999",
            Self::Other(code) => code,
        }
    }

    /// Message the server uses for this code when it sends none of its own
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Success => "Executed successfully.",
            Self::Running => "Running.",
            Self::InputParamsError => "input parameters error.",
            Self::SqlSyntaxError => "sql syntax error.",
            Self::SqlExecuteError => "error while executing sql.",
            Self::SqlPermitError => "sql not have execute permission.",
            Self::NullParamsError => "parameter is null.",
            Self::LoginError => "login failure.",
            Self::TokenExpired => "Token expired error.",
            Self::UnknownError | Self::Other(_) => "unknown error.",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Default for ResultCode {
    fn default() -> Self {
        Self::UnknownError
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResultCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResultCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Some gateways send the code as a bare number (`700`, `0`)
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(code) => Self::from_code(&code),
            Repr::Number(code) => Self::from_code(&format!("{:03}", code)),
        })
    }
}

/// Pick the most specific message available for a failed response.
pub(crate) fn describe_failure(code: &ResultCode, candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .map(|m| m.trim())
        .find(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| code.default_message().to_string())
}
