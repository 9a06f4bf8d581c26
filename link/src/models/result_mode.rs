use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-selected delivery strategy for a statement's results.
///
/// Wire tags are `result`, `cursor` and `olk`; they are matched
/// case-insensitively on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultMode {
    /// Full result available without paging
    Direct,
    /// Server-side paginated cursor addressed by task id + page number
    Cursor,
    /// Run the server-rewritten SQL on the delegated engine
    Delegated,
}

impl ResultMode {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Direct => "result",
            Self::Cursor => "cursor",
            Self::Delegated => "olk",
        }
    }

    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "result" => Some(Self::Direct),
            "cursor" => Some(Self::Cursor),
            "olk" => Some(Self::Delegated),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResultMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for ResultMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for ResultMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::from_wire(&tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown result type '{}'", tag)))
    }
}
