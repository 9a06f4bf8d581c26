use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signature::TypeSignature;

/// One column of a result schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,

    /// Declared type as text, e.g. `array(varchar)`
    #[serde(rename = "type", default)]
    pub declared_type: String,

    /// Structured signature, when the server sends one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_signature: Option<TypeSignature>,
}

impl Column {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            type_signature: None,
        }
    }

    pub fn with_signature(name: impl Into<String>, signature: TypeSignature) -> Self {
        Self {
            name: name.into(),
            declared_type: signature.to_string(),
            type_signature: Some(signature),
        }
    }

    /// Structured signature, falling back to parsing the declared type
    pub fn signature(&self) -> Result<TypeSignature> {
        match &self.type_signature {
            Some(sig) => Ok(sig.clone()),
            None => TypeSignature::parse(&self.declared_type),
        }
    }
}
