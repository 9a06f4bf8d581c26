//! Column type signatures.
//!
//! A signature is a recursive tree (`array(row(a integer, map(varchar, bigint)))`)
//! that drives [`coerce`](crate::coerce). The server sends it as a structured
//! `typeSignature` object; when that object is missing the textual `type` of
//! the column is parsed instead.

use crate::error::{DacpLinkError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Recursive type signature of one column (or of a nested element/field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireTypeSignature", into = "WireTypeSignature")]
pub struct TypeSignature {
    /// Base type name, normalised to lower case (`array`, `row`, `varchar`, ...)
    pub raw_type: String,
    /// Type arguments in declared order; literal parameters such as the
    /// `10` in `varchar(10)` are not included
    pub arguments: Vec<TypeSignature>,
    /// Field name when this signature is a field of a `row`
    pub field_name: Option<String>,
}

impl TypeSignature {
    pub fn new(raw_type: impl AsRef<str>) -> Self {
        Self {
            raw_type: normalize_raw_type(raw_type.as_ref()),
            arguments: Vec::new(),
            field_name: None,
        }
    }

    pub fn with_arguments(raw_type: impl AsRef<str>, arguments: Vec<TypeSignature>) -> Self {
        Self {
            arguments,
            ..Self::new(raw_type)
        }
    }

    pub fn array(element: TypeSignature) -> Self {
        Self::with_arguments("array", vec![element])
    }

    pub fn map(key: TypeSignature, value: TypeSignature) -> Self {
        Self::with_arguments("map", vec![key, value])
    }

    /// Build a `row` from `(optional name, type)` pairs
    pub fn row<N: Into<String>>(fields: Vec<(Option<N>, TypeSignature)>) -> Self {
        let arguments = fields
            .into_iter()
            .map(|(name, sig)| TypeSignature {
                field_name: name.map(Into::into),
                ..sig
            })
            .collect();
        Self::with_arguments("row", arguments)
    }

    /// Attach a row field name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Argument `idx`, or a coercion error naming the malformed signature
    pub fn argument(&self, idx: usize) -> Result<&TypeSignature> {
        self.arguments.get(idx).ok_or_else(|| {
            DacpLinkError::CoercionError(format!(
                "type '{}' is missing type argument #{}",
                self, idx
            ))
        })
    }

    /// Parse a textual type such as `map(varchar, array(bigint))`.
    ///
    /// Accepts both `name type` and `name:type` row fields and both `()` and
    /// `<>` argument brackets.
    pub fn parse(text: &str) -> Result<Self> {
        parse_type(text)
    }
}

impl std::fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw_type)?;
        if self.arguments.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if let Some(name) = &arg.field_name {
                write!(f, "{} ", name)?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

fn normalize_raw_type(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

// ── wire format ──────────────────────────────────────────────────────────────

/// `typeSignature` object as sent by the server.
///
/// `arguments` carries `{kind, value}` pairs; `typeArguments` is the plain
/// nested form also accepted on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTypeSignature {
    raw_type: String,
    #[serde(default)]
    arguments: Vec<WireTypeArgument>,
    #[serde(default, skip_serializing)]
    type_arguments: Vec<WireTypeSignature>,
    #[serde(default, skip_serializing)]
    field_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireTypeArgument {
    kind: String,
    value: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNamedType {
    #[serde(default)]
    field_name: Option<WireFieldName>,
    type_signature: WireTypeSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFieldName {
    name: String,
    #[serde(default)]
    delimited: bool,
}

impl TryFrom<WireTypeSignature> for TypeSignature {
    type Error = DacpLinkError;

    fn try_from(wire: WireTypeSignature) -> Result<Self> {
        let mut arguments = Vec::with_capacity(wire.arguments.len() + wire.type_arguments.len());

        for arg in wire.arguments {
            match arg.kind.to_ascii_uppercase().as_str() {
                "TYPE" | "TYPE_SIGNATURE" => {
                    let nested: WireTypeSignature = serde_json::from_value(arg.value)
                        .map_err(|e| DacpLinkError::CoercionError(format!("bad TYPE argument: {}", e)))?;
                    arguments.push(TypeSignature::try_from(nested)?);
                }
                "NAMED_TYPE" | "NAMED_TYPE_SIGNATURE" => {
                    let named: WireNamedType = serde_json::from_value(arg.value).map_err(|e| {
                        DacpLinkError::CoercionError(format!("bad NAMED_TYPE argument: {}", e))
                    })?;
                    let mut sig = TypeSignature::try_from(named.type_signature)?;
                    sig.field_name = named.field_name.map(|f| f.name);
                    arguments.push(sig);
                }
                // Literal parameters (varchar(10), decimal(10,2)) are not type arguments
                "LONG" | "LONG_LITERAL" | "VARIABLE" => {}
                other => {
                    return Err(DacpLinkError::CoercionError(format!(
                        "unknown type argument kind '{}'",
                        other
                    )))
                }
            }
        }

        for nested in wire.type_arguments {
            arguments.push(TypeSignature::try_from(nested)?);
        }

        Ok(TypeSignature {
            raw_type: normalize_raw_type(&wire.raw_type),
            arguments,
            field_name: wire.field_name,
        })
    }
}

impl From<TypeSignature> for WireTypeSignature {
    fn from(sig: TypeSignature) -> Self {
        let is_row = sig.raw_type == "row";
        let arguments = sig
            .arguments
            .into_iter()
            .map(|arg| {
                if is_row {
                    let field_name = arg.field_name.clone().map(|name| WireFieldName {
                        name,
                        delimited: false,
                    });
                    let named = WireNamedType {
                        field_name,
                        type_signature: WireTypeSignature::from(TypeSignature {
                            field_name: None,
                            ..arg
                        }),
                    };
                    WireTypeArgument {
                        kind: "NAMED_TYPE".to_string(),
                        value: serde_json::to_value(named).unwrap_or(JsonValue::Null),
                    }
                } else {
                    WireTypeArgument {
                        kind: "TYPE".to_string(),
                        value: serde_json::to_value(WireTypeSignature::from(arg))
                            .unwrap_or(JsonValue::Null),
                    }
                }
            })
            .collect();

        WireTypeSignature {
            raw_type: sig.raw_type,
            arguments,
            type_arguments: Vec::new(),
            field_name: None,
        }
    }
}

// ── textual parser ───────────────────────────────────────────────────────────

/// Leading keywords of multi-word scalar types, so that `row(timestamp with time zone)`
/// is read as an unnamed field rather than a field called `timestamp`.
const MULTIWORD_HEADS: &[(&str, &[&str])] = &[
    ("timestamp", &["with", "without"]),
    ("time", &["with", "without"]),
    ("interval", &["year", "day"]),
    ("double", &["precision"]),
];

fn parse_error(text: &str, why: &str) -> DacpLinkError {
    DacpLinkError::CoercionError(format!("cannot parse type '{}': {}", text, why))
}

fn parse_type(text: &str) -> Result<TypeSignature> {
    let t = text.trim();
    if t.is_empty() {
        return Err(parse_error(text, "empty type"));
    }

    let Some(open_idx) = t.find(['(', '<']) else {
        if t.contains([')', '>', ',']) {
            return Err(parse_error(text, "unbalanced brackets"));
        }
        return Ok(TypeSignature::new(t));
    };

    let open = t.as_bytes()[open_idx] as char;
    let close = if open == '(' { ')' } else { '>' };
    let close_idx = matching_close(t, open_idx).ok_or_else(|| parse_error(text, "unbalanced brackets"))?;

    let base = &t[..open_idx];
    let tail = t[close_idx + 1..].trim();
    if base.trim().is_empty() {
        return Err(parse_error(text, "missing base type"));
    }
    if t.as_bytes()[close_idx] as char != close {
        return Err(parse_error(text, "mismatched brackets"));
    }

    let inner = &t[open_idx + 1..close_idx];
    let raw_type = normalize_raw_type(base);

    // `timestamp(3) with time zone`: the suffix belongs to the base type name
    if !tail.is_empty() {
        if raw_type == "row" || raw_type == "array" || raw_type == "map" {
            return Err(parse_error(text, "trailing text after arguments"));
        }
        return Ok(TypeSignature::new(format!("{} {}", raw_type, tail)));
    }

    let mut arguments = Vec::new();
    for part in split_top_level(inner, ',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(parse_error(text, "empty type argument"));
        }
        if raw_type == "row" {
            arguments.push(parse_row_field(part)?);
        } else if part.chars().all(|c| c.is_ascii_digit()) {
            continue;
        } else {
            arguments.push(parse_type(part)?);
        }
    }

    Ok(TypeSignature {
        raw_type,
        arguments,
        field_name: None,
    })
}

fn parse_row_field(part: &str) -> Result<TypeSignature> {
    if let Some(rest) = part.strip_prefix('"') {
        let end = rest.find('"').ok_or_else(|| parse_error(part, "unterminated field name"))?;
        let name = &rest[..end];
        let ty = rest[end + 1..].trim_start_matches([' ', ':']);
        return Ok(parse_type(ty)?.named(name));
    }

    if let Some(colon) = find_top_level(part, ':') {
        let name = part[..colon].trim();
        let sig = parse_type(&part[colon + 1..])?;
        return Ok(if name.is_empty() { sig } else { sig.named(name) });
    }

    let Some((first, rest)) = part.split_once(char::is_whitespace) else {
        return parse_type(part);
    };
    let first_lower = first.to_ascii_lowercase();
    let next_word = rest.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
    let is_multiword_type = MULTIWORD_HEADS
        .iter()
        .any(|(head, tails)| *head == first_lower && tails.contains(&next_word.as_str()));
    if is_multiword_type || first.contains(['(', '<']) {
        return parse_type(part);
    }

    Ok(parse_type(rest)?.named(first))
}

fn matching_close(text: &str, open_idx: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, c) in text.char_indices().skip_while(|(i, _)| *i < open_idx) {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' | '<' if !in_quotes => depth += 1,
            ')' | '>' if !in_quotes => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' | '<' if !in_quotes => depth += 1,
            ')' | '>' if !in_quotes => depth -= 1,
            c if c == needle && depth == 0 && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(idx) = find_top_level(rest, sep) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + sep.len_utf8()..];
    }
    parts.push(rest);
    parts
}
