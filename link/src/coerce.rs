//! JSON to typed value coercion.
//!
//! The wire format flattens every value to JSON, which loses type fidelity
//! for nested values: integers arrive as strings inside arrays, maps arrive
//! with string keys, rows arrive as positional arrays. [`fix`] rebuilds typed
//! values from each column's [`TypeSignature`].

use crate::error::{DacpLinkError, Result};
use crate::models::Column;
use crate::signature::TypeSignature;
use base64::Engine as _;
use serde_json::Value as JsonValue;

/// One coerced result row, positionally aligned with the schema
pub type Row = Vec<TypedValue>;

/// A value after coercion against its column type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    /// Text-like values (varchar, date, timestamp, decimal, ...) kept verbatim
    Text(String),
    /// Base64-decoded payload of an opaque type
    Binary(Vec<u8>),
    Array(Vec<TypedValue>),
    /// Entries in first-seen key order; duplicate keys keep the last value
    Map(Vec<(TypedValue, TypedValue)>),
    /// Field name and value pairs in declared order
    Row(Vec<(String, TypedValue)>),
    /// JSON passed through untouched
    Json(JsonValue),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::TinyInt(v) => Some(i64::from(*v)),
            Self::SmallInt(v) => Some(i64::from(*v)),
            Self::Integer(v) => Some(i64::from(*v)),
            Self::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Row field by name
    pub fn field(&self, name: &str) -> Option<&TypedValue> {
        match self {
            Self::Row(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Map value by key
    pub fn get(&self, key: &TypedValue) -> Option<&TypedValue> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// JSON rendering used by output formatters.
    ///
    /// Binary values become base64 strings; non-finite floats become strings
    /// because JSON has no literal for them.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::TinyInt(v) => JsonValue::from(*v),
            Self::SmallInt(v) => JsonValue::from(*v),
            Self::Integer(v) => JsonValue::from(*v),
            Self::BigInt(v) => JsonValue::from(*v),
            Self::Real(v) => float_to_json(f64::from(*v)),
            Self::Double(v) => float_to_json(*v),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Binary(bytes) => {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Self::Row(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, v)| (name.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Json(value) => value.clone(),
        }
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(format_float(v)))
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        v.to_string()
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::TinyInt(v) => write!(f, "{}", v),
            Self::SmallInt(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::BigInt(v) => write!(f, "{}", v),
            Self::Real(v) => f.write_str(&format_float(f64::from(*v))),
            Self::Double(v) => f.write_str(&format_float(*v)),
            Self::Text(s) => f.write_str(s),
            Self::Json(JsonValue::String(s)) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Fixed-width numeric column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
}

/// Closed set of coercion strategies, derived from a signature's raw type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Array,
    Map,
    Row,
    Numeric(NumericKind),
    Boolean,
    Text,
    SpatialTile,
    Opaque,
}

const TEXT_TYPES: &[&str] = &[
    "varchar",
    "json",
    "time",
    "time with time zone",
    "timestamp",
    "timestamp with time zone",
    "date",
    "interval year to month",
    "interval day to second",
    "ipaddress",
    "uuid",
    "decimal",
    "char",
    "geometry",
];

impl TypeKind {
    pub fn of(raw_type: &str) -> Self {
        match raw_type.to_ascii_lowercase().as_str() {
            "array" => Self::Array,
            "map" => Self::Map,
            "row" => Self::Row,
            "tinyint" => Self::Numeric(NumericKind::TinyInt),
            "smallint" => Self::Numeric(NumericKind::SmallInt),
            "integer" => Self::Numeric(NumericKind::Integer),
            "bigint" => Self::Numeric(NumericKind::BigInt),
            "real" => Self::Numeric(NumericKind::Real),
            "double" => Self::Numeric(NumericKind::Double),
            "boolean" => Self::Boolean,
            "bingtile" => Self::SpatialTile,
            other if TEXT_TYPES.contains(&other) => Self::Text,
            _ => Self::Opaque,
        }
    }
}

/// Coerce every raw row against `schema`.
///
/// Fails on the first row whose length differs from the schema or whose
/// values do not fit their column types.
pub fn fix(schema: &[Column], raw_rows: &[Vec<JsonValue>]) -> Result<Vec<Row>> {
    let signatures = schema
        .iter()
        .map(Column::signature)
        .collect::<Result<Vec<_>>>()?;

    raw_rows
        .iter()
        .enumerate()
        .map(|(row_idx, raw)| {
            if raw.len() != signatures.len() {
                return Err(DacpLinkError::CoercionError(format!(
                    "row {} has {} values but the schema has {} columns",
                    row_idx,
                    raw.len(),
                    signatures.len()
                )));
            }
            raw.iter()
                .zip(&signatures)
                .map(|(value, sig)| fix_value(sig, value))
                .collect()
        })
        .collect()
}

/// Coerce one JSON value against `signature`
pub fn fix_value(signature: &TypeSignature, value: &JsonValue) -> Result<TypedValue> {
    if value.is_null() {
        return Ok(TypedValue::Null);
    }

    match TypeKind::of(&signature.raw_type) {
        TypeKind::Array => {
            let element = signature.argument(0)?;
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(signature, value, "an array"))?;
            items
                .iter()
                .map(|item| fix_value(element, item))
                .collect::<Result<Vec<_>>>()
                .map(TypedValue::Array)
        }
        TypeKind::Map => {
            let key_sig = signature.argument(0)?;
            let value_sig = signature.argument(1)?;
            let object = value
                .as_object()
                .ok_or_else(|| mismatch(signature, value, "an object"))?;

            let mut entries: Vec<(TypedValue, TypedValue)> = Vec::with_capacity(object.len());
            for (raw_key, raw_value) in object {
                let key = fix_key(key_sig, raw_key)?;
                let value = fix_value(value_sig, raw_value)?;
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((key, value)),
                }
            }
            Ok(TypedValue::Map(entries))
        }
        TypeKind::Row => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(signature, value, "a positional array"))?;
            if items.len() != signature.arguments.len() {
                return Err(DacpLinkError::CoercionError(format!(
                    "row type '{}' has {} fields but the value has {}",
                    signature,
                    signature.arguments.len(),
                    items.len()
                )));
            }
            signature
                .arguments
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (field, item))| {
                    let name = field
                        .field_name
                        .clone()
                        .unwrap_or_else(|| format!("field{}", i));
                    fix_value(field, item).map(|v| (name, v))
                })
                .collect::<Result<Vec<_>>>()
                .map(TypedValue::Row)
        }
        TypeKind::Numeric(kind) => fix_numeric(kind, signature, value),
        TypeKind::Boolean => match value {
            JsonValue::Bool(b) => Ok(TypedValue::Boolean(*b)),
            JsonValue::String(s) if s == "true" => Ok(TypedValue::Boolean(true)),
            JsonValue::String(s) if s == "false" => Ok(TypedValue::Boolean(false)),
            _ => Err(mismatch(signature, value, "true or false")),
        },
        TypeKind::Text => value
            .as_str()
            .map(|s| TypedValue::Text(s.to_string()))
            .ok_or_else(|| mismatch(signature, value, "a string")),
        TypeKind::SpatialTile => Ok(TypedValue::Json(value.clone())),
        TypeKind::Opaque => match value {
            JsonValue::String(s) => decode_base64(signature, s),
            other => Ok(TypedValue::Json(other.clone())),
        },
    }
}

/// Map keys always arrive as JSON object keys, i.e. strings
fn fix_key(signature: &TypeSignature, raw_key: &str) -> Result<TypedValue> {
    match TypeKind::of(&signature.raw_type) {
        TypeKind::SpatialTile => Ok(TypedValue::Text(raw_key.to_string())),
        _ => fix_value(signature, &JsonValue::String(raw_key.to_string())),
    }
}

fn fix_numeric(kind: NumericKind, signature: &TypeSignature, value: &JsonValue) -> Result<TypedValue> {
    match kind {
        NumericKind::Real | NumericKind::Double => {
            let v = match value {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => parse_float(s),
                _ => None,
            }
            .ok_or_else(|| mismatch(signature, value, "a number"))?;

            if kind == NumericKind::Double {
                return Ok(TypedValue::Double(v));
            }
            if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                return Err(mismatch(signature, value, "a value in range for real"));
            }
            Ok(TypedValue::Real(v as f32))
        }
        _ => {
            let v = match value {
                JsonValue::Number(n) if n.is_u64() && n.as_i64().is_none() => {
                    return Err(mismatch(signature, value, "a value in range"));
                }
                // 2^63 is exactly representable; i64::MAX as f64 rounds up to it
                JsonValue::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| {
                            f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < 9_223_372_036_854_775_808.0
                        })
                        .map(|f| f as i64)
                }),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| mismatch(signature, value, "an integer"))?;

            let out_of_range = || mismatch(signature, value, "a value in range");
            Ok(match kind {
                NumericKind::TinyInt => TypedValue::TinyInt(i8::try_from(v).map_err(|_| out_of_range())?),
                NumericKind::SmallInt => {
                    TypedValue::SmallInt(i16::try_from(v).map_err(|_| out_of_range())?)
                }
                NumericKind::Integer => TypedValue::Integer(i32::try_from(v).map_err(|_| out_of_range())?),
                _ => TypedValue::BigInt(v),
            })
        }
    }
}

fn parse_float(s: &str) -> Option<f64> {
    match s.trim() {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok(),
    }
}

fn decode_base64(signature: &TypeSignature, encoded: &str) -> Result<TypedValue> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map(TypedValue::Binary)
        .map_err(|e| {
            DacpLinkError::CoercionError(format!(
                "value of type '{}' is not valid base64: {}",
                signature, e
            ))
        })
}

fn mismatch(signature: &TypeSignature, value: &JsonValue, expected: &str) -> DacpLinkError {
    let mut shown = value.to_string();
    if shown.len() > 64 {
        let cut = (0..=64).rev().find(|i| shown.is_char_boundary(*i)).unwrap_or(0);
        shown.truncate(cut);
        shown.push_str("...");
    }
    DacpLinkError::CoercionError(format!(
        "expected {} for type '{}', got {}",
        expected, signature, shown
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sig(text: &str) -> TypeSignature {
        TypeSignature::parse(text).unwrap()
    }

    #[test]
    fn test_array_of_integer_strings() {
        let v = fix_value(&sig("array(integer)"), &json!(["1", "2", "3"])).unwrap();
        assert_eq!(
            v,
            TypedValue::Array(vec![
                TypedValue::Integer(1),
                TypedValue::Integer(2),
                TypedValue::Integer(3)
            ])
        );
    }

    #[test]
    fn test_row_named_and_unnamed_fields() {
        let v = fix_value(&sig("row(a:integer, :varchar)"), &json!([5, "x"])).unwrap();
        assert_eq!(
            v,
            TypedValue::Row(vec![
                ("a".to_string(), TypedValue::Integer(5)),
                ("field1".to_string(), TypedValue::Text("x".to_string())),
            ])
        );
        assert_eq!(v.field("field1").and_then(TypedValue::as_str), Some("x"));
    }

    #[test]
    fn test_row_arity_mismatch() {
        let err = fix_value(&sig("row(a integer, b integer)"), &json!([1])).unwrap_err();
        assert!(matches!(err, DacpLinkError::CoercionError(_)));
    }

    #[test]
    fn test_map_keys_are_coerced() {
        let v = fix_value(&sig("map(bigint, array(double))"), &json!({"7": [1.5, "NaN"]})).unwrap();
        let inner = v.get(&TypedValue::BigInt(7)).unwrap();
        match inner {
            TypedValue::Array(items) => {
                assert_eq!(items[0], TypedValue::Double(1.5));
                assert!(matches!(items[1], TypedValue::Double(d) if d.is_nan()));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_map_duplicate_keys_after_coercion_keep_last() {
        let v = fix_value(&sig("map(integer, varchar)"), &json!({"1": "a", "01": "b"})).unwrap();
        match v {
            TypedValue::Map(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].0, TypedValue::Integer(1));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_ranges_and_formats() {
        assert_eq!(fix_value(&sig("tinyint"), &json!(127)).unwrap(), TypedValue::TinyInt(127));
        assert!(fix_value(&sig("tinyint"), &json!(128)).is_err());
        assert_eq!(fix_value(&sig("smallint"), &json!("-5")).unwrap(), TypedValue::SmallInt(-5));
        assert!(fix_value(&sig("integer"), &json!(1.5)).is_err());
        assert!(fix_value(&sig("integer"), &json!("abc")).is_err());
        assert_eq!(
            fix_value(&sig("bigint"), &json!("9223372036854775807")).unwrap(),
            TypedValue::BigInt(i64::MAX)
        );
        assert_eq!(
            fix_value(&sig("double"), &json!("-Infinity")).unwrap(),
            TypedValue::Double(f64::NEG_INFINITY)
        );
        assert_eq!(fix_value(&sig("real"), &json!(0.5)).unwrap(), TypedValue::Real(0.5));
        assert!(fix_value(&sig("real"), &json!(1e300)).is_err());
    }

    #[test]
    fn test_bigint_past_i64_max_is_rejected() {
        let above: JsonValue = serde_json::from_str("9223372036854775808").unwrap();
        assert!(matches!(
            fix_value(&sig("bigint"), &above),
            Err(DacpLinkError::CoercionError(_))
        ));
        assert!(fix_value(&sig("bigint"), &json!(9.223372036854775808e18)).is_err());
        assert!(fix_value(&sig("bigint"), &json!("9223372036854775808")).is_err());
        assert_eq!(
            fix_value(&sig("bigint"), &json!(i64::MAX)).unwrap(),
            TypedValue::BigInt(i64::MAX)
        );
        assert_eq!(
            fix_value(&sig("bigint"), &json!(-9.223372036854775808e18)).unwrap(),
            TypedValue::BigInt(i64::MIN)
        );
    }

    #[test]
    fn test_boolean_is_strict() {
        assert_eq!(fix_value(&sig("boolean"), &json!("true")).unwrap(), TypedValue::Boolean(true));
        assert_eq!(fix_value(&sig("boolean"), &json!(false)).unwrap(), TypedValue::Boolean(false));
        assert!(fix_value(&sig("boolean"), &json!("yes")).is_err());
        assert!(fix_value(&sig("boolean"), &json!(1)).is_err());
    }

    #[test]
    fn test_text_types_require_strings() {
        let v = fix_value(&sig("timestamp with time zone"), &json!("2024-01-01 00:00:00 UTC")).unwrap();
        assert_eq!(v.as_str(), Some("2024-01-01 00:00:00 UTC"));
        assert!(fix_value(&sig("decimal(10,2)"), &json!(1.25)).is_err());
    }

    #[test]
    fn test_bingtile_passthrough_and_opaque_base64() {
        let tile = json!({"x": 1, "y": 2, "zoom": 3});
        assert_eq!(fix_value(&sig("BingTile"), &tile).unwrap(), TypedValue::Json(tile));

        assert_eq!(
            fix_value(&sig("varbinary"), &json!("aGk=")).unwrap(),
            TypedValue::Binary(b"hi".to_vec())
        );
        assert!(fix_value(&sig("varbinary"), &json!("not base64!")).is_err());
        assert_eq!(fix_value(&sig("hyperloglog"), &json!(42)).unwrap(), TypedValue::Json(json!(42)));
    }

    #[test]
    fn test_nulls_survive_at_every_level() {
        let v = fix_value(&sig("array(row(a integer))"), &json!([null, [null]])).unwrap();
        assert_eq!(
            v,
            TypedValue::Array(vec![
                TypedValue::Null,
                TypedValue::Row(vec![("a".to_string(), TypedValue::Null)])
            ])
        );
    }

    #[test]
    fn test_fix_rejects_row_length_mismatch() {
        let schema = vec![Column::new("id", "integer"), Column::new("name", "varchar")];
        let rows = vec![vec![json!(1), json!("a")], vec![json!(2)]];
        let err = fix(&schema, &rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_fix_is_deterministic() {
        let schema = vec![
            Column::new("m", "map(varchar, integer)"),
            Column::new("r", "row(x double, y double)"),
        ];
        let rows = vec![vec![json!({"b": "2", "a": 1}), json!([1, "2.5"])]];
        assert_eq!(fix(&schema, &rows).unwrap(), fix(&schema, &rows).unwrap());
    }

    #[test]
    fn test_malformed_signature_is_a_coercion_error() {
        let bad = TypeSignature::new("array");
        assert!(matches!(
            fix_value(&bad, &json!([1])),
            Err(DacpLinkError::CoercionError(_))
        ));
    }

    #[test]
    fn test_to_json_rendering() {
        let v = TypedValue::Row(vec![
            ("bin".to_string(), TypedValue::Binary(b"hi".to_vec())),
            ("d".to_string(), TypedValue::Double(f64::INFINITY)),
        ]);
        assert_eq!(v.to_json(), json!({"bin": "aGk=", "d": "Infinity"}));
        assert_eq!(TypedValue::Null.to_string(), "NULL");
    }
}
