//! Value codec for attribute, metadata and claims maps.
//!
//! Maps are stored as an opaque string. Every value is written as a tagged
//! JSON object so decoding reconstructs the original type rather than a
//! generic string, number or object:
//!
//! ```json
//! {"ttl":{"@type":"integer","@value":300},
//!  "scopes":{"@type":"scopes","@value":["openid","profile"]}}
//! ```
//!
//! The value space is the closed [`AttributeValue`] union. Anything that
//! cannot be represented exactly (non-finite floats, JSON `null`, integers
//! outside `i64`) is rejected with [`AuthError::Codec`] instead of being
//! stored in degraded form.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::resolver::resolve_grant_type;
use crate::types::AuthorizationGrantType;
use crate::{AuthError, AuthResult};

/// Caller-defined semi-structured state.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A value that can be stored in [`Attributes`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Finite 64-bit float.
    Float(f64),
    /// Ordered list.
    List(Vec<AttributeValue>),
    /// Nested map.
    Map(Attributes),
    /// OAuth 2.0 grant type.
    GrantType(AuthorizationGrantType),
    /// Unordered set of scope (or other) strings.
    Scopes(BTreeSet<String>),
    /// Point in time.
    Timestamp(OffsetDateTime),
}

impl AttributeValue {
    /// Returns the string if this is a `String` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer` value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the nested map if this is a `Map` value.
    #[must_use]
    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::GrantType(_) => "grant_type",
            Self::Scopes(_) => "scopes",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        Self::List(value)
    }
}

impl From<Attributes> for AttributeValue {
    fn from(value: Attributes) -> Self {
        Self::Map(value)
    }
}

impl From<AuthorizationGrantType> for AttributeValue {
    fn from(value: AuthorizationGrantType) -> Self {
        Self::GrantType(value)
    }
}

impl From<BTreeSet<String>> for AttributeValue {
    fn from(value: BTreeSet<String>) -> Self {
        Self::Scopes(value)
    }
}

impl From<OffsetDateTime> for AttributeValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// Converts untyped JSON (for example an incoming claims set) into an
/// attribute value. Lossy inputs are refused.
impl TryFrom<serde_json::Value> for AttributeValue {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Err(AuthError::codec("null is not a storable attribute value")),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if n.is_u64() {
                    Err(AuthError::codec(format!("integer {n} exceeds the i64 range")))
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => Ok(Self::Float(f)),
                        _ => Err(AuthError::codec(format!("number {n} is not representable"))),
                    }
                }
            }
            Value::Array(items) => items
                .into_iter()
                .map(Self::try_from)
                .collect::<AuthResult<Vec<_>>>()
                .map(Self::List),
            Value::Object(entries) => entries
                .into_iter()
                .map(|(k, v)| Self::try_from(v).map(|v| (k, v)))
                .collect::<AuthResult<Attributes>>()
                .map(Self::Map),
        }
    }
}

/// Converts an untyped JSON object into attributes.
///
/// # Errors
///
/// Returns `Codec` if the value is not an object or holds unsupported values.
pub fn attributes_from_json(value: serde_json::Value) -> AuthResult<Attributes> {
    match AttributeValue::try_from(value)? {
        AttributeValue::Map(map) => Ok(map),
        other => Err(AuthError::codec(format!(
            "expected a JSON object, found {}",
            other.type_name()
        ))),
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "@type", content = "@value", rename_all = "snake_case")]
enum Tagged {
    String(String),
    Bool(bool),
    Integer(i64),
    // Shortest round-trip decimal form; JSON numbers may lose the last bit.
    Float(String),
    List(Vec<Tagged>),
    Map(BTreeMap<String, Tagged>),
    GrantType(String),
    Scopes(BTreeSet<String>),
    Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
}

fn to_tagged(path: &str, value: &AttributeValue) -> AuthResult<Tagged> {
    Ok(match value {
        AttributeValue::String(s) => Tagged::String(s.clone()),
        AttributeValue::Bool(b) => Tagged::Bool(*b),
        AttributeValue::Integer(i) => Tagged::Integer(*i),
        AttributeValue::Float(f) => {
            if !f.is_finite() {
                return Err(AuthError::codec(format!(
                    "'{path}' holds non-finite float {f}"
                )));
            }
            Tagged::Float(f.to_string())
        }
        AttributeValue::List(items) => Tagged::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_tagged(&format!("{path}[{i}]"), item))
                .collect::<AuthResult<_>>()?,
        ),
        AttributeValue::Map(map) => Tagged::Map(to_tagged_map(Some(path), map)?),
        AttributeValue::GrantType(g) => Tagged::GrantType(g.as_str().to_string()),
        AttributeValue::Scopes(s) => Tagged::Scopes(s.clone()),
        AttributeValue::Timestamp(t) => Tagged::Timestamp(*t),
    })
}

fn to_tagged_map(parent: Option<&str>, map: &Attributes) -> AuthResult<BTreeMap<String, Tagged>> {
    map.iter()
        .map(|(key, value)| {
            let path = match parent {
                Some(parent) => format!("{parent}.{key}"),
                None => key.clone(),
            };
            to_tagged(&path, value).map(|t| (key.clone(), t))
        })
        .collect()
}

fn from_tagged(value: Tagged) -> AuthResult<AttributeValue> {
    Ok(match value {
        Tagged::String(s) => AttributeValue::String(s),
        Tagged::Bool(b) => AttributeValue::Bool(b),
        Tagged::Integer(i) => AttributeValue::Integer(i),
        Tagged::Float(raw) => {
            let f: f64 = raw
                .parse()
                .map_err(|_| AuthError::codec(format!("malformed float '{raw}'")))?;
            if !f.is_finite() {
                return Err(AuthError::codec(format!("non-finite float '{raw}'")));
            }
            AttributeValue::Float(f)
        }
        Tagged::List(items) => AttributeValue::List(
            items
                .into_iter()
                .map(from_tagged)
                .collect::<AuthResult<_>>()?,
        ),
        Tagged::Map(map) => AttributeValue::Map(from_tagged_map(map)?),
        Tagged::GrantType(g) => AttributeValue::GrantType(
            resolve_grant_type(&g).map_err(|_| AuthError::codec("blank grant_type value"))?,
        ),
        Tagged::Scopes(s) => AttributeValue::Scopes(s),
        Tagged::Timestamp(t) => AttributeValue::Timestamp(t),
    })
}

fn from_tagged_map(map: BTreeMap<String, Tagged>) -> AuthResult<Attributes> {
    map.into_iter()
        .map(|(k, v)| from_tagged(v).map(|v| (k, v)))
        .collect()
}

// =============================================================================
// Public API
// =============================================================================

/// Encodes a map to its storable string form.
///
/// An empty map encodes to the empty string.
///
/// # Errors
///
/// Returns `Codec` if any value cannot be represented exactly.
pub fn encode(map: &Attributes) -> AuthResult<String> {
    if map.is_empty() {
        return Ok(String::new());
    }
    let tagged = to_tagged_map(None, map)?;
    serde_json::to_string(&tagged).map_err(|e| AuthError::codec(e.to_string()))
}

/// Decodes a stored string back into a map.
///
/// The empty (or blank) string decodes to an empty map.
///
/// # Errors
///
/// Returns `Codec` for malformed documents or unknown type tags.
pub fn decode(encoded: &str) -> AuthResult<Attributes> {
    if encoded.trim().is_empty() {
        return Ok(Attributes::new());
    }
    let tagged: BTreeMap<String, Tagged> =
        serde_json::from_str(encoded).map_err(|e| AuthError::codec(e.to_string()))?;
    from_tagged_map(tagged)
}

/// Like [`encode`], but yields `None` for an empty map.
///
/// # Errors
///
/// Returns `Codec` if any value cannot be represented exactly.
pub fn encode_optional(map: &Attributes) -> AuthResult<Option<String>> {
    encode(map).map(|s| if s.is_empty() { None } else { Some(s) })
}

/// Like [`decode`], treating an absent column as the empty map.
///
/// # Errors
///
/// Returns `Codec` for malformed documents or unknown type tags.
pub fn decode_optional(encoded: Option<&str>) -> AuthResult<Attributes> {
    decode(encoded.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn scopes(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_map_sentinel() {
        assert_eq!(encode(&Attributes::new()).unwrap(), "");
        assert!(decode("").unwrap().is_empty());
        assert!(decode("   ").unwrap().is_empty());
        assert_eq!(encode_optional(&Attributes::new()).unwrap(), None);
        assert!(decode_optional(None).unwrap().is_empty());
    }

    #[test]
    fn test_nested_map_and_string_set_round_trip() {
        let mut nested = Attributes::new();
        nested.insert("redirect_uri".into(), "https://app.example/cb".into());
        nested.insert("attempts".into(), 3.into());

        let mut attributes = Attributes::new();
        attributes.insert("request".into(), AttributeValue::Map(nested));
        attributes.insert(
            "authorized_scopes".into(),
            AttributeValue::Scopes(scopes(&["profile", "openid", "email"])),
        );

        let decoded = decode(&encode(&attributes).unwrap()).unwrap();
        assert_eq!(decoded, attributes);

        // Set equality does not depend on insertion order.
        assert_eq!(
            decoded["authorized_scopes"],
            AttributeValue::Scopes(scopes(&["email", "openid", "profile"]))
        );
    }

    #[test]
    fn test_every_supported_type_keeps_its_identity() {
        let mut attributes = Attributes::new();
        attributes.insert("s".into(), "42".into());
        attributes.insert("i".into(), 42.into());
        attributes.insert("f".into(), 0.1.into());
        attributes.insert("neg".into(), (-7.25e-12).into());
        attributes.insert("b".into(), true.into());
        attributes.insert(
            "l".into(),
            AttributeValue::List(vec!["a".into(), 1.into(), false.into()]),
        );
        attributes.insert(
            "g".into(),
            AttributeValue::GrantType(AuthorizationGrantType::Extension("urn:custom:x".into())),
        );
        attributes.insert(
            "g2".into(),
            AttributeValue::GrantType(AuthorizationGrantType::RefreshToken),
        );
        attributes.insert(
            "t".into(),
            AttributeValue::Timestamp(datetime!(2024-03-01 12:30:45.123456789 UTC)),
        );

        let decoded = decode(&encode(&attributes).unwrap()).unwrap();
        assert_eq!(decoded, attributes);
        assert_eq!(decoded["s"].as_str(), Some("42"));
        assert_eq!(decoded["i"].as_i64(), Some(42));
    }

    #[test]
    fn test_non_finite_float_rejected_at_encode() {
        let mut attributes = Attributes::new();
        let mut inner = Attributes::new();
        inner.insert("score".into(), f64::NAN.into());
        attributes.insert("risk".into(), AttributeValue::Map(inner));

        let err = encode(&attributes).unwrap_err();
        assert!(err.is_codec_error());
        assert!(err.to_string().contains("risk.score"));

        let mut attributes = Attributes::new();
        attributes.insert(
            "list".into(),
            AttributeValue::List(vec![1.into(), f64::INFINITY.into()]),
        );
        let err = encode(&attributes).unwrap_err();
        assert!(err.to_string().contains("list[1]"));
    }

    #[test]
    fn test_json_conversion_rejects_lossy_values() {
        assert!(AttributeValue::try_from(json!(null)).is_err());
        assert!(AttributeValue::try_from(json!({"a": [1, null]})).is_err());
        assert!(AttributeValue::try_from(json!(u64::MAX)).is_err());

        let claims = attributes_from_json(json!({
            "sub": "user-1",
            "auth_time": 1700000000,
            "amr": ["pwd", "otp"],
            "address": {"country": "NZ"}
        }))
        .unwrap();
        assert_eq!(claims["sub"].as_str(), Some("user-1"));
        assert_eq!(claims["auth_time"].as_i64(), Some(1_700_000_000));
        assert_eq!(decode(&encode(&claims).unwrap()).unwrap(), claims);

        assert!(attributes_from_json(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_tags_and_garbage() {
        assert!(decode("not json").unwrap_err().is_codec_error());
        assert!(
            decode(r#"{"x":{"@type":"object_stream","@value":"rO0AB"}}"#)
                .unwrap_err()
                .is_codec_error()
        );
        assert!(decode(r#"{"x":{"@type":"float","@value":"NaN"}}"#).is_err());
        assert!(decode(r#"{"x":{"@type":"grant_type","@value":""}}"#).is_err());
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let mut attributes = Attributes::new();
        attributes.insert("n".into(), 5.into());
        let encoded = encode(&attributes).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(raw, json!({"n": {"@type": "integer", "@value": 5}}));
    }
}
