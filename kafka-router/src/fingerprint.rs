//! Canonical fingerprints over selected payload fields.
//!
//! A fingerprint is the compact JSON encoding of `(path, value)` pairs sorted
//! by path, so the order in which fields are requested never changes the
//! result:
//!
//! ```text
//! [{"path":"fieldA","value":"v1"},{"path":"sub.fieldB","value":"v2"}]
//! ```
//!
//! Numbers are compared by value: `1`, `1.0` and `1e0` all encode as `1`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    Missing,
    MissingNestedObject,
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundReason::Missing => write!(f, "not found"),
            NotFoundReason::MissingNestedObject => write!(f, "missing nested object"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("payload is not a JSON object: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("field {path} {reason}")]
    FieldNotFound {
        path: String,
        reason: NotFoundReason,
    },
    #[error("field {0} depth unsupported")]
    UnsupportedDepth(String),
    #[error("failed to encode fingerprint: {0}")]
    Encode(#[source] serde_json::Error),
}

impl FingerprintError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FingerprintError::Decode(_) => "decode",
            FingerprintError::FieldNotFound { .. } => "field_not_found",
            FingerprintError::UnsupportedDepth(_) => "unsupported_depth",
            FingerprintError::Encode(_) => "encode",
        }
    }
}

/// Dotted address of a value: `key` or `parent.key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    // Byte offset of the separating dot for two-segment paths
    dot: Option<usize>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, FingerprintError> {
        let mut dots = raw.match_indices('.').map(|(i, _)| i);
        let dot = dots.next();
        if dots.next().is_some() {
            return Err(FingerprintError::UnsupportedDepth(raw.to_string()));
        }
        Ok(FieldPath {
            raw: raw.to_string(),
            dot,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Looks the path up in a decoded payload.
    pub fn resolve<'a>(
        &self,
        payload: &'a Map<String, Value>,
    ) -> Result<&'a Value, FingerprintError> {
        let not_found = |reason| FingerprintError::FieldNotFound {
            path: self.raw.clone(),
            reason,
        };

        match self.dot {
            None => payload
                .get(&self.raw)
                .ok_or_else(|| not_found(NotFoundReason::Missing)),
            Some(dot) => {
                let (parent, key) = (&self.raw[..dot], &self.raw[dot + 1..]);
                let child = payload
                    .get(parent)
                    .and_then(Value::as_object)
                    .ok_or_else(|| not_found(NotFoundReason::MissingNestedObject))?;
                child
                    .get(key)
                    .ok_or_else(|| not_found(NotFoundReason::Missing))
            }
        }
    }
}

impl FromStr for FieldPath {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Opaque correlation key; only this module builds one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct FieldValue<'a> {
    path: &'a str,
    value: Value,
}

/// Copy of `value` with every number in its canonical form. Integral numbers
/// that fit an i64 or u64 become integers, everything else goes through f64.
pub fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn canonical_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    let Some(f) = n.as_f64() else {
        return n.clone();
    };
    if f.fract() == 0.0 {
        if f >= i64::MIN as f64 && f < i64::MAX as f64 {
            return Number::from(f as i64);
        }
        if f >= 0.0 && f < u64::MAX as f64 {
            return Number::from(f as u64);
        }
    }
    Number::from_f64(f).unwrap_or_else(|| n.clone())
}

/// Decodes a payload into its top-level JSON object.
pub fn decode_payload(payload: &[u8]) -> Result<Map<String, Value>, FingerprintError> {
    serde_json::from_slice(payload).map_err(FingerprintError::Decode)
}

pub fn fingerprint(
    payload: &[u8],
    fields: &[FieldPath],
) -> Result<Fingerprint, FingerprintError> {
    let payload = decode_payload(payload)?;

    let mut entries = fields
        .iter()
        .map(|field| {
            field.resolve(&payload).map(|value| FieldValue {
                path: field.as_str(),
                value: canonical_value(value),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable, so repeated paths keep the order they were requested in
    entries.sort_by(|a, b| a.path.cmp(b.path));

    let encoded = serde_json::to_string(&entries).map_err(FingerprintError::Encode)?;
    Ok(Fingerprint(encoded))
}
