use std::collections::HashSet;

use serde_json::Value;

use crate::fingerprint::{
    canonical_value, decode_payload, fingerprint, FieldPath, Fingerprint, FingerprintError,
};
use crate::store::MatchStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `matched` carries the allow-listed value that let the record through, if any
    Forward { matched: Option<String> },
    Skip,
}

/// How a route decides whether a source record is forwarded.
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    AllowList(AllowList),
    Correlation(Correlation),
}

impl MatchStrategy {
    pub fn evaluate(
        &self,
        route: &str,
        store: &MatchStore,
        payload: &[u8],
    ) -> Result<Decision, FingerprintError> {
        match self {
            MatchStrategy::AllowList(allow_list) => allow_list.evaluate(payload),
            MatchStrategy::Correlation(correlation) => correlation.evaluate(route, store, payload),
        }
    }

    pub fn as_correlation(&self) -> Option<&Correlation> {
        match self {
            MatchStrategy::Correlation(correlation) => Some(correlation),
            MatchStrategy::AllowList(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MatchStrategy::AllowList(_) => "allow_list",
            MatchStrategy::Correlation(_) => "correlation",
        }
    }
}

/// Forwards records whose `field` holds one of a fixed set of values.
/// An empty set forwards everything without looking at the payload.
#[derive(Debug, Clone)]
pub struct AllowList {
    field: FieldPath,
    values: HashSet<String>,
}

impl AllowList {
    pub fn new(field: FieldPath, values: impl IntoIterator<Item = String>) -> Self {
        Self {
            field,
            values: values.into_iter().collect(),
        }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn evaluate(&self, payload: &[u8]) -> Result<Decision, FingerprintError> {
        if self.values.is_empty() {
            return Ok(Decision::Forward { matched: None });
        }

        let payload = decode_payload(payload)?;
        let value = literal(self.field.resolve(&payload)?);
        if self.values.contains(&value) {
            Ok(Decision::Forward {
                matched: Some(value),
            })
        } else {
            Ok(Decision::Skip)
        }
    }
}

/// Text compared against allow-list entries. Strings are taken verbatim,
/// everything else as its canonical compact JSON text, so `123.0` reads `123`.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonical_value(other).to_string(),
    }
}

/// Forwards records whose fingerprint was seen on the route's reference stream.
#[derive(Debug, Clone)]
pub struct Correlation {
    fields: Vec<FieldPath>,
}

impl Correlation {
    pub fn new(fields: Vec<FieldPath>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldPath] {
        &self.fields
    }

    pub fn fingerprint(&self, payload: &[u8]) -> Result<Fingerprint, FingerprintError> {
        fingerprint(payload, &self.fields)
    }

    /// Remembers a reference record. Returns true if its fingerprint is new for the route.
    pub fn ingest(
        &self,
        route: &str,
        store: &MatchStore,
        payload: &[u8],
    ) -> Result<bool, FingerprintError> {
        Ok(store.add(route, self.fingerprint(payload)?))
    }

    pub fn evaluate(
        &self,
        route: &str,
        store: &MatchStore,
        payload: &[u8],
    ) -> Result<Decision, FingerprintError> {
        let fingerprint = self.fingerprint(payload)?;
        if store.contains(route, &fingerprint) {
            Ok(Decision::Forward { matched: None })
        } else {
            Ok(Decision::Skip)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isn_allow_list(values: &[&str]) -> AllowList {
        AllowList::new(
            FieldPath::parse("data.isn").unwrap(),
            values.iter().map(|v| v.to_string()),
        )
    }

    #[test]
    fn test_allow_list_matches_listed_values() {
        let allow_list = isn_allow_list(&["123", "456"]);

        assert_eq!(
            allow_list.evaluate(br#"{"data":{"isn":"123"}}"#).unwrap(),
            Decision::Forward {
                matched: Some("123".to_string())
            }
        );
        assert_eq!(
            allow_list.evaluate(br#"{"data":{"isn":"999"}}"#).unwrap(),
            Decision::Skip
        );
    }

    #[test]
    fn test_allow_list_compares_non_string_values_as_text() {
        let allow_list = isn_allow_list(&["123", "true", "4.5"]);

        for payload in [
            r#"{"data":{"isn":123}}"#,
            r#"{"data":{"isn":123.0}}"#,
            r#"{"data":{"isn":1.23e2}}"#,
            r#"{"data":{"isn":true}}"#,
            r#"{"data":{"isn":4.5}}"#,
        ] {
            assert!(
                matches!(
                    allow_list.evaluate(payload.as_bytes()).unwrap(),
                    Decision::Forward { .. }
                ),
                "{payload} should match"
            );
        }
        assert_eq!(
            allow_list.evaluate(br#"{"data":{"isn":123.0}}"#).unwrap(),
            Decision::Forward {
                matched: Some("123".to_string())
            }
        );
        assert_eq!(
            allow_list.evaluate(br#"{"data":{"isn":null}}"#).unwrap(),
            Decision::Skip
        );
    }

    #[test]
    fn test_allow_list_errors() {
        let allow_list = isn_allow_list(&["123"]);

        assert!(matches!(
            allow_list.evaluate(br#"{"data":{}}"#),
            Err(FingerprintError::FieldNotFound { .. })
        ));
        assert!(matches!(
            allow_list.evaluate(br#"{"other":{}}"#),
            Err(FingerprintError::FieldNotFound { .. })
        ));
        assert!(matches!(
            allow_list.evaluate(b"garbage"),
            Err(FingerprintError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_allow_list_forwards_everything() {
        let allow_list = isn_allow_list(&[]);

        assert_eq!(
            allow_list.evaluate(b"not even json").unwrap(),
            Decision::Forward { matched: None }
        );
    }

    #[test]
    fn test_correlation_forwards_after_reference() {
        let store = MatchStore::new();
        let correlation = Correlation::new(vec![
            FieldPath::parse("fieldA").unwrap(),
            FieldPath::parse("sub.fieldB").unwrap(),
        ]);
        let reference = br#"{"fieldA":"value1","sub":{"fieldB":"value2"},"noise":1}"#;
        let source = br#"{"sub":{"fieldB":"value2","extra":true},"fieldA":"value1"}"#;
        let other = br#"{"fieldA":"value1","sub":{"fieldB":"other"}}"#;

        assert_eq!(
            correlation.evaluate("route", &store, source).unwrap(),
            Decision::Skip
        );

        assert!(correlation.ingest("route", &store, reference).unwrap());
        assert!(!correlation.ingest("route", &store, reference).unwrap());

        assert_eq!(
            correlation.evaluate("route", &store, source).unwrap(),
            Decision::Forward { matched: None }
        );
        assert_eq!(
            correlation.evaluate("route", &store, other).unwrap(),
            Decision::Skip
        );
        assert_eq!(
            correlation.evaluate("another-route", &store, source).unwrap(),
            Decision::Skip
        );
    }

    #[test]
    fn test_strategy_dispatch() {
        let store = MatchStore::new();
        let strategy = MatchStrategy::AllowList(isn_allow_list(&["1"]));

        assert_eq!(strategy.name(), "allow_list");
        assert!(strategy.as_correlation().is_none());
        assert_eq!(
            strategy
                .evaluate("route", &store, br#"{"data":{"isn":"1"}}"#)
                .unwrap(),
            Decision::Forward {
                matched: Some("1".to_string())
            }
        );
    }
}
