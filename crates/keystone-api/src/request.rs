//! Request parsing.
//!
//! Turns a caller-supplied JSON payload into a validated
//! [`TransactionSpec`]. The payload mirrors the wire format:
//!
//! ```json
//! {
//!   "collections": {
//!     "read": ["customers"],
//!     "write": ["orders", 42]
//!   },
//!   "waitForSync": true,
//!   "lockTimeout": 5,
//!   "params": { "amount": 10 }
//! }
//! ```
//!
//! `read` and `write` each accept a single name, a single numeric id,
//! or an array of either. `lockTimeout` is in seconds; zero means wait
//! without bound. Unrecognized fields are ignored; mistyped ones are
//! rejected.

use std::time::Duration;

use serde_json::Value;

use keystone_common::error::{KeystoneError, KeystoneResult};
use keystone_common::types::{CollectionId, CollectionRef};
use keystone_txn::{TransactionOptions, TransactionSpec};

/// Parses one collection reference from a JSON value.
fn parse_reference(field: &str, value: &Value) -> KeystoneResult<CollectionRef> {
    match value {
        Value::String(name) => Ok(CollectionRef::name(name.clone())),
        Value::Number(n) => n
            .as_u64()
            .map(|id| CollectionRef::id(CollectionId::new(id)))
            .ok_or_else(|| {
                KeystoneError::invalid_specification(format!(
                    "'collections.{}' contains an invalid collection id: {}",
                    field, n
                ))
            }),
        other => Err(KeystoneError::invalid_specification(format!(
            "'collections.{}' entries must be names or ids, got {}",
            field,
            json_type_name(other)
        ))),
    }
}

/// Parses a collection set: absent, a single reference, or an array.
fn parse_reference_set(collections: &Value, field: &str) -> KeystoneResult<Vec<CollectionRef>> {
    match collections.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| parse_reference(field, entry))
            .collect(),
        Some(single) => Ok(vec![parse_reference(field, single)?]),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses and validates a transaction request payload.
///
/// Returns `InvalidSpecification` for structural problems; resolution
/// of the references happens later, inside the coordinator.
pub fn parse_request(payload: &Value) -> KeystoneResult<TransactionSpec> {
    let body = payload.as_object().ok_or_else(|| {
        KeystoneError::invalid_specification("request body must be a JSON object")
    })?;

    let collections = body.get("collections").ok_or_else(|| {
        KeystoneError::invalid_specification("'collections' is missing")
    })?;
    if !collections.is_object() {
        return Err(KeystoneError::invalid_specification(format!(
            "'collections' must be an object, got {}",
            json_type_name(collections)
        )));
    }

    let read = parse_reference_set(collections, "read")?;
    let write = parse_reference_set(collections, "write")?;

    let mut options = TransactionOptions::default();
    if let Some(value) = body.get("waitForSync") {
        options.wait_for_sync = value.as_bool().ok_or_else(|| {
            KeystoneError::invalid_specification(format!(
                "'waitForSync' must be a boolean, got {}",
                json_type_name(value)
            ))
        })?;
    }
    if let Some(value) = body.get("lockTimeout") {
        let seconds = value.as_f64().filter(|s| s.is_finite() && *s >= 0.0).ok_or_else(|| {
            KeystoneError::invalid_specification(format!(
                "'lockTimeout' must be a non-negative number of seconds, got {}",
                value
            ))
        })?;
        options.lock_timeout = Duration::try_from_secs_f64(seconds).map_err(|_| {
            KeystoneError::invalid_specification(format!(
                "'lockTimeout' is out of range: {}",
                value
            ))
        })?;
    }
    if let Some(params) = body.get("params") {
        options.params = params.clone();
    }

    let spec = TransactionSpec {
        read,
        write,
        options,
    };
    spec.validate()?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_request() {
        let payload = json!({
            "collections": {
                "read": ["customers"],
                "write": ["orders", 42]
            },
            "waitForSync": true,
            "lockTimeout": 5,
            "params": {"amount": 10}
        });

        let spec = parse_request(&payload).unwrap();
        assert_eq!(spec.read, vec![CollectionRef::name("customers")]);
        assert_eq!(
            spec.write,
            vec![
                CollectionRef::name("orders"),
                CollectionRef::id(CollectionId::new(42)),
            ]
        );
        assert!(spec.options.wait_for_sync);
        assert_eq!(spec.options.lock_timeout, Duration::from_secs(5));
        assert_eq!(spec.options.params, json!({"amount": 10}));
    }

    #[test]
    fn test_single_reference_accepted() {
        let payload = json!({"collections": {"write": "orders"}});
        let spec = parse_request(&payload).unwrap();
        assert_eq!(spec.write, vec![CollectionRef::name("orders")]);
        assert!(spec.read.is_empty());
    }

    #[test]
    fn test_defaults() {
        let payload = json!({"collections": {"read": ["orders"]}});
        let spec = parse_request(&payload).unwrap();
        assert!(!spec.options.wait_for_sync);
        assert!(spec.options.lock_timeout > Duration::ZERO);
        assert_eq!(spec.options.params, Value::Null);
    }

    #[test]
    fn test_zero_lock_timeout_means_unbounded() {
        let payload = json!({
            "collections": {"write": ["orders"]},
            "lockTimeout": 0
        });
        let spec = parse_request(&payload).unwrap();
        assert_eq!(spec.options.lock_timeout, Duration::ZERO);
    }

    #[test]
    fn test_missing_collections_rejected() {
        let err = parse_request(&json!({})).unwrap_err();
        assert!(matches!(err, KeystoneError::InvalidSpecification { .. }));

        let err = parse_request(&json!("not an object")).unwrap_err();
        assert!(matches!(err, KeystoneError::InvalidSpecification { .. }));
    }

    #[test]
    fn test_empty_sets_rejected() {
        let payload = json!({"collections": {"read": [], "write": []}});
        let err = parse_request(&payload).unwrap_err();
        assert!(matches!(err, KeystoneError::InvalidSpecification { .. }));

        let payload = json!({"collections": {}});
        let err = parse_request(&payload).unwrap_err();
        assert!(matches!(err, KeystoneError::InvalidSpecification { .. }));
    }

    #[test]
    fn test_mistyped_fields_rejected() {
        let payload = json!({"collections": {"write": [true]}});
        assert!(parse_request(&payload).is_err());

        let payload = json!({"collections": "orders"});
        assert!(parse_request(&payload).is_err());

        let payload = json!({
            "collections": {"write": ["orders"]},
            "waitForSync": "yes"
        });
        assert!(parse_request(&payload).is_err());

        let payload = json!({
            "collections": {"write": ["orders"]},
            "lockTimeout": -1
        });
        assert!(parse_request(&payload).is_err());
    }

    #[test]
    fn test_oversized_lock_timeout_rejected() {
        // Finite and non-negative, but beyond what a Duration can hold
        let payload = json!({
            "collections": {"write": ["orders"]},
            "lockTimeout": 1e20
        });
        let err = parse_request(&payload).unwrap_err();
        assert!(matches!(err, KeystoneError::InvalidSpecification { .. }));
    }

    #[test]
    fn test_negative_id_rejected() {
        let payload = json!({"collections": {"write": [-5]}});
        assert!(parse_request(&payload).is_err());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let payload = json!({
            "collections": {"write": ["orders"]},
            "somethingNew": 123
        });
        assert!(parse_request(&payload).is_ok());
    }
}
