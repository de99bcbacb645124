//! Unwrapping of the service's JSON envelopes.
//!
//! Single entities arrive as `{"tournament": {...}}` and collections as
//! `[{"tournament": {...}}, ...]`. The client strips the wrapper and hands
//! callers the inner mapping untyped; the shape of the fields is defined
//! entirely by the remote service and not validated locally.

use serde_json::Value;

use crate::error::ApiError;

/// An entity's fields as returned by the service, untyped.
pub type Record = serde_json::Map<String, Value>;

/// Strip a single-entity envelope: `{"<name>": {...}}` → the inner mapping.
pub fn unwrap_record(value: Value, name: &str) -> Result<Record, ApiError> {
    match value {
        Value::Object(mut map) => match map.remove(name) {
            Some(Value::Object(inner)) => Ok(inner),
            _ => Err(ApiError::Decode(format!(
                "response is missing the {name:?} envelope"
            ))),
        },
        _ => Err(ApiError::Decode(format!(
            "expected an object wrapped in {name:?}"
        ))),
    }
}

/// Strip a collection envelope: `[{"<name>": {...}}, ...]` → inner mappings,
/// preserving the service's ordering.
pub fn unwrap_collection(value: Value, name: &str) -> Result<Vec<Record>, ApiError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| unwrap_record(item, name))
            .collect(),
        _ => Err(ApiError::Decode(format!(
            "expected an array of objects wrapped in {name:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_a_single_record() {
        let value = json!({"tournament": {"id": 1, "name": "cup"}});
        let record = unwrap_record(value, "tournament").unwrap();
        assert_eq!(record["name"], "cup");
    }

    #[test]
    fn missing_envelope_key_is_a_decode_error() {
        let value = json!({"participant": {"id": 1}});
        let err = unwrap_record(value, "tournament").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn unwraps_a_collection_in_order() {
        let value = json!([
            {"match": {"id": 10}},
            {"match": {"id": 7}},
        ]);
        let records = unwrap_collection(value, "match").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], 10);
        assert_eq!(records[1]["id"], 7);
    }

    #[test]
    fn collection_with_a_bad_item_fails() {
        let value = json!([{"match": {"id": 10}}, {"other": {}}]);
        assert!(unwrap_collection(value, "match").is_err());
    }

    #[test]
    fn non_array_collection_is_a_decode_error() {
        let err = unwrap_collection(json!({"match": {}}), "match").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
