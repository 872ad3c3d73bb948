//! [`DynamicValue`] back to JSON.

use super::value::{DynamicValue, UNKNOWN_SENTINEL};
use crate::errors::EncodeError;
use serde_json::{Map, Value};

/// Encode a dynamic value as JSON.
///
/// A top-level null encodes to `None` (nothing to send). A top-level unknown
/// cannot be encoded. Nested unknowns are written as the `???` sentinel so
/// that a partially known plan can still be handed to a script.
pub fn encode(value: &DynamicValue) -> Result<Option<Value>, EncodeError> {
    match value {
        DynamicValue::Unknown(_) => Err(EncodeError::UnknownValue),
        DynamicValue::Null(_) => Ok(None),
        other => Ok(Some(encode_nested(other))),
    }
}

/// Encode and serialize to a compact JSON string.
pub fn encode_to_string(value: &DynamicValue) -> Result<Option<String>, EncodeError> {
    match encode(value)? {
        Some(json) => serde_json::to_string(&json)
            .map(Some)
            .map_err(EncodeError::Serialize),
        None => Ok(None),
    }
}

fn encode_nested(value: &DynamicValue) -> Value {
    match value {
        DynamicValue::Null(_) => Value::Null,
        DynamicValue::Unknown(_) => Value::String(UNKNOWN_SENTINEL.to_string()),
        DynamicValue::Bool(b) => Value::Bool(*b),
        DynamicValue::Number(n) => Value::Number(n.clone()),
        DynamicValue::String(s) => Value::String(s.clone()),
        DynamicValue::Tuple(t) => Value::Array(t.elements().iter().map(encode_nested).collect()),
        DynamicValue::Object(o) => Value::Object(
            o.attributes()
                .iter()
                .map(|(name, item)| (name.clone(), encode_nested(item)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::decode::decode;
    use crate::dynamic::value::DynamicType;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_top_level_unknown_fails() {
        let err = encode(&DynamicValue::unknown()).unwrap_err();
        assert!(matches!(err, EncodeError::UnknownValue));
        assert_eq!(err.to_string(), "Underlying value is unknown");
    }

    #[test]
    fn test_top_level_null_is_absent() {
        assert_eq!(encode(&DynamicValue::null()).unwrap(), None);
        assert_eq!(
            encode(&DynamicValue::Null(DynamicType::String)).unwrap(),
            None
        );
        assert_eq!(encode_to_string(&DynamicValue::null()).unwrap(), None);
    }

    #[test]
    fn test_nested_null_and_unknown() {
        let value = DynamicValue::object(BTreeMap::from([
            ("gone".to_string(), DynamicValue::null()),
            ("later".to_string(), DynamicValue::unknown()),
            ("now".to_string(), DynamicValue::Bool(true)),
        ]));
        assert_eq!(
            encode(&value).unwrap(),
            Some(json!({"gone": null, "later": "???", "now": true}))
        );
    }

    #[test]
    fn test_decoded_documents_survive_round_trip() {
        let documents = [
            r#"{"foo": "bar"}"#,
            r#"{"foo": {"bar": "baz"}, "list": [1, "two", false, null]}"#,
            r#"[{"foo": "bar"}, {"foo": "baz"}]"#,
            r#"{"big": 12345678901234567890123, "precise": 1.10, "exp": 1.5e10}"#,
            r#"{"pending": "???", "ready": ["a", "???"]}"#,
            r#""plain""#,
        ];
        for text in documents {
            let original: Value = serde_json::from_str(text).unwrap();
            let decoded = decode(&original).unwrap();
            assert_eq!(encode(&decoded).unwrap(), Some(original), "document {}", text);
        }
    }

    #[test]
    fn test_encode_to_string_is_compact() {
        let decoded = decode(&json!({"b": [1, 2], "a": "x"})).unwrap();
        assert_eq!(
            encode_to_string(&decoded).unwrap(),
            Some(r#"{"a":"x","b":[1,2]}"#.to_string())
        );
    }
}
