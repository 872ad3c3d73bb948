//! Untyped JSON to [`DynamicValue`].

use super::path::ValuePath;
use super::value::{DynamicType, DynamicValue, ObjectValue, TupleValue, UNKNOWN_SENTINEL};
use crate::errors::DecodeError;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Decode a parsed JSON document into a typed dynamic value.
///
/// Arrays become tuples and objects become objects with exactly the
/// attributes present. The string `???` becomes an unknown at whatever
/// depth it appears; its siblings are decoded normally.
pub fn decode(value: &Value) -> Result<DynamicValue, DecodeError> {
    decode_at(value, &ValuePath::root())
}

fn decode_at(value: &Value, path: &ValuePath) -> Result<DynamicValue, DecodeError> {
    match value {
        Value::Null => Ok(DynamicValue::Null(DynamicType::Dynamic)),
        Value::Bool(b) => Ok(DynamicValue::Bool(*b)),
        Value::Number(n) => decode_number(n, path),
        Value::String(s) if s == UNKNOWN_SENTINEL => Ok(DynamicValue::Unknown(DynamicType::Dynamic)),
        Value::String(s) => Ok(DynamicValue::String(s.clone())),
        Value::Array(items) => {
            let elements = items
                .iter()
                .enumerate()
                .map(|(i, item)| decode_at(item, &path.at_index(i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynamicValue::Tuple(TupleValue::new(elements)))
        }
        Value::Object(map) => {
            let attributes: BTreeMap<String, DynamicValue> = map
                .iter()
                .map(|(name, item)| Ok((name.clone(), decode_at(item, &path.at_name(name))?)))
                .collect::<Result<_, DecodeError>>()?;
            Ok(DynamicValue::Object(ObjectValue::new(attributes)))
        }
    }
}

// The textual form is kept as-is so large or precise numbers survive a
// round trip. Only numbers with no finite f64 reading are rejected.
fn decode_number(n: &Number, path: &ValuePath) -> Result<DynamicValue, DecodeError> {
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(DynamicValue::Number(n.clone())),
        _ => Err(DecodeError::UnsupportedType {
            path: path.to_string(),
            value: n.to_string(),
        }),
    }
}
