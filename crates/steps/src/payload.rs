//! Helpers for the JSON payload threaded between steps.

use serde_json::{Map, Value};

/// Shallow-merge `patch`'s fields over `base`.
///
/// When either side is not an object the patch replaces the base outright.
pub fn merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            base.extend(patch);
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

/// Return `payload` with `key` set to `value`.
///
/// A non-object payload is wrapped as `{"input": payload}` first so the field
/// always has somewhere to go.
pub fn with_field(payload: Value, key: &str, value: Value) -> Value {
    let mut object = match payload {
        Value::Object(object) => object,
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("input".to_owned(), other);
            wrapped
        }
    };
    object.insert(key.to_owned(), value);
    Value::Object(object)
}

/// JavaScript-style truthiness of an optional field.
///
/// `null`, `false`, `0`, `""` and a missing field are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
