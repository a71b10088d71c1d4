//! The data store each view accumulates across renders and syncs.
//!
//! Merging is deep for objects only: nested objects merge key by key, while
//! arrays and scalars from the incoming value replace what was there.  A
//! `null` input leaves the store untouched.

use serde_json::{Map, Value};

/// Accumulated view data.  Always a JSON object at the top level.
pub type Data = Map<String, Value>;

/// Deep-merge `incoming` into `target`.
pub fn merge(target: &mut Data, incoming: &Data) {
    for (key, value) in incoming {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(next)) => merge(existing, next),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Name of the JSON type of `value`, for diagnostics.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// View `value` as an object.  `null` counts as an empty object; any other
/// non-object yields `None`.
pub(crate) fn as_object(value: &Value) -> Option<Data> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Data::new()),
        _ => None,
    }
}
