//! Canonical JSON serialization.
//!
//! Recursively sorts object keys so two logically equal JSON values
//! with different key order or whitespace serialize to the identical
//! byte string. `serde_json::Map` already sorts lexicographically
//! unless a dependency upstream enables the `preserve_order` feature
//! on `serde_json`; we rebuild the tree explicitly so key stability
//! (property 1) does not depend on that feature staying off anywhere
//! in the dependency graph.

use serde_json::{Map, Value};

/// Rebuild `value` with every object's keys sorted lexicographically,
/// at every depth. Array order is left untouched.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` to its canonical, whitespace-free string form.
pub fn to_canonical_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("JSON values always serialize")
}
