//! The reference [`ValueSystem`] backend (spec §4.A, "external collaborators
//! ... the concrete JSON backend").
//!
//! The core crates never mention `serde_json`; this crate is the one place
//! that wires `lattice_core::ValueSystem` to a concrete representation, the
//! way the teacher's `lumen-provider-json` wires a tool-provider capability
//! to `serde_json::Value`. Embedders that already have their own JSON type
//! can implement `ValueSystem` directly and skip this crate entirely.

use lattice_core::{LatticeError, LatticeResult, ValueKind, ValueSystem};
use serde_json::{Map, Number, Value};

/// A `serde_json`-backed implementation of the value capability. Stateless;
/// every method borrows or returns an owned [`Value`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSystem;

impl JsonSystem {
    pub fn new() -> Self {
        Self
    }
}

impl ValueSystem for JsonSystem {
    type Handle = Value;

    fn parse(&self, json: &str) -> LatticeResult<Value> {
        serde_json::from_str(json).map_err(|e| LatticeError::json(0, e.to_string()))
    }

    fn print(&self, value: &Value) -> LatticeResult<String> {
        serde_json::to_string(value).map_err(|e| LatticeError::json(0, e.to_string()))
    }

    fn null(&self) -> Value {
        Value::Null
    }

    fn boolean(&self, b: bool) -> Value {
        Value::Bool(b)
    }

    fn number(&self, n: f64) -> Value {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }

    fn string(&self, s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn empty_array(&self) -> Value {
        Value::Array(Vec::new())
    }

    fn empty_object(&self) -> Value {
        Value::Object(Map::new())
    }

    fn clone_value(&self, value: &Value) -> Value {
        value.clone()
    }

    fn kind(&self, value: &Value) -> ValueKind {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    fn as_bool(&self, value: &Value) -> Option<bool> {
        value.as_bool()
    }

    fn as_number(&self, value: &Value) -> Option<f64> {
        value.as_f64()
    }

    fn as_str<'a>(&self, value: &'a Value) -> Option<&'a str> {
        value.as_str()
    }

    fn length(&self, value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.len()),
            Value::Array(a) => Some(a.len()),
            Value::Object(o) => Some(o.len()),
            _ => None,
        }
    }

    fn index_get(&self, array: &Value, i: usize) -> Option<Value> {
        array.as_array().and_then(|a| a.get(i)).cloned()
    }

    fn key_get(&self, object: &Value, key: &str) -> Option<Value> {
        object.as_object().and_then(|o| o.get(key)).cloned()
    }

    fn array_push(&self, array: &mut Value, item: Value) {
        if let Value::Array(a) = array {
            a.push(item);
        }
    }

    fn object_set(&self, object: &mut Value, key: &str, item: Value) {
        if let Value::Object(o) = object {
            o.insert(key.to_string(), item);
        }
    }

    fn keys(&self, object: &Value) -> Vec<String> {
        match object {
            Value::Object(o) => o.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_and_print_round_trip() {
        let sys = JsonSystem::new();
        let value = sys.parse(r#"{"a":1,"b":[true,null,"x"]}"#).unwrap();
        assert_eq!(sys.kind(&value), ValueKind::Object);
        let printed = sys.print(&value).unwrap();
        let reparsed = sys.parse(&printed).unwrap();
        assert_eq!(value, reparsed);
    }

    #[test]
    fn parse_error_is_json_kind() {
        let sys = JsonSystem::new();
        let err = sys.parse("not json").unwrap_err();
        assert_eq!(err.kind, lattice_core::ErrorKind::Json);
    }

    #[test]
    fn object_preserves_insertion_order() {
        let sys = JsonSystem::new();
        let mut obj = sys.empty_object();
        sys.object_set(&mut obj, "z", sys.number(1.0));
        sys.object_set(&mut obj, "a", sys.number(2.0));
        assert_eq!(sys.keys(&obj), vec!["z".to_string(), "a".to_string()]);
    }

    #[test]
    fn array_push_and_index_get() {
        let sys = JsonSystem::new();
        let mut arr = sys.empty_array();
        sys.array_push(&mut arr, sys.string("x"));
        sys.array_push(&mut arr, sys.string("y"));
        assert_eq!(sys.length(&arr), Some(2));
        assert_eq!(sys.as_str(&sys.index_get(&arr, 1).unwrap()), Some("y"));
    }

    #[test]
    fn number_nan_maps_to_null() {
        let sys = JsonSystem::new();
        assert_eq!(sys.number(f64::NAN), Value::Null);
    }

    #[test]
    fn clone_value_is_a_deep_copy() {
        let sys = JsonSystem::new();
        let mut obj = sys.empty_object();
        let mut inner = sys.empty_array();
        sys.array_push(&mut inner, sys.number(1.0));
        sys.object_set(&mut obj, "items", inner);

        let cloned = sys.clone_value(&obj);
        let mut obj2 = obj;
        if let Some(items) = sys.key_get(&obj2, "items") {
            let mut items = items;
            sys.array_push(&mut items, sys.number(2.0));
            sys.object_set(&mut obj2, "items", items);
        }
        assert_eq!(sys.length(&sys.key_get(&cloned, "items").unwrap()), Some(1));
        assert_eq!(sys.length(&sys.key_get(&obj2, "items").unwrap()), Some(2));
    }
}
