//! Object-notation fallback for value types without a packer

use crate::value::InteropValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::warn;

/// Serialize `value` into a `JsonObject` slot. Failure yields `Null`.
pub fn to_json_slot<T: Serialize + ?Sized>(value: &T) -> InteropValue<'static> {
    match serde_json::to_string(value) {
        Ok(text) => InteropValue::JsonObject(Cow::Owned(text)),
        Err(err) => {
            warn!(
                "Failed to serialize {} for script: {}",
                std::any::type_name::<T>(),
                err
            );
            InteropValue::Null
        }
    }
}

/// Deserialize from a `JsonObject` or `String` slot.
pub fn from_json_slot<T: DeserializeOwned>(slot: &InteropValue<'_>) -> Option<T> {
    let text = text_of(slot)?;
    serde_json::from_str(text).ok()
}

/// Parse a text slot as a key/value map.
pub fn parse_object(slot: &InteropValue<'_>) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text_of(slot)?) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub fn read_f32(map: &Map<String, Value>, key: &str) -> Option<f32> {
    map.get(key).and_then(Value::as_f64).map(|v| v as f32)
}

fn text_of<'s>(slot: &'s InteropValue<'_>) -> Option<&'s str> {
    match slot {
        InteropValue::JsonObject(text) | InteropValue::String(text) => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Spawn {
        name: String,
        count: u32,
    }

    #[test]
    fn test_json_slot_round_trip() {
        let spawn = Spawn {
            name: "crate".into(),
            count: 3,
        };
        let slot = to_json_slot(&spawn);
        assert!(matches!(slot, InteropValue::JsonObject(_)));
        assert_eq!(from_json_slot::<Spawn>(&slot), Some(spawn));
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object(&InteropValue::str("[1,2]")).is_none());
        assert!(parse_object(&InteropValue::str("not json")).is_none());
        assert!(parse_object(&InteropValue::Int32(1)).is_none());

        let map = parse_object(&InteropValue::str(r#"{"x": 1.5}"#)).unwrap();
        assert_eq!(read_f32(&map, "x"), Some(1.5));
        assert_eq!(read_f32(&map, "y"), None);
    }
}
