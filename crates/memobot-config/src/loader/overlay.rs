use serde_json::{Map, Value};

/// Apply `layer` on top of `target`. Objects are combined key by key; any
/// other value, arrays included, replaces what was there.
pub(super) fn overlay(target: &mut Value, layer: &Value) {
    let Value::Object(layer_map) = layer else {
        *target = layer.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in layer_map {
            overlay(target_map.entry(key.as_str()).or_insert(Value::Null), value);
        }
    }
}
