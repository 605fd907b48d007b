//! Strip empty values from JSON payloads before they go to the API.

use serde_json::{Map, Value};

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Remove null, `""`, `[]` and `{}` anywhere in `value`, children first, so a
/// container emptied by pruning is removed as well. Returns `None` when
/// nothing survives. `0` and `false` are kept.
pub fn prune_empty(value: Value) -> Option<Value> {
    let pruned = match value {
        Value::Array(items) => Value::Array(items.into_iter().filter_map(prune_empty).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(key, child)| prune_empty(child).map(|child| (key, child)))
                .collect::<Map<String, Value>>(),
        ),
        scalar => scalar,
    };

    (!is_empty(&pruned)).then_some(pruned)
}
