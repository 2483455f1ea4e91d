use std::collections::BTreeMap;

use serde_json::Value;

/// Flattens nested bundle objects into dotted keys (`{"a":{"b":"x"}}` -> `a.b`).
///
/// Scalars are rendered as text; arrays and nulls carry no template and are skipped.
pub fn flatten_bundle(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    walk(value, String::new(), &mut out);
    out
}

fn walk(value: &Value, prefix: String, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null | Value::Array(_) => {}
        Value::Bool(v) => {
            out.insert(prefix, v.to_string());
        }
        Value::Number(v) => {
            out.insert(prefix, v.to_string());
        }
        Value::String(v) => {
            out.insert(prefix, v.clone());
        }
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(child, path, out);
            }
        }
    }
}
