//! Path accessors over JSON documents.
//!
//! Open-data JSON exports nest optional objects several levels deep and switch
//! between "one object" and "array of objects" depending on the count. These
//! helpers read both shapes and fall back to absence instead of failing.

use serde_json::Value;

/// Walk `path` through nested objects.
pub fn node_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Trimmed string leaf at `path`; anything else (missing, null, number, object) is `None`.
pub fn text_at(value: &Value, path: &[&str]) -> Option<String> {
    node_at(value, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a node that may hold one object or an array of them.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ Value::Object(_)) => vec![v],
        _ => Vec::new(),
    }
}
