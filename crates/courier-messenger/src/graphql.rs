//! Helpers for working with Messenger GraphQL payloads.

use serde_json::Value;

/// Persisted query id for the thread list.
pub const THREAD_LIST_DOC_ID: &str = "1349387578499440";

/// Persisted query id for a single thread's info.
pub const THREAD_INFO_DOC_ID: &str = "1508526735892416";

/// Looks up a nested value by key path.
///
/// Each segment indexes into the current object; when the current value
/// is an array, the segment is parsed as a numeric index instead.
pub fn get_value<'a>(source: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = source;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Like [`get_value`], for string leaves.
pub fn get_str<'a>(source: &'a Value, path: &[&str]) -> Option<&'a str> {
    get_value(source, path).and_then(Value::as_str)
}

/// Like [`get_value`], for string leaves, returning an owned copy.
pub fn get_string(source: &Value, path: &[&str]) -> Option<String> {
    get_str(source, path).map(str::to_string)
}
