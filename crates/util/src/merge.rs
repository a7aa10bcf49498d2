//! Structural merging of JSON configuration where `null` means "not given".
//!
//! Call-site overrides are merged over base configuration with three rules:
//! objects merge key by key, arrays are replaced wholesale, and a `null` in the
//! overlay never erases a value from the base.

use serde_json::{Map, Value};

/// Merge `patch` over `base`, keeping every base value the patch leaves undefined.
///
/// # Examples
/// ```rust
/// use lister_util::merge::deep_merge_defined;
/// use serde_json::json;
///
/// let base = json!({"sort": "name", "page": {"size": 20, "cursor": "a"}, "tags": ["x", "y"]});
/// let patch = json!({"sort": null, "page": {"size": 50}, "tags": ["z"]});
///
/// let merged = deep_merge_defined(&base, &patch);
/// assert_eq!(merged, json!({"sort": "name", "page": {"size": 50, "cursor": "a"}, "tags": ["z"]}));
/// ```
pub fn deep_merge_defined(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (_, Value::Null) => base.clone(),
        (Value::Object(base_map), Value::Object(patch_map)) => Value::Object(merge_defined_maps(base_map, patch_map)),
        (_, patch) => strip_undefined(patch),
    }
}

/// Object form of [`deep_merge_defined`].
pub fn merge_defined_maps(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, patch_value) in patch {
        if patch_value.is_null() {
            continue;
        }
        let next = match merged.get(key) {
            Some(base_value) => deep_merge_defined(base_value, patch_value),
            None => strip_undefined(patch_value),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

/// Drop `null` members from objects so they never materialize as keys.
fn strip_undefined(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, member)| !member.is_null())
                .map(|(key, member)| (key.clone(), strip_undefined(member)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Look up a dotted path (`"owner.id"`, `"items.0.name"`) inside a JSON value.
///
/// An empty path or `"."` returns the value itself. Numeric segments index
/// into arrays.
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return Some(value);
    }

    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_in_patch_never_overwrites() {
        let base = json!({"a": 1, "nested": {"b": "keep"}});
        let patch = json!({"a": null, "nested": {"b": null}});
        assert_eq!(deep_merge_defined(&base, &patch), base);
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let base = json!({"columns": ["name", "email"]});
        let patch = json!({"columns": ["slug"]});
        assert_eq!(deep_merge_defined(&base, &patch), json!({"columns": ["slug"]}));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let base = json!({"a": {"b": 1, "c": [1, 2]}, "d": "x"});
        let patch = json!({"a": {"c": [3], "e": null}, "f": true});
        let once = deep_merge_defined(&base, &patch);
        let twice = deep_merge_defined(&once, &patch);
        assert_eq!(once, twice);
        assert!(once["a"].get("e").is_none(), "null members must not materialize");
    }

    #[test]
    fn scalar_patch_replaces_object_base() {
        let base = json!({"a": {"b": 1}});
        let patch = json!({"a": "flat"});
        assert_eq!(deep_merge_defined(&base, &patch), json!({"a": "flat"}));
    }

    #[test]
    fn value_at_path_walks_objects_and_arrays() {
        let payload = json!({"data": {"items": [{"id": "a"}, {"id": "b"}]}});
        assert_eq!(value_at_path(&payload, "data.items.1.id"), Some(&json!("b")));
        assert_eq!(value_at_path(&payload, "."), Some(&payload));
        assert!(value_at_path(&payload, "data.missing").is_none());
        assert!(value_at_path(&payload, "data.items.x").is_none());
    }
}
