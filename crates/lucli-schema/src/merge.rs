//! Deep-merge of manifest layers: a recursive tree-walk over a plain
//! `serde_json::Value` tree instead of a fixed TOML schema.
//!
//! Merge order per spec §4.1: defaults → `configurationFile` → project
//! manifest → selected `environments.<name>` → ordered CLI overrides.
//! Objects merge key-by-key recursively. Scalars replace. Arrays replace as
//! a whole. An explicit JSON `null` deletes the corresponding key.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("override '{0}' does not address an object (cannot descend further)")]
    NotAnObject(String),
    #[error("override value for '{0}' is empty")]
    EmptyOverride(String),
}

/// Recursively merge `overlay` onto `base`, mutating `base` in place.
/// A `null` leaf in `overlay` deletes the corresponding key from `base`.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if overlay_val.is_null() {
                    base_map.remove(key);
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && overlay_val.is_object() => {
                        deep_merge(existing, overlay_val);
                    }
                    _ => {
                        base_map.insert(key.clone(), overlay_val.clone());
                    }
                }
            }
        }
        (base_slot, overlay_val) => {
            *base_slot = overlay_val.clone();
        }
    }
}

/// Parse a dot-notation key (e.g. `jvm.maxMemory`) and a raw string value
/// into a one-key-deep override tree, typing the value as the most specific
/// type that parses: boolean, then number, then string (spec §4.1 step 5).
pub fn build_override(dotted_key: &str, raw_value: &str) -> Value {
    let typed = parse_override_value(raw_value);
    let mut path: Vec<&str> = dotted_key.split('.').collect();
    let leaf_key = path.pop().expect("split always yields at least one element");

    let mut node = Map::new();
    node.insert(leaf_key.to_owned(), typed);
    let mut value = Value::Object(node);

    for segment in path.into_iter().rev() {
        let mut wrapper = Map::new();
        wrapper.insert(segment.to_owned(), value);
        value = Value::Object(wrapper);
    }
    value
}

fn parse_override_value(raw: &str) -> Value {
    if raw == "true" {
        return Value::Bool(true);
    }
    if raw == "false" {
        return Value::Bool(false);
    }
    if raw == "null" {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(raw.to_owned())
}

/// Apply an ordered list of `key=value` CLI overrides onto `base`.
pub fn apply_overrides<'a>(
    base: &mut Value,
    overrides: impl IntoIterator<Item = (&'a str, &'a str)>,
) {
    for (key, raw_value) in overrides {
        let overlay = build_override(key, raw_value);
        deep_merge(base, &overlay);
    }
}

/// Select and merge `environments.<name>` onto `base`. Fails with
/// `None` if `name` does not exist in `environments`.
pub fn apply_environment(base: &mut Value, environments: &Map<String, Value>, name: &str) -> bool {
    let Some(overlay) = environments.get(name) else {
        return false;
    };
    let overlay = overlay.clone();
    deep_merge(base, &overlay);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_preserves_sibling_keys() {
        let mut base = json!({"port": 8080, "host": "localhost"});
        let overlay = json!({"port": 80});
        deep_merge(&mut base, &overlay);
        assert_eq!(base["port"], 80);
        assert_eq!(base["host"], "localhost");
    }

    #[test]
    fn merge_replaces_arrays_wholesale() {
        let mut base = json!({"jvm": {"additionalArgs": ["-Xa", "-Xb"]}});
        let overlay = json!({"jvm": {"additionalArgs": ["-Xc"]}});
        deep_merge(&mut base, &overlay);
        assert_eq!(base["jvm"]["additionalArgs"], json!(["-Xc"]));
    }

    #[test]
    fn merge_null_deletes_key() {
        let mut base = json!({"a": 1, "b": 2});
        let overlay = json!({"a": null});
        deep_merge(&mut base, &overlay);
        assert!(base.get("a").is_none());
        assert_eq!(base["b"], 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut base = json!({"port": 8080, "jvm": {"maxMemory": "512m"}});
        let env = json!({"port": 80, "jvm": {"maxMemory": "2048m"}});
        let mut once = base.clone();
        deep_merge(&mut once, &env);
        let mut twice = once.clone();
        deep_merge(&mut twice, &env);
        assert_eq!(once, twice);
        let _ = &mut base;
    }

    #[test]
    fn override_types_bool_number_string() {
        assert_eq!(parse_override_value("true"), Value::Bool(true));
        assert_eq!(parse_override_value("8080"), json!(8080));
        assert_eq!(parse_override_value("2048m"), json!("2048m"));
    }

    #[test]
    fn build_override_nests_dotted_path() {
        let v = build_override("jvm.maxMemory", "2048m");
        assert_eq!(v, json!({"jvm": {"maxMemory": "2048m"}}));
    }

    #[test]
    fn apply_overrides_in_order() {
        let mut base = json!({"port": 8080});
        apply_overrides(&mut base, [("port", "80"), ("host", "0.0.0.0")]);
        assert_eq!(base["port"], 80);
        assert_eq!(base["host"], "0.0.0.0");
    }

    #[test]
    fn environment_overlay_example_from_spec() {
        let mut base = json!({"port": 8080, "jvm": {"maxMemory": "512m", "minMemory": "128m"}});
        let mut environments = Map::new();
        environments.insert(
            "prod".to_owned(),
            json!({"port": 80, "jvm": {"maxMemory": "2048m"}}),
        );
        assert!(apply_environment(&mut base, &environments, "prod"));
        assert_eq!(base["port"], 80);
        assert_eq!(base["jvm"]["maxMemory"], "2048m");
        assert_eq!(base["jvm"]["minMemory"], "128m");
    }

    #[test]
    fn unknown_environment_returns_false() {
        let mut base = json!({});
        let environments = Map::new();
        assert!(!apply_environment(&mut base, &environments, "staging"));
    }
}
