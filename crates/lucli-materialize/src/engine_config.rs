//! Engine configuration (JSON): start from `configurationFile` if set,
//! deep-merge the manifest's `configuration` block, then inject computed
//! mappings (spec §4.6 output 4).

use crate::{atomic_write, MaterializeError};
use lucli_schema::merge::deep_merge;
use serde_json::{Map, Value};
use std::path::Path;

/// One virtual-path → physical-path mapping, from an installed dependency
/// or a well-known fixed root (`/modules`, `/builtin`).
#[derive(Debug, Clone)]
pub struct Mapping {
    pub virtual_path: String,
    pub physical_path: String,
}

pub fn build(
    configuration_file_content: Option<&str>,
    configuration_block: &Value,
    dependency_mappings: &[Mapping],
    modules_root: &str,
    builtin_root: &str,
) -> Result<Value, MaterializeError> {
    let mut config: Value = match configuration_file_content {
        Some(content) => serde_json::from_str(content)?,
        None => Value::Object(Map::new()),
    };

    deep_merge(&mut config, configuration_block);

    let mappings_obj = config
        .as_object_mut()
        .expect("config root is always an object")
        .entry("mappings")
        .or_insert_with(|| Value::Object(Map::new()));
    let mappings_map = mappings_obj
        .as_object_mut()
        .ok_or_else(|| MaterializeError::Template("'mappings' is not an object".to_owned()))?;

    for mapping in dependency_mappings {
        mappings_map.insert(
            mapping.virtual_path.clone(),
            Value::String(mapping.physical_path.clone()),
        );
    }
    mappings_map.insert("/modules".to_owned(), Value::String(modules_root.to_owned()));
    mappings_map.insert("/builtin".to_owned(), Value::String(builtin_root.to_owned()));

    Ok(config)
}

pub fn materialize(
    dest: &Path,
    configuration_file_content: Option<&str>,
    configuration_block: &Value,
    dependency_mappings: &[Mapping],
    modules_root: &str,
    builtin_root: &str,
) -> Result<(), MaterializeError> {
    let config = build(
        configuration_file_content,
        configuration_block,
        dependency_mappings,
        modules_root,
        builtin_root,
    )?;
    let rendered = serde_json::to_string_pretty(&config)?;
    atomic_write(dest, rendered.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_from_empty_base_when_no_configuration_file() {
        let config = build(None, &json!({}), &[], "/home/modules", "/home/builtin").unwrap();
        assert_eq!(config["mappings"]["/modules"], "/home/modules");
        assert_eq!(config["mappings"]["/builtin"], "/home/builtin");
    }

    #[test]
    fn deep_merges_configuration_block_onto_configuration_file() {
        let file_content = r#"{"logging":{"level":"info"},"mappings":{"/custom":"/old"}}"#;
        let block = json!({"logging": {"level": "debug"}});
        let config = build(Some(file_content), &block, &[], "/m", "/b").unwrap();
        assert_eq!(config["logging"]["level"], "debug");
        // pre-existing mapping entries from configurationFile survive the merge
        assert_eq!(config["mappings"]["/custom"], "/old");
    }

    #[test]
    fn injects_one_mapping_per_installed_dependency() {
        let mappings = vec![Mapping {
            virtual_path: "/framework/".to_owned(),
            physical_path: "/instances/app/dependencies/fw1".to_owned(),
        }];
        let config = build(None, &json!({}), &mappings, "/m", "/b").unwrap();
        assert_eq!(
            config["mappings"]["/framework/"],
            "/instances/app/dependencies/fw1"
        );
    }

    #[test]
    fn materialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("engine-config.json");
        materialize(&dest, None, &json!({}), &[], "/m", "/b").unwrap();
        let first = std::fs::read(&dest).unwrap();
        materialize(&dest, None, &json!({}), &[], "/m", "/b").unwrap();
        let second = std::fs::read(&dest).unwrap();
        assert_eq!(first, second);
    }
}
