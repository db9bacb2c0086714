use clap::Subcommand;
use lucli_materialize::atomic_write;
use lucli_schema::merge::build_override;
use serde_json::Value;
use std::path::PathBuf;

use crate::commands::{EXIT_FAILURE, EXIT_SUCCESS};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print a manifest value at a dotted key path, e.g. `jvm.maxMemory`.
    Get {
        key: String,
        #[arg(default_value = ".")]
        project_dir: PathBuf,
    },
    /// Set a manifest value at a dotted key path without starting the server.
    Set {
        key: String,
        value: String,
        #[arg(default_value = ".")]
        project_dir: PathBuf,
    },
}

fn manifest_path(project_dir: &std::path::Path) -> PathBuf {
    project_dir.join("lucee.json")
}

fn dotted_get<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |acc, segment| acc.get(segment))
}

pub fn run(action: &ConfigCommands) -> u8 {
    match action {
        ConfigCommands::Get { key, project_dir } => {
            let path = manifest_path(project_dir);
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("error: could not read {}: {e}", path.display());
                    return EXIT_FAILURE;
                }
            };
            let root: Value = match serde_json::from_str(&content) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("error: malformed manifest: {e}");
                    return EXIT_FAILURE;
                }
            };
            match dotted_get(&root, key) {
                Some(value) => {
                    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
                    EXIT_SUCCESS
                }
                None => {
                    eprintln!("error: key '{key}' is not set");
                    EXIT_FAILURE
                }
            }
        }
        ConfigCommands::Set {
            key,
            value,
            project_dir,
        } => {
            let path = manifest_path(project_dir);
            let mut root: Value = match std::fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({})),
                Err(_) => serde_json::json!({}),
            };
            let overlay = build_override(key, value);
            lucli_schema::merge::deep_merge(&mut root, &overlay);
            let rendered = match serde_json::to_string_pretty(&root) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("error: {e}");
                    return EXIT_FAILURE;
                }
            };
            match atomic_write(&path, rendered.as_bytes()) {
                Ok(()) => {
                    println!("set {key} = {value}");
                    EXIT_SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    EXIT_FAILURE
                }
            }
        }
    }
}
