//! `lucli deps install|prune` (spec §4.3, C7): resolve a project's
//! `dependencies`/`devDependencies` against `lucee-lock.json` without
//! touching the runtime or starting anything.

use crate::commands::{json_pretty, parse_overrides, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use clap::Subcommand;
use lucli_core::{Engine, StartOptions};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum DepsCommands {
    /// Resolve and materialize dependencies into the instance's virtual mappings.
    Install {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        environment: Option<String>,
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        #[arg(long)]
        force: bool,
    },
    /// Re-resolve and remove any installed dependency no longer referenced by the manifest.
    Prune {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
}

pub fn run(engine: &Engine, action: &DepsCommands, json: bool) -> u8 {
    match action {
        DepsCommands::Install {
            project_dir,
            name,
            environment,
            overrides,
            force,
        } => install(engine, project_dir, name.clone(), environment.clone(), overrides, *force, false, json),
        DepsCommands::Prune { project_dir, name } => {
            install(engine, project_dir, name.clone(), None, &[], false, true, json)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn install(
    engine: &Engine,
    project_dir: &std::path::Path,
    name: Option<String>,
    environment: Option<String>,
    overrides: &[String],
    force: bool,
    force_prune: bool,
    json: bool,
) -> u8 {
    let overrides = match parse_overrides(overrides) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let opts = StartOptions {
        name,
        environment,
        overrides,
        force,
        ..Default::default()
    };

    let pb = (!json).then(|| spinner("resolving dependencies..."));

    match engine.install_dependencies(project_dir, &opts, force_prune) {
        Ok(outcome) => {
            if let Some(pb) = &pb {
                spin_ok(pb, &format!("{} dependencies resolved for '{}'", outcome.mappings.len(), outcome.name));
            }
            if json {
                let payload = serde_json::json!({
                    "name": outcome.name,
                    "lockPath": outcome.lock_path,
                    "mappings": outcome.mappings.iter().map(|m| serde_json::json!({
                        "name": m.name,
                        "virtualPath": m.virtual_path,
                        "physicalPath": m.physical_path,
                    })).collect::<Vec<_>>(),
                });
                match json_pretty(&payload) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else if pb.is_none() {
                for m in &outcome.mappings {
                    println!("{} -> {}", m.virtual_path, m.physical_path.display());
                }
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, &format!("dependency resolution failed: {e}"));
            } else {
                eprintln!("error: {e}");
            }
            EXIT_FAILURE
        }
    }
}
