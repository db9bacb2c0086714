//! `lucli modules list|init|install|uninstall|update|run` (spec §6).
//!
//! Module packaging itself is named in spec §1 as an external collaborator
//! ("module packaging ... only interact with the core through the manifest
//! model and the instance directory layout"); this is the thin file-based
//! bookkeeping layer the CLI surface still needs, rooted at
//! `LUCLI_HOME/modules/<name>` per spec §6's persisted-state table.

use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::commands::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};

#[derive(Subcommand, Debug)]
pub enum ModulesCommands {
    /// List installed modules.
    List,
    /// Scaffold a new module skeleton.
    Init { name: String },
    /// Install a module from a git URL or local path.
    Install { name: String, source: String },
    /// Remove an installed module.
    Uninstall { name: String },
    /// Re-fetch a git-sourced module's latest revision.
    Update { name: String },
    /// Execute a module's entry point (`run.cfm`) against the CFML engine.
    Run { name: String, args: Vec<String> },
}

#[derive(Debug, Serialize, Deserialize)]
struct ModuleDescriptor {
    name: String,
    source: Option<String>,
}

fn modules_dir(home: &Path) -> PathBuf {
    home.join("modules")
}

fn module_dir(home: &Path, name: &str) -> PathBuf {
    modules_dir(home).join(name)
}

fn descriptor_path(module_dir: &Path) -> PathBuf {
    module_dir.join("module.json")
}

fn read_descriptor(module_dir: &Path) -> Option<ModuleDescriptor> {
    std::fs::read_to_string(descriptor_path(module_dir))
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
}

pub fn run(home: &Path, action: &ModulesCommands, json: bool) -> u8 {
    match action {
        ModulesCommands::List => list(home, json),
        ModulesCommands::Init { name } => init(home, name),
        ModulesCommands::Install { name, source } => install(home, name, source),
        ModulesCommands::Uninstall { name } => uninstall(home, name),
        ModulesCommands::Update { name } => update(home, name),
        ModulesCommands::Run { name, args } => run_module(home, name, args),
    }
}

fn list(home: &Path, json: bool) -> u8 {
    let dir = modules_dir(home);
    let mut names = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&dir) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
    }
    names.sort();
    if json {
        match json_pretty(&names) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error: {e}"),
        }
    } else if names.is_empty() {
        println!("no modules installed");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    EXIT_SUCCESS
}

fn init(home: &Path, name: &str) -> u8 {
    let dir = module_dir(home, name);
    if dir.exists() {
        eprintln!("error: module '{name}' already exists");
        return EXIT_FAILURE;
    }
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("error: {e}");
        return EXIT_FAILURE;
    }
    let descriptor = ModuleDescriptor {
        name: name.to_owned(),
        source: None,
    };
    if let Err(e) = write_descriptor(&dir, &descriptor) {
        eprintln!("error: {e}");
        return EXIT_FAILURE;
    }
    let stub = "// entry point for `lucli modules run`\ncomponent {\n    public void function run(args) {\n    }\n}\n";
    if let Err(e) = std::fs::write(dir.join("run.cfm"), stub) {
        eprintln!("error: {e}");
        return EXIT_FAILURE;
    }
    println!("initialized module '{name}' at {}", dir.display());
    EXIT_SUCCESS
}

fn write_descriptor(dir: &Path, descriptor: &ModuleDescriptor) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(descriptor).map_err(|e| e.to_string())?;
    std::fs::write(descriptor_path(dir), rendered).map_err(|e| e.to_string())
}

fn install(home: &Path, name: &str, source: &str) -> u8 {
    let dir = module_dir(home, name);
    if dir.exists() {
        eprintln!("error: module '{name}' already installed (use `modules update`)");
        return EXIT_FAILURE;
    }
    if let Err(e) = std::fs::create_dir_all(modules_dir(home)) {
        eprintln!("error: {e}");
        return EXIT_FAILURE;
    }

    let fetched = if source.starts_with("http://") || source.starts_with("https://") || source.starts_with("git@") {
        Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(source)
            .arg(&dir)
            .status()
            .map(|status| status.success())
            .map_err(|e| e.to_string())
    } else {
        copy_dir(Path::new(source), &dir).map(|()| true).map_err(|e| e.to_string())
    };

    match fetched {
        Ok(true) => {
            let descriptor = ModuleDescriptor {
                name: name.to_owned(),
                source: Some(source.to_owned()),
            };
            if let Err(e) = write_descriptor(&dir, &descriptor) {
                eprintln!("error: {e}");
                return EXIT_FAILURE;
            }
            println!("installed module '{name}' from {source}");
            EXIT_SUCCESS
        }
        Ok(false) => {
            let _ = std::fs::remove_dir_all(&dir);
            eprintln!("error: failed to fetch module source '{source}'");
            EXIT_FAILURE
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dir);
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}

fn uninstall(home: &Path, name: &str) -> u8 {
    let dir = module_dir(home, name);
    if !dir.exists() {
        eprintln!("error: no module named '{name}'");
        return EXIT_FAILURE;
    }
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => {
            println!("removed module '{name}'");
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}

fn update(home: &Path, name: &str) -> u8 {
    let dir = module_dir(home, name);
    let Some(descriptor) = read_descriptor(&dir) else {
        eprintln!("error: no module named '{name}'");
        return EXIT_FAILURE;
    };
    let Some(source) = descriptor.source else {
        eprintln!("error: module '{name}' has no recorded source to update from");
        return EXIT_FAILURE;
    };
    if dir.join(".git").exists() {
        match Command::new("git").arg("-C").arg(&dir).arg("pull").arg("--ff-only").status() {
            Ok(status) if status.success() => {
                println!("updated module '{name}'");
                EXIT_SUCCESS
            }
            Ok(_) => {
                eprintln!("error: git pull failed for module '{name}'");
                EXIT_FAILURE
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_FAILURE
            }
        }
    } else {
        match copy_dir(Path::new(&source), &dir) {
            Ok(()) => {
                println!("updated module '{name}' from {source}");
                EXIT_SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_FAILURE
            }
        }
    }
}

fn run_module(home: &Path, name: &str, args: &[String]) -> u8 {
    let dir = module_dir(home, name);
    let entry = dir.join("run.cfm");
    if !entry.exists() {
        eprintln!("error: module '{name}' has no run.cfm entry point");
        return EXIT_FAILURE;
    }
    crate::commands::cfml::exec_script(&entry, args)
}
