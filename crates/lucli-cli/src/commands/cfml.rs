//! `lucli cfml <expr>` (spec §6): one-shot CFML expression evaluation. Named
//! in spec §1 as an external collaborator ("CFML script execution
//! (one-shot .cfs/.cfm/.cfc) ... only interact with the core through the
//! manifest model and the instance directory layout") — this dispatcher
//! locates the cached engine JAR the same way `Engine::start`'s embedded
//! backend does and shells out to it directly, without provisioning an
//! instance.

use crate::commands::EXIT_FAILURE;
use std::path::Path;
use std::process::Command;

fn cached_engine_jar(home: &Path, version: &str) -> Option<std::path::PathBuf> {
    let candidate = home.join("express").join(version).join("lucee.jar");
    candidate.exists().then_some(candidate)
}

fn engine_version_for_cwd() -> String {
    std::fs::read_to_string("lucee.json")
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        .and_then(|v| v.get("version").and_then(|x| x.as_str()).map(str::to_owned))
        .unwrap_or_else(|| "5".to_owned())
}

/// Run `expr` as a one-shot CFML expression.
pub fn run(home: &Path, expr: &str) -> u8 {
    let version = engine_version_for_cwd();
    let Some(jar) = cached_engine_jar(home, &version) else {
        eprintln!(
            "error: no cached engine distribution for version '{version}' under {}; run `lucli server start` once to provision it",
            home.join("express").display()
        );
        return EXIT_FAILURE;
    };

    match Command::new("java").arg("-jar").arg(&jar).arg("-c").arg(expr).status() {
        Ok(status) => status.code().unwrap_or(1) as u8,
        Err(e) => {
            eprintln!("error: failed to launch engine jar: {e}");
            EXIT_FAILURE
        }
    }
}

/// Shared by `lucli run <file>` and `lucli modules run` (spec §6).
pub fn exec_script(path: &Path, args: &[String]) -> u8 {
    let home = lucli_home();
    let version = engine_version_for_cwd();
    let Some(jar) = cached_engine_jar(&home, &version) else {
        eprintln!(
            "error: no cached engine distribution for version '{version}'; run `lucli server start` once to provision it"
        );
        return EXIT_FAILURE;
    };

    match Command::new("java").arg("-jar").arg(&jar).arg(path).args(args).status() {
        Ok(status) => status.code().unwrap_or(1) as u8,
        Err(e) => {
            eprintln!("error: failed to launch engine jar: {e}");
            EXIT_FAILURE
        }
    }
}

fn lucli_home() -> std::path::PathBuf {
    std::env::var("LUCLI_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".lucli"))
}

fn dirs_home() -> std::path::PathBuf {
    std::env::var("HOME").map(std::path::PathBuf::from).unwrap_or_else(|_| std::path::PathBuf::from("."))
}
