pub mod cfml;
pub mod completions;
pub mod daemon;
pub mod deps;
pub mod doctor;
pub mod man_pages;
pub mod modules;
pub mod run_file;
pub mod secrets;
pub mod server;

use indicatif::{ProgressBar, ProgressStyle};
use lucli_core::Engine;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MISUSE: u8 = 2;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Colorize an `InstanceState` display string for terminal output, falling
/// back to the plain token when stdout is not a TTY or the state is unknown
/// (spec §7: "consistent across runtimes and terminal capability").
pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "running" => Style::new().green().bold().apply_to(state).to_string(),
        "starting" => Style::new().cyan().apply_to(state).to_string(),
        "stopping" => Style::new().yellow().apply_to(state).to_string(),
        "provisioned-stopped" => Style::new().dim().apply_to(state).to_string(),
        "failed" => Style::new().red().bold().apply_to(state).to_string(),
        "orphaned" => Style::new().magenta().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

/// Resolve a user-supplied instance name against the registry, accepting an
/// unambiguous prefix the same way `lucli-core::registry` resolves exact
/// names — used by `server status`/`stop`/`log`/`open` etc. so `lucli
/// server stop my-a` works when `my-app` is the only match.
pub fn resolve_instance_name(engine: &Engine, input: &str) -> Result<String, String> {
    let views = engine.list().map_err(|e| e.to_string())?;
    if views.iter().any(|v| v.name == input) {
        return Ok(input.to_owned());
    }
    let matches: Vec<_> = views.iter().filter(|v| v.name.starts_with(input)).collect();
    match matches.len() {
        0 => Err(format!("no instance matching '{input}'")),
        1 => Ok(matches[0].name.clone()),
        n => {
            let rendered = matches
                .iter()
                .take(10)
                .map(|v| format!("  {} ({})", v.name, v.state))
                .collect::<Vec<_>>()
                .join("\n");
            Err(format!(
                "ambiguous instance prefix '{input}': matches {n} instances\n\n{rendered}"
            ))
        }
    }
}

/// Parse `key=value` CLI overrides (spec §4.1 step 5) in the order given.
pub fn parse_overrides(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| format!("override '{entry}' is not in key=value form"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_state_running() {
        assert!(colorize_state("running").contains("running"));
    }

    #[test]
    fn colorize_state_unknown_passthrough() {
        assert_eq!(colorize_state("bogus"), "bogus");
    }

    #[test]
    fn parse_overrides_splits_key_value() {
        let raw = vec!["port=8080".to_owned(), "jvm.maxMemory=512m".to_owned()];
        let parsed = parse_overrides(&raw).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("port".to_owned(), "8080".to_owned()),
                ("jvm.maxMemory".to_owned(), "512m".to_owned())
            ]
        );
    }

    #[test]
    fn parse_overrides_rejects_missing_equals() {
        let raw = vec!["port8080".to_owned()];
        assert!(parse_overrides(&raw).is_err());
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_MISUSE);
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
    }

    #[test]
    fn resolve_instance_name_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path()).unwrap();
        let result = resolve_instance_name(&engine, "nonexistent");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("no instance matching"));
    }
}
