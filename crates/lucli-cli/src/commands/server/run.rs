use crate::commands::{parse_overrides, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::{shutdown_requested, Engine, StartOptions};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// `server run` (spec §6): start in the foreground, stream logs, and stop
/// the instance when interrupted — the one-shot analogue of `start` + `log
/// -f` + `stop` for local development.
pub fn run(
    engine: &Engine,
    project_dir: &Path,
    name: Option<String>,
    environment: Option<String>,
    overrides: &[String],
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
        ..Default::default()
    };

    let outcome = match engine.start(project_dir, &opts) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    if let Some(url) = &outcome.url {
        println!("'{}' is {} at {url} (ctrl-c to stop)", outcome.name, outcome.state);
    } else {
        println!("'{}' is {} (ctrl-c to stop)", outcome.name, outcome.state);
    }

    let mut previous: Vec<String> = Vec::new();
    while !shutdown_requested() {
        if let Ok(mut entries) = engine.logs(&outcome.name, 200) {
            entries.reverse();
            let fresh = if previous.is_empty() {
                &entries[..]
            } else if let Some(pos) = entries.iter().position(|l| Some(l) == previous.last()) {
                &entries[pos + 1..]
            } else {
                &entries[..]
            };
            for line in fresh {
                println!("{line}");
            }
            previous = entries;
        }
        sleep(Duration::from_millis(500));
    }

    println!("stopping '{}'...", outcome.name);
    match engine.stop(&outcome.name) {
        Ok(()) => {
            println!("'{}' stopped", outcome.name);
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}
