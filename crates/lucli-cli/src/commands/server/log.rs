use crate::commands::{resolve_instance_name, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;
use std::thread::sleep;
use std::time::Duration;

/// `server log` (spec §6). `lines` is the tail window; `follow` re-polls
/// every 500ms and prints only entries not already shown, the way `tail -f`
/// reconciles a rotating window rather than a byte offset.
pub fn run(engine: &Engine, name: &str, lines: usize, follow: bool) -> u8 {
    let resolved = match resolve_instance_name(engine, name) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let mut previous: Vec<String> = Vec::new();
    loop {
        match engine.logs(&resolved, lines) {
            Ok(mut entries) => {
                entries.reverse(); // oldest-first for display
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
            Err(e) => {
                eprintln!("error: {e}");
                return EXIT_FAILURE;
            }
        }
        if !follow || lucli_core::shutdown_requested() {
            break;
        }
        sleep(Duration::from_millis(500));
    }
    EXIT_SUCCESS
}
