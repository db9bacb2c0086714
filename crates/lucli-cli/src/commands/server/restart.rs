use crate::commands::{json_pretty, resolve_instance_name, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;

pub fn run(engine: &Engine, name: &str, json: bool) -> u8 {
    let resolved = match resolve_instance_name(engine, name) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let pb = (!json).then(|| spinner(&format!("restarting '{resolved}'...")));

    match engine.restart(&resolved) {
        Ok(outcome) => {
            if let Some(pb) = &pb {
                spin_ok(pb, &format!("'{}' is {}", outcome.name, outcome.state));
            }
            if json {
                let payload = serde_json::json!({
                    "name": outcome.name,
                    "state": outcome.state.to_string(),
                    "url": outcome.url,
                });
                match json_pretty(&payload) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else if pb.is_none() {
                println!("'{}' is {}", outcome.name, outcome.state);
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, &format!("restart failed: {e}"));
            } else {
                eprintln!("error: {e}");
            }
            EXIT_FAILURE
        }
    }
}
