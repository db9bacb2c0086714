use crate::commands::{resolve_instance_name, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;

pub fn run(engine: &Engine, name: &str, json: bool) -> u8 {
    let resolved = match resolve_instance_name(engine, name) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let pb = (!json).then(|| spinner(&format!("stopping '{resolved}'...")));

    match engine.stop(&resolved) {
        Ok(()) => {
            if let Some(pb) = &pb {
                spin_ok(pb, &format!("'{resolved}' stopped"));
            } else {
                println!("'{resolved}' stopped");
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, &format!("stop failed: {e}"));
            } else {
                eprintln!("error: {e}");
            }
            EXIT_FAILURE
        }
    }
}
