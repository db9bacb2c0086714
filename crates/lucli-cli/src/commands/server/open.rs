use crate::commands::{resolve_instance_name, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;

/// Print the running instance's URL, opening it in the default browser when
/// a display is available (spec §4.2's `openBrowser`/`openBrowserUrl`
/// behavior extended to an explicit `server open` invocation).
pub fn run(engine: &Engine, name: &str) -> u8 {
    let resolved = match resolve_instance_name(engine, name) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let view = match engine.status(&resolved) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    if view.state != lucli_store::InstanceState::Running {
        eprintln!("error: '{resolved}' is not running");
        return EXIT_FAILURE;
    }

    let Some(port) = view.port else {
        eprintln!("error: '{resolved}' has no known port");
        return EXIT_FAILURE;
    };
    let url = format!("http://localhost:{port}/");

    println!("{url}");
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    let _ = std::process::Command::new(opener).arg(&url).status();
    EXIT_SUCCESS
}
