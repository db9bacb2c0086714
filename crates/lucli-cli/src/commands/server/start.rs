use crate::commands::{json_pretty, parse_overrides, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::{Engine, StartOptions};
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub fn run(
    engine: &Engine,
    project_dir: &Path,
    name: Option<String>,
    environment: Option<String>,
    base_config_file: Option<std::path::PathBuf>,
    overrides: &[String],
    force: bool,
    dry_run: bool,
    sandbox: bool,
    regenerate_keystore: bool,
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
        base_config_file,
        overrides,
        force,
        dry_run,
        sandbox,
        regenerate_keystore,
        secrets_passphrase: None,
        express_base_url: None,
    };

    let pb = (!json && !dry_run).then(|| spinner("provisioning and starting server..."));

    match engine.start(project_dir, &opts) {
        Ok(outcome) => {
            if let Some(pb) = &pb {
                spin_ok(pb, &format!("instance '{}' is {}", outcome.name, outcome.state));
            }
            for warning in &outcome.warnings {
                eprintln!("warning: {warning}");
            }
            if json {
                let payload = serde_json::json!({
                    "name": outcome.name,
                    "state": outcome.state.to_string(),
                    "instanceDir": outcome.instance_dir,
                    "url": outcome.url,
                    "warnings": outcome.warnings,
                });
                match json_pretty(&payload) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else if let Some(url) = &outcome.url {
                println!("'{}' is {} at {url}", outcome.name, outcome.state);
            } else {
                println!("'{}' is {}", outcome.name, outcome.state);
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, &format!("start failed: {e}"));
            } else {
                eprintln!("error: {e}");
            }
            EXIT_FAILURE
        }
    }
}
