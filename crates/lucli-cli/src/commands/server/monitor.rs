use crate::commands::{resolve_instance_name, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;
use lucli_schema::Manifest;

/// `server monitor` (spec §4.6): report the instance's JMX endpoint, read
/// back from the project manifest `Engine::start` persists to `lucee.json`.
pub fn run(engine: &Engine, name: &str) -> u8 {
    let resolved = match resolve_instance_name(engine, name) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let meta = match engine.metadata(&resolved) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let manifest_path = std::path::Path::new(&meta.project_dir).join("lucee.json");
    let manifest: Manifest = match std::fs::read_to_string(&manifest_path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: could not read manifest for '{resolved}': {e}");
            return EXIT_FAILURE;
        }
    };

    if !manifest.monitoring.enabled {
        println!("monitoring is disabled for '{resolved}'");
        return EXIT_SUCCESS;
    }

    match manifest.monitoring.jmx.port {
        Some(port) => println!("jmx endpoint: service:jmx:rmi:///jndi/rmi://{}:{port}/jmxrmi", manifest.host),
        None => println!("monitoring enabled for '{resolved}' but no JMX port is configured"),
    }
    EXIT_SUCCESS
}
