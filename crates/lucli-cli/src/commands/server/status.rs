use crate::commands::{colorize_state, json_pretty, resolve_instance_name, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;

pub fn run(engine: &Engine, name: &str, json: bool) -> u8 {
    let resolved = match resolve_instance_name(engine, name) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    match engine.status(&resolved) {
        Ok(view) => {
            if json {
                let payload = serde_json::json!({
                    "name": view.name,
                    "state": view.state.to_string(),
                    "envTag": view.env_tag,
                    "pid": view.pid,
                    "port": view.port,
                    "projectDir": view.project_dir,
                    "runtimeType": view.runtime_type,
                    "sandbox": view.sandbox,
                });
                match json_pretty(&payload) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else {
                println!("name:       {}", view.name);
                println!("state:      {}", colorize_state(&view.state.to_string()));
                if let Some(env) = &view.env_tag {
                    println!("environment: {env}");
                }
                if let Some(pid) = view.pid {
                    println!("pid:        {pid}");
                }
                if let Some(port) = view.port {
                    println!("port:       {port}");
                }
                println!("project:    {}", view.project_dir);
                println!("runtime:    {}", view.runtime_type);
                if view.sandbox {
                    println!("sandbox:    yes");
                }
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}
