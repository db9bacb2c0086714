use crate::commands::{colorize_state, json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;

pub fn run(engine: &Engine, json: bool) -> u8 {
    match engine.list() {
        Ok(views) => {
            if json {
                let payload: Vec<_> = views
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "name": v.name,
                            "state": v.state.to_string(),
                            "envTag": v.env_tag,
                            "pid": v.pid,
                            "port": v.port,
                            "projectDir": v.project_dir,
                            "runtimeType": v.runtime_type,
                            "sandbox": v.sandbox,
                        })
                    })
                    .collect();
                match json_pretty(&payload) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else if views.is_empty() {
                println!("no instances");
            } else {
                println!("{:<24} {:<20} {:<8} {:<8} PROJECT", "NAME", "STATE", "PORT", "RUNTIME");
                for v in &views {
                    println!(
                        "{:<24} {:<20} {:<8} {:<8} {}",
                        v.name,
                        colorize_state(&v.state.to_string()),
                        v.port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_owned()),
                        v.runtime_type,
                        v.project_dir,
                    );
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
