use crate::commands::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use lucli_core::Engine;

pub fn run(engine: &Engine, name: Option<String>, dry_run: bool, json: bool) -> u8 {
    match engine.prune(name.as_deref(), dry_run) {
        Ok(report) => {
            if json {
                let payload = serde_json::json!({
                    "prunableInstances": report.prunable_instances,
                    "removedInstances": report.removed_instances,
                    "orphanedCacheEntries": report.orphaned_cache_entries,
                    "removedCacheEntries": report.removed_cache_entries,
                });
                match json_pretty(&payload) {
                    Ok(s) => println!("{s}"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else if dry_run {
                println!("would remove {} instance(s):", report.prunable_instances.len());
                for n in &report.prunable_instances {
                    println!("  {n}");
                }
                println!(
                    "would remove {} orphaned cache entries",
                    report.orphaned_cache_entries.len()
                );
            } else {
                println!("removed {} instance(s)", report.removed_instances);
                println!("removed {} cache entries", report.removed_cache_entries);
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}
