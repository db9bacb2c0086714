//! End-to-end coverage of the instance lifecycle through `Engine`, without
//! a real engine distribution: `start` with `dry_run: true` never touches
//! the runtime backend, and the running-instance tests below seed a
//! real (but trivial) child process directly so `stop`/`status` exercise
//! the embedded backend's actual `kill(2)`-based stop/probe.

use lucli_core::engine::{Engine, StartOptions};
use lucli_core::registry::InstanceRegistry;
use lucli_store::InstanceState;
use std::fs;
use std::path::Path;

fn home() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

fn project(manifest_json: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lucee.json"), manifest_json).unwrap();
    dir
}

/// Reserve an instance and make it look `RUNNING` under a real child
/// process, bypassing `Engine::start`'s materialization so the test stays
/// offline.
fn seed_running_instance(engine: &Engine, name: &str, project_dir: &Path) -> u32 {
    let registry = InstanceRegistry::new(engine.layout().clone());
    let reserved = registry
        .reserve(name, project_dir, "testhash", "embedded", false, None)
        .unwrap();
    registry.transition(name, InstanceState::ProvisionedStopped).unwrap();
    registry.transition(name, InstanceState::Starting).unwrap();

    let child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .expect("spawn a throwaway sleep process");
    let pid = child.id();
    fs::write(reserved.instance_dir.join(".pid"), pid.to_string()).unwrap();

    let manifest: lucli_schema::Manifest = serde_json::from_str("{}").unwrap();
    fs::write(
        reserved.instance_dir.join(".manifest.json"),
        serde_json::to_string(&manifest).unwrap(),
    )
    .unwrap();

    let mut meta = registry.metadata(name).unwrap();
    meta.pid = Some(pid);
    meta.port = Some(8080);
    registry.put_metadata(&meta).unwrap();
    registry.transition(name, InstanceState::Running).unwrap();

    pid
}

fn pid_alive(pid: u32) -> bool {
    #[allow(unsafe_code)]
    unsafe {
        libc::kill(pid as libc::pid_t, 0) == 0
    }
}

#[test]
fn dry_run_resolves_the_manifest_without_reserving_anything() {
    let home = home();
    let project = project(r#"{"name":"demo","port":9090}"#);
    let engine = Engine::new(home.path()).unwrap();

    let outcome = engine
        .start(project.path(), &StartOptions { dry_run: true, ..Default::default() })
        .unwrap();

    assert_eq!(outcome.name, "demo");
    assert_eq!(outcome.manifest.port, Some(9090));
    assert_eq!(outcome.state, InstanceState::Absent);
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn running_instance_reports_status_then_stops_cleanly() {
    let home = home();
    let project = tempfile::tempdir().unwrap();
    let engine = Engine::new(home.path()).unwrap();

    let pid = seed_running_instance(&engine, "demo", project.path());
    assert!(pid_alive(pid));

    let view = engine.status("demo").unwrap();
    assert_eq!(view.state, InstanceState::Running);
    assert_eq!(view.pid, Some(pid));

    engine.stop("demo").unwrap();

    let view = engine.status("demo").unwrap();
    assert_eq!(view.state, InstanceState::ProvisionedStopped);
    assert!(view.pid.is_none());

    std::thread::sleep(std::time::Duration::from_millis(300));
    assert!(!pid_alive(pid), "stop must terminate the underlying process");
}

#[test]
fn list_reconciles_a_dead_process_to_orphaned() {
    let home = home();
    let project = tempfile::tempdir().unwrap();
    let engine = Engine::new(home.path()).unwrap();

    let pid = seed_running_instance(&engine, "demo", project.path());
    // Kill the process out from under the registry, simulating a crash the
    // registry never heard about.
    #[allow(unsafe_code)]
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
    std::thread::sleep(std::time::Duration::from_millis(300));

    let views = engine.list().unwrap();
    let demo = views.iter().find(|v| v.name == "demo").unwrap();
    assert_eq!(demo.state, InstanceState::Orphaned);
}

#[test]
fn prune_removes_only_provisioned_stopped_instances() {
    let home = home();
    let engine = Engine::new(home.path()).unwrap();
    let registry = InstanceRegistry::new(engine.layout().clone());
    let project_a = tempfile::tempdir().unwrap();
    let project_b = tempfile::tempdir().unwrap();

    registry
        .reserve("stale", project_a.path(), "h1", "embedded", false, None)
        .unwrap();
    registry.transition("stale", InstanceState::ProvisionedStopped).unwrap();

    seed_running_instance(&engine, "active", project_b.path());

    let report = engine.prune(None, false).unwrap();
    assert_eq!(report.removed_instances, 1);
    assert!(!registry.exists("stale"));
    assert!(registry.exists("active"));

    engine.stop("active").unwrap();
}
