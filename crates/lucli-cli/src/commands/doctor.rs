//! `lucli doctor`: ambient health-check surface covering runtime prereqs,
//! store format version, object integrity, write-ahead log cleanliness,
//! instance counts, and available disk space.

use lucli_core::Engine;
use lucli_runtime::check_prereqs;
use lucli_store::{verify_store_integrity, WriteAheadLog};
use std::path::Path;

use crate::commands::{EXIT_FAILURE, EXIT_SUCCESS};

struct Check {
    label: String,
    ok: bool,
    detail: String,
}

pub fn run(home: &Path) -> u8 {
    let mut checks = Vec::new();

    let engine = match Engine::new(home) {
        Ok(e) => Some(e),
        Err(e) => {
            checks.push(Check {
                label: "store".to_owned(),
                ok: false,
                detail: format!("could not open store at {}: {e}", home.display()),
            });
            None
        }
    };

    if let Some(engine) = &engine {
        let layout = engine.layout();

        match layout.verify_version() {
            Ok(()) => checks.push(Check {
                label: "store version".to_owned(),
                ok: true,
                detail: "compatible".to_owned(),
            }),
            Err(e) => checks.push(Check {
                label: "store version".to_owned(),
                ok: false,
                detail: e.to_string(),
            }),
        }

        match verify_store_integrity(layout) {
            Ok(report) => checks.push(Check {
                label: "object integrity".to_owned(),
                ok: report.failed.is_empty(),
                detail: format!("{}/{} content-addressed objects verified", report.passed, report.checked),
            }),
            Err(e) => checks.push(Check {
                label: "object integrity".to_owned(),
                ok: false,
                detail: e.to_string(),
            }),
        }

        let wal = WriteAheadLog::new(layout);
        match wal.list_incomplete() {
            Ok(entries) if entries.is_empty() => checks.push(Check {
                label: "write-ahead log".to_owned(),
                ok: true,
                detail: "no incomplete operations".to_owned(),
            }),
            Ok(entries) => checks.push(Check {
                label: "write-ahead log".to_owned(),
                ok: false,
                detail: format!("{} incomplete operation(s); will roll back on next command", entries.len()),
            }),
            Err(e) => checks.push(Check {
                label: "write-ahead log".to_owned(),
                ok: false,
                detail: e.to_string(),
            }),
        }

        match engine.list() {
            Ok(views) => {
                let running = views.iter().filter(|v| v.state == lucli_store::InstanceState::Running).count();
                checks.push(Check {
                    label: "instances".to_owned(),
                    ok: true,
                    detail: format!("{} known, {running} running", views.len()),
                });
            }
            Err(e) => checks.push(Check {
                label: "instances".to_owned(),
                ok: false,
                detail: e.to_string(),
            }),
        }
    }

    for backend in ["embedded", "external-container", "container"] {
        let missing = check_prereqs(backend);
        checks.push(Check {
            label: format!("prereqs ({backend})"),
            ok: missing.is_empty(),
            detail: if missing.is_empty() {
                "all present".to_owned()
            } else {
                missing.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
            },
        });
    }

    checks.push(disk_space_check(home));

    let mut any_failed = false;
    for check in &checks {
        let marker = if check.ok { "✓" } else { "✗" };
        println!("{marker} {:<24} {}", check.label, check.detail);
        any_failed |= !check.ok;
    }

    if any_failed {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

#[cfg(unix)]
fn disk_space_check(home: &Path) -> Check {
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    let path = home.to_string_lossy();
    let Ok(cpath) = CString::new(path.as_bytes()) else {
        return Check {
            label: "disk space".to_owned(),
            ok: false,
            detail: "path contains a NUL byte".to_owned(),
        };
    };

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    #[allow(unsafe_code)]
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Check {
            label: "disk space".to_owned(),
            ok: false,
            detail: format!("statvfs failed for {}", home.display()),
        };
    }
    #[allow(unsafe_code)]
    let stat = unsafe { stat.assume_init() };
    let available_bytes = stat.f_bavail as u64 * stat.f_frsize as u64;
    let available_mb = available_bytes / (1024 * 1024);
    Check {
        label: "disk space".to_owned(),
        ok: available_mb > 256,
        detail: format!("{available_mb} MiB available under {}", home.display()),
    }
}

#[cfg(not(unix))]
fn disk_space_check(_home: &Path) -> Check {
    Check {
        label: "disk space".to_owned(),
        ok: true,
        detail: "not checked on this platform".to_owned(),
    }
}
