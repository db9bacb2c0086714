//! Prerequisite checks for external tools a `RuntimeBackend` shells out to.
//!
//! A `command_exists`/`MissingPrereq` pattern aimed at the binaries LuCLI's
//! backends actually invoke: `docker` for the container runtime, `git` for
//! git-sourced dependencies, `openssl` for PKCS12 keystore packaging.

use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

pub fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check prerequisites for the given runtime backend name
/// (`"embedded"`, `"external-container"`, or `"container"`).
pub fn check_prereqs(backend_name: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists("openssl") {
        missing.push(MissingPrereq {
            name: "openssl",
            purpose: "packaging the generated HTTPS keystore as PKCS12",
            install_hint:
                "apt install openssl | dnf install openssl | pacman -S openssl | brew install openssl",
        });
    }

    match backend_name {
        "container" => {
            if !command_exists("docker") {
                missing.push(MissingPrereq {
                    name: "docker",
                    purpose: "running the server as an OCI container",
                    install_hint: "see https://docs.docker.com/engine/install/",
                });
            }
        }
        "external-container" => {
            if std::env::var_os("CATALINA_HOME").is_none() {
                missing.push(MissingPrereq {
                    name: "CATALINA_HOME",
                    purpose: "locating the user-supplied container installation",
                    install_hint: "set the CATALINA_HOME environment variable",
                });
            }
        }
        _ => {}
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nLuCLI requires these tools for the selected runtime backend.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "docker",
            purpose: "running containers",
            install_hint: "apt install docker.io",
        };
        let s = format!("{m}");
        assert!(s.contains("docker"));
        assert!(s.contains("running containers"));
        assert!(s.contains("apt install docker.io"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![MissingPrereq {
            name: "docker",
            purpose: "containers",
            install_hint: "apt install docker.io",
        }];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("docker"));
    }

    #[test]
    fn external_container_without_catalina_home_is_missing() {
        std::env::remove_var("CATALINA_HOME");
        let missing = check_prereqs("external-container");
        assert!(missing.iter().any(|m| m.name == "CATALINA_HOME"));
    }

    #[test]
    fn embedded_backend_has_no_backend_specific_requirement() {
        let missing = check_prereqs("embedded");
        assert!(!missing.iter().any(|m| m.name == "docker"));
        assert!(!missing.iter().any(|m| m.name == "CATALINA_HOME"));
    }
}
