//! Ordered JVM argument list rendered into the runtime's environment script
//! (spec §4.6 output 6): memory flags, JMX properties, per-agent arguments,
//! then `jvm.additionalArgs` (a protected zone — passed through verbatim,
//! never placeholder-substituted).

use crate::{atomic_write, MaterializeError};
use std::path::Path;

pub struct JvmOptionsInput<'a> {
    pub min_memory: &'a str,
    pub max_memory: &'a str,
    pub monitoring_enabled: bool,
    pub jmx_port: Option<u16>,
    /// Active agents' JVM argument bundles, in manifest-declared order.
    pub active_agent_args: Vec<Vec<String>>,
    pub additional_args: &'a [String],
}

/// Build the ordered argument list: memory flags, then JMX system
/// properties when monitoring is enabled, then each active agent's
/// arguments in order, then `jvm.additionalArgs` last.
pub fn build_args(input: &JvmOptionsInput<'_>) -> Vec<String> {
    let mut args = vec![
        format!("-Xms{}", input.min_memory),
        format!("-Xmx{}", input.max_memory),
    ];

    if input.monitoring_enabled {
        args.push("-Dcom.sun.management.jmxremote".to_owned());
        args.push("-Dcom.sun.management.jmxremote.authenticate=false".to_owned());
        args.push("-Dcom.sun.management.jmxremote.ssl=false".to_owned());
        if let Some(port) = input.jmx_port {
            args.push(format!("-Dcom.sun.management.jmxremote.port={port}"));
        }
    }

    for agent_args in &input.active_agent_args {
        args.extend(agent_args.iter().cloned());
    }

    args.extend(input.additional_args.iter().cloned());
    args
}

/// Render the argument list into a POSIX-shell `setenv` script exporting
/// `JAVA_OPTS`.
pub fn render_script(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| shell_quote(a)).collect();
    format!(
        "#!/bin/sh\n# generated JVM options script\nJAVA_OPTS=\"{}\"\nexport JAVA_OPTS\n",
        quoted.join(" ")
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub fn materialize(dest: &Path, input: &JvmOptionsInput<'_>) -> Result<(), MaterializeError> {
    let args = build_args(input);
    let script = render_script(&args);
    atomic_write(dest, script.as_bytes())
}
