//! The `container` backend: runs the server as a plain OCI container via the
//! system `docker` binary.
//!
//! The overall shape is "pull an image, run it, map a port, mount a
//! directory" (spec §4.5: "Maps the primary HTTP port to the container's
//! fixed internal port; mounts the project directory as the webroot;
//! passes engine-admin password and agent configuration as environment
//! variables"). This shells out to `docker run`/`docker stop`/`docker logs`
//! directly rather than constructing an OCI bundle by hand, since the
//! target is an already-installed `docker` daemon.

use crate::backend::{BackendHandle, InstanceContext, RuntimeBackend};
use crate::RuntimeError;
use std::process::Command;

/// Fixed internal port the CFML engine container images listen on.
const CONTAINER_INTERNAL_PORT: u16 = 8888;

pub struct ContainerBackend;

impl Default for ContainerBackend {
    fn default() -> Self {
        Self
    }
}

impl ContainerBackend {
    pub fn new() -> Self {
        Self
    }

    fn docker(args: &[&str]) -> Result<std::process::Output, RuntimeError> {
        Command::new("docker")
            .args(args)
            .output()
            .map_err(|e| RuntimeError::ExecFailed(format!("failed to invoke docker: {e}")))
    }

    fn container_name(ctx: &InstanceContext) -> String {
        format!("lucli-{}", ctx.name)
    }

    fn image_ref(ctx: &InstanceContext) -> Result<String, RuntimeError> {
        match &ctx.runtime {
            lucli_schema::RuntimeConfig::Container { image, tag, .. } => {
                Ok(format!("{image}:{tag}"))
            }
            other => Err(RuntimeError::ExecFailed(format!(
                "container backend invoked with non-container runtime config: {other:?}"
            ))),
        }
    }
}

impl RuntimeBackend for ContainerBackend {
    fn name(&self) -> &'static str {
        "container"
    }

    fn available(&self) -> bool {
        crate::prereq::command_exists("docker")
    }

    fn prepare(&self, ctx: &InstanceContext) -> Result<(), RuntimeError> {
        let image = Self::image_ref(ctx)?;
        std::fs::create_dir_all(ctx.logs_dir())?;
        let output = Self::docker(&["pull", &image])?;
        if !output.status.success() {
            return Err(RuntimeError::EngineDownloadFailed(format!(
                "docker pull {image} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    fn start(&self, ctx: &InstanceContext) -> Result<BackendHandle, RuntimeError> {
        let image = Self::image_ref(ctx)?;
        let name = match &ctx.runtime {
            lucli_schema::RuntimeConfig::Container {
                container_name: Some(explicit),
                ..
            } => explicit.clone(),
            _ => Self::container_name(ctx),
        };

        let port_mapping = format!("{}:{}", ctx.port, CONTAINER_INTERNAL_PORT);
        let mount = format!("{}:/app:rw", ctx.webroot.display());

        let mut args: Vec<String> = vec![
            "run".to_owned(),
            "-d".to_owned(),
            "--name".to_owned(),
            name.clone(),
            "-p".to_owned(),
            port_mapping,
            "-v".to_owned(),
            mount,
        ];

        if let Some(password) = &ctx.admin_password {
            args.push("-e".to_owned());
            args.push(format!("LUCLI_ADMIN_PASSWORD={password}"));
        }
        for (key, value) in &ctx.agent_env {
            args.push("-e".to_owned());
            args.push(format!("{key}={value}"));
        }
        args.push(image.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = Self::docker(&arg_refs)?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "docker run failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        std::fs::write(ctx.container_file(), format!("{name}\n{image}\n"))?;

        Ok(BackendHandle::Container { name, image })
    }

    fn stop(&self, ctx: &InstanceContext, handle: &BackendHandle) -> Result<(), RuntimeError> {
        let name = match handle {
            BackendHandle::Container { name, .. } => name.clone(),
            BackendHandle::Process { .. } => {
                return Err(RuntimeError::ExecFailed(
                    "container backend received a process handle".to_owned(),
                ))
            }
        };

        let output = Self::docker(&["stop", &name])?;
        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "docker stop failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let _ = Self::docker(&["rm", &name]);
        let _ = std::fs::remove_file(ctx.container_file());
        Ok(())
    }

    fn probe(&self, _ctx: &InstanceContext, handle: &BackendHandle) -> Result<bool, RuntimeError> {
        let name = match handle {
            BackendHandle::Container { name, .. } => name,
            BackendHandle::Process { .. } => {
                return Err(RuntimeError::ExecFailed(
                    "container backend received a process handle".to_owned(),
                ))
            }
        };
        let output = Self::docker(&[
            "inspect",
            "-f",
            "{{.State.Running}}",
            name,
        ])?;
        Ok(output.status.success()
            && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    fn logs(&self, ctx: &InstanceContext, lines: usize) -> Result<Vec<String>, RuntimeError> {
        let name = if ctx.container_file().exists() {
            std::fs::read_to_string(ctx.container_file())?
                .lines()
                .next()
                .map(str::to_owned)
                .unwrap_or_else(|| Self::container_name(ctx))
        } else {
            Self::container_name(ctx)
        };
        let tail = lines.to_string();
        let output = Self::docker(&["logs", "--tail", &tail, &name])?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(dir: &std::path::Path) -> InstanceContext {
        InstanceContext {
            name: "container-test".to_owned(),
            instance_dir: dir.join("instance"),
            project_dir: dir.join("project"),
            webroot: dir.join("project"),
            host: "localhost".to_owned(),
            port: 8080,
            shutdown_port: 8081,
            https_port: None,
            engine_version: "6".to_owned(),
            runtime: lucli_schema::RuntimeConfig::Container {
                image: "lucee/lucee".to_owned(),
                tag: "6".to_owned(),
                container_name: None,
            },
            express_cache_dir: dir.join("express"),
            admin_password: None,
            agent_env: Default::default(),
        }
    }

    #[test]
    fn image_ref_formats_image_and_tag() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        assert_eq!(ContainerBackend::image_ref(&ctx).unwrap(), "lucee/lucee:6");
    }

    #[test]
    fn default_container_name_is_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        assert_eq!(ContainerBackend::container_name(&ctx), "lucli-container-test");
    }

    #[test]
    fn image_ref_rejects_non_container_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        ctx.runtime = lucli_schema::RuntimeConfig::Embedded { variant: None };
        assert!(ContainerBackend::image_ref(&ctx).is_err());
    }
}
