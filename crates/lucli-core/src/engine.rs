//! `Engine`: wires the nine spec components into `start`/`stop`/`restart`/
//! `status`/`list`/`prune`/`logs` (spec §2 control flow, §4.9 concurrency,
//! §7 error handling).
//!
//! `start` is the long path: resolve the manifest (C1+C2), reserve an
//! instance name under the registry lock (C4), materialize dependencies
//! (C7), prepare the runtime backend (C5), materialize the seven
//! configuration outputs (C6), then spawn and wait for readiness (C8) —
//! all under one instance lock (C9) and logged to the write-ahead log so a
//! crash mid-`start` rolls back cleanly on the next `Engine::new`.

use crate::concurrency::InstanceLock;
use crate::environment::EnvironmentResolver;
use crate::process::{ProcessController, ReadinessOptions};
use crate::registry::{InstanceRegistry, InstanceView};
use crate::CoreError;
use lucli_deps::{DependencyResolver, ResolvedMapping};
use lucli_materialize::{
    atomic_write, engine_config, jar_placement, jvm_options, keystore, rewrite, server_descriptor,
    web_descriptor,
};
use lucli_runtime::{select_backend, BackendHandle, InstanceContext};
use lucli_schema::lock::DependencyLock;
use lucli_schema::manifest::DependencyEntry;
use lucli_schema::merge::{apply_environment, apply_overrides, deep_merge};
use lucli_schema::{Manifest, ManifestError, RuntimeConfig};
use lucli_secrets::SecretStore;
use lucli_store::{InstanceMetadata, InstanceState, PruneReport, Pruner, StoreLayout};
use lucli_store::{RollbackStep, WalOpKind, WriteAheadLog};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 8080;
const MANIFEST_FILE: &str = "lucee.json";
const LOCK_FILE: &str = "lucee-lock.json";
const SNAPSHOT_FILE: &str = ".manifest.json";

/// Inputs to [`Engine::start`] beyond the project directory (spec §4.1's
/// five merge-layer steps, plus the process-level flags `server start`
/// accepts).
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub name: Option<String>,
    pub environment: Option<String>,
    pub base_config_file: Option<PathBuf>,
    /// Ordered `key=value` CLI overrides (spec §4.1 step 5).
    pub overrides: Vec<(String, String)>,
    pub force: bool,
    pub dry_run: bool,
    pub sandbox: bool,
    pub regenerate_keystore: bool,
    pub secrets_passphrase: Option<Vec<u8>>,
    pub express_base_url: Option<String>,
}

/// What a successful (or dry-run) `start` produced.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub name: String,
    pub instance_dir: PathBuf,
    pub manifest: Manifest,
    pub state: InstanceState,
    pub url: Option<String>,
    pub warnings: Vec<String>,
    pub dependency_mappings: Vec<ResolvedMapping>,
}

struct ResolvedManifest {
    manifest: Manifest,
    /// The project-manifest layer before the environment overlay and CLI
    /// overrides — written back to `lucee.json` on a successful start.
    persist_root: Value,
    manifest_hash: String,
}

pub struct Engine {
    home: PathBuf,
    layout: StoreLayout,
}

impl Engine {
    /// Open (and initialize, if new) the store rooted at `home`, rolling
    /// back any write-ahead log entries left by a prior crash.
    pub fn new(home: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let home = home.into();
        let layout = StoreLayout::new(&home);
        layout.initialize()?;

        let wal = WriteAheadLog::new(&layout);
        wal.initialize()?;
        let recovered = wal.recover()?;
        if recovered > 0 {
            tracing::info!("recovered {recovered} incomplete operation(s) from a prior crash");
        }

        Ok(Self { home, layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn secrets_path(&self) -> PathBuf {
        self.home.join("secrets").join("local.json")
    }

    /// Open the secret store for reading, returning `None` when no store
    /// has been created yet (no `secrets put` has ever run).
    fn open_secret_store(&self, opts: &StartOptions) -> Result<Option<SecretStore>, CoreError> {
        let path = self.secrets_path();
        if !path.exists() {
            return Ok(None);
        }
        let passphrase = opts
            .secrets_passphrase
            .clone()
            .or_else(|| std::env::var("LUCLI_SECRETS_PASSPHRASE").ok().map(String::into_bytes))
            .ok_or_else(|| CoreError::MissingSecret("LUCLI_SECRETS_PASSPHRASE".to_owned()))?;
        Ok(Some(SecretStore::open(path, &passphrase)?))
    }

    /// Open the secret store for writing (`secrets put/delete`), creating
    /// it on first use.
    pub fn secrets_store(&self, passphrase: &[u8]) -> Result<SecretStore, CoreError> {
        Ok(SecretStore::open(self.secrets_path(), passphrase)?)
    }

    /// Manifest resolution (C1+C2): defaults -> `base_config_file` ->
    /// project manifest -> selected environment -> CLI overrides, then
    /// placeholder substitution and validation (spec §4.1).
    fn resolve_manifest(
        &self,
        project_dir: &Path,
        opts: &StartOptions,
        secrets: Option<&SecretStore>,
    ) -> Result<ResolvedManifest, CoreError> {
        let mut root = json!({});

        if let Some(path) = &opts.base_config_file {
            let content = std::fs::read_to_string(path)?;
            let overlay: Value = serde_json::from_str(&content)?;
            deep_merge(&mut root, &overlay);
        }

        let manifest_path = project_dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            let overlay: Value = serde_json::from_str(&content)?;
            deep_merge(&mut root, &overlay);
        }

        let mut persist_root = root.clone();

        if let Some(env_name) = &opts.environment {
            let environments = root
                .get("environments")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if !apply_environment(&mut root, &environments, env_name) {
                let available = environments.keys().cloned().collect();
                return Err(CoreError::Manifest(ManifestError::UnknownEnvironment {
                    name: env_name.clone(),
                    available,
                }));
            }
        }

        if !opts.overrides.is_empty() {
            let refs: Vec<(&str, &str)> = opts
                .overrides
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            apply_overrides(&mut root, refs);
        }

        let resolver = EnvironmentResolver::load(project_dir)?;
        resolver.substitute(&mut root, secrets)?;

        let mut manifest: Manifest = serde_json::from_value(root.clone())?;
        manifest.validate(DEFAULT_PORT)?;

        if manifest.open_browser_url.as_deref() == Some("") {
            manifest.open_browser_url = None;
        }

        if persist_root.get("name").is_none() {
            let name = manifest.resolve_name(project_dir)?;
            persist_root["name"] = Value::String(name);
        }

        let manifest_hash = blake3::hash(serde_json::to_string(&root)?.as_bytes())
            .to_hex()
            .to_string();

        Ok(ResolvedManifest {
            manifest,
            persist_root,
            manifest_hash,
        })
    }

    fn write_manifest_back(&self, project_dir: &Path, persist_root: &Value) -> Result<(), CoreError> {
        let path = project_dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(persist_root)?;
        atomic_write(&path, content.as_bytes())?;
        Ok(())
    }

    /// Start the server described by `project_dir`'s manifest (spec §2's
    /// full control flow). Holds the instance lock for the duration of the
    /// call; a concurrent `start` on the same instance fails fast with
    /// `InstanceBusy` rather than queuing.
    pub fn start(&self, project_dir: &Path, opts: &StartOptions) -> Result<StartOutcome, CoreError> {
        let project_dir = std::fs::canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
        let secrets = self.open_secret_store(opts)?;
        let resolved = self.resolve_manifest(&project_dir, opts, secrets.as_ref())?;
        let manifest = resolved.manifest.clone();

        let registry = InstanceRegistry::new(self.layout.clone());
        let name = registry.resolve_name(
            &project_dir,
            manifest.name.as_deref(),
            opts.name.as_deref(),
            opts.force,
        )?;

        if opts.dry_run {
            return Ok(StartOutcome {
                instance_dir: registry.instance_dir(&name),
                name,
                manifest,
                state: InstanceState::Absent,
                url: None,
                warnings: Vec::new(),
                dependency_mappings: Vec::new(),
            });
        }

        let lock_path = self.layout.instance_dir(&name).join(".lock");
        let _instance_lock = InstanceLock::try_acquire(&lock_path)?
            .ok_or_else(|| CoreError::InstanceBusy(name.clone()))?;

        let reserved = registry.reserve(
            &name,
            &project_dir,
            &resolved.manifest_hash,
            manifest.runtime.type_name(),
            opts.sandbox,
            opts.environment.as_deref(),
        )?;

        if matches!(
            reserved.metadata.state,
            InstanceState::Running | InstanceState::Starting | InstanceState::Stopping
        ) {
            return Err(CoreError::InstanceBusy(name));
        }

        let instance_dir = reserved.instance_dir.clone();

        let wal = WriteAheadLog::new(&self.layout);
        wal.initialize()?;
        let op_id = wal.begin(WalOpKind::Start, &name)?;
        if reserved.freshly_created {
            wal.add_rollback_step(&op_id, RollbackStep::RemoveDir(instance_dir.clone()))?;
        }
        wal.add_rollback_step(
            &op_id,
            RollbackStep::ResetState {
                name: name.clone(),
                target_state: "Failed".to_owned(),
            },
        )?;

        let outcome = self.start_inner(
            &name,
            &project_dir,
            &instance_dir,
            manifest,
            opts,
            secrets.as_ref(),
            &registry,
            reserved.metadata.state,
        );

        match &outcome {
            Ok(_) => wal.commit(&op_id)?,
            Err(_) => {
                let _ = registry.transition(&name, InstanceState::Failed);
            }
        }

        let outcome = outcome?;
        self.write_manifest_back(&project_dir, &resolved.persist_root)?;
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn start_inner(
        &self,
        name: &str,
        project_dir: &Path,
        instance_dir: &Path,
        manifest: Manifest,
        opts: &StartOptions,
        secrets: Option<&SecretStore>,
        registry: &InstanceRegistry,
        current_state: InstanceState,
    ) -> Result<StartOutcome, CoreError> {
        use InstanceState::*;

        match current_state {
            Absent | Orphaned => registry.transition(name, ProvisionedStopped)?,
            ProvisionedStopped | Failed => {}
            Running | Starting | Stopping => return Err(CoreError::InstanceBusy(name.to_owned())),
        }
        registry.transition(name, Starting)?;

        let mut warnings = Vec::new();

        // C7: dependency resolution.
        let mut entries: BTreeMap<String, DependencyEntry> = manifest.dependencies.clone();
        if manifest.dependency_settings.install_dev_dependencies {
            entries.extend(manifest.dev_dependencies.clone());
        }
        let lock_path = project_dir.join(LOCK_FILE);
        let previous_lock = if lock_path.exists() {
            DependencyLock::read_from_file(&lock_path).ok()
        } else {
            None
        };

        let mappings: Vec<ResolvedMapping> = if manifest.dependency_settings.auto_install_on_server_start
            && !entries.is_empty()
        {
            let resolver = DependencyResolver::new(instance_dir.to_path_buf(), project_dir.to_path_buf());
            let (new_lock, mappings) =
                resolver.ensure(&entries, &manifest.dependency_settings, previous_lock.as_ref())?;
            new_lock.write_to_file(&lock_path)?;
            mappings
        } else if let Some(lock) = &previous_lock {
            mappings_from_lock(lock)
        } else {
            Vec::new()
        };

        // C5: runtime backend selection and prerequisite check.
        let backend = select_backend(&manifest.runtime)?;
        if !backend.available() {
            let missing = lucli_runtime::check_prereqs(backend.name());
            if !missing.is_empty() {
                return Err(CoreError::Runtime(lucli_runtime::RuntimeError::BackendUnavailable(
                    lucli_runtime::format_missing(&missing),
                )));
            }
        }

        let port = manifest.port.unwrap_or(DEFAULT_PORT);
        let shutdown_port = manifest.shutdown_port.unwrap_or(port + 1);
        let https_port = if manifest.https.enabled {
            manifest.https_port
        } else {
            None
        };
        let webroot = manifest
            .webroot
            .as_ref()
            .map(|w| project_dir.join(w))
            .unwrap_or_else(|| project_dir.to_path_buf());
        let express_cache_dir = self.home.join("express");

        if matches!(manifest.runtime, RuntimeConfig::Embedded { .. }) {
            crate::express::ensure_cached(
                &express_cache_dir,
                &manifest.version,
                opts.express_base_url.as_deref(),
            )?;
        }

        let admin_password = match &manifest.admin.password {
            Some(password) => Some(password.clone()),
            None if manifest.admin.enabled => secrets
                .and_then(|s| s.require_utf8(&format!("{name}.admin_password")).ok()),
            None => None,
        };

        let mut agent_env: BTreeMap<String, String> = BTreeMap::new();
        if manifest.agents.values().any(|a| a.enabled) {
            agent_env.insert("LUCLI_AGENTS".to_owned(), serde_json::to_string(&manifest.agents)?);
        }
        if let Some(password) = &admin_password {
            agent_env.insert("LUCLI_ADMIN_PASSWORD".to_owned(), password.clone());
        }

        let ctx = InstanceContext {
            name: name.to_owned(),
            instance_dir: instance_dir.to_path_buf(),
            project_dir: project_dir.to_path_buf(),
            webroot,
            host: manifest.host.clone(),
            port,
            shutdown_port,
            https_port,
            engine_version: manifest.version.clone(),
            runtime: manifest.runtime.clone(),
            express_cache_dir,
            admin_password,
            agent_env,
        };

        atomic_write(
            &instance_dir.join(SNAPSHOT_FILE),
            serde_json::to_string_pretty(&manifest)?.as_bytes(),
        )?;

        backend.prepare(&ctx)?;

        // C6: the seven configuration outputs.
        let config_dir = self.layout.instance_config_dir(name);
        let configuration_file_content = match &manifest.configuration_file {
            Some(path) => Some(std::fs::read_to_string(project_dir.join(path))?),
            None => None,
        };
        let modules_root = self.home.join("modules");
        let builtin_root = self.home.join("builtin");
        std::fs::create_dir_all(&modules_root)?;
        std::fs::create_dir_all(&builtin_root)?;

        let config_mappings: Vec<engine_config::Mapping> = mappings
            .iter()
            .map(|m| engine_config::Mapping {
                virtual_path: m.virtual_path.clone(),
                physical_path: m.physical_path.to_string_lossy().into_owned(),
            })
            .collect();

        engine_config::materialize(
            &config_dir.join("lucee-server.json"),
            configuration_file_content.as_deref(),
            &manifest.configuration,
            &config_mappings,
            &modules_root.to_string_lossy(),
            &builtin_root.to_string_lossy(),
        )?;

        let (keystore_path, keystore_password) = if manifest.https.enabled {
            let path = config_dir.join("keystore.p12");
            let password = manifest
                .https
                .keystore
                .as_ref()
                .map(|k| k.password.clone())
                .or_else(|| secrets.and_then(|s| s.require_utf8(&format!("{name}.keystore_password")).ok()))
                .unwrap_or_else(|| "changeit".to_owned());
            if keystore::should_regenerate(&path, opts.regenerate_keystore) {
                keystore::generate(&manifest.host, &path, &password)?;
            }
            (Some(path.to_string_lossy().into_owned()), Some(password))
        } else {
            (None, None)
        };

        server_descriptor::materialize(
            &config_dir.join("server.xml"),
            None,
            &server_descriptor::ServerDescriptorOptions {
                port,
                shutdown_port,
                https_port,
                https_redirect: manifest.https.redirect,
                keystore_path,
                keystore_password,
            },
        )?;

        let web_result = web_descriptor::materialize(
            &config_dir.join("web.xml"),
            &web_descriptor::WebDescriptorOptions {
                enable_lucee: manifest.enable_lucee,
                enable_rest: manifest.enable_rest,
                url_rewrite_enabled: manifest.url_rewrite.enabled,
                runtime_supports_url_rewrite: manifest.runtime.supports_url_rewrite(),
                legacy_rewrite_file_present: project_dir.join("urlrewrite.xml").exists(),
            },
        )?;
        warnings.extend(web_result.warnings);

        if manifest.url_rewrite.enabled && manifest.runtime.supports_url_rewrite() {
            rewrite::materialize(
                &config_dir.join("rewrite.conf"),
                &rewrite::RewriteOptions {
                    router_file: manifest.url_rewrite.router_file.clone(),
                    enable_rest: manifest.enable_rest,
                    admin_enabled: manifest.admin.enabled,
                },
            )?;
        }

        if !matches!(manifest.runtime, RuntimeConfig::Container { .. }) {
            if let Ok(engine_jar) = self.locate_engine_jar(&ctx.express_cache_dir, &manifest.version) {
                jar_placement::materialize(
                    &engine_jar,
                    &config_dir.join("lib"),
                    &manifest.dependency_settings.install_method,
                )?;
            }
        }

        let active_agent_args: Vec<Vec<String>> = manifest
            .agents
            .values()
            .filter(|a| a.enabled)
            .map(|a| a.jvm_args.clone())
            .collect();
        jvm_options::materialize(
            &config_dir.join("setenv.sh"),
            &jvm_options::JvmOptionsInput {
                min_memory: &manifest.jvm.min_memory,
                max_memory: &manifest.jvm.max_memory,
                monitoring_enabled: manifest.monitoring.enabled,
                jmx_port: manifest.monitoring.jmx.port,
                active_agent_args,
                additional_args: &manifest.jvm.additional_args,
            },
        )?;

        // C8: spawn and wait for readiness.
        let controller = ProcessController::new();
        let handle = controller.start(backend.as_ref(), &ctx)?;

        let mut meta = registry.metadata(name)?;
        meta.pid = match &handle {
            BackendHandle::Process { pid } => Some(*pid),
            BackendHandle::Container { .. } => None,
        };
        meta.port = Some(port);
        registry.put_metadata(&meta)?;

        if let Err(e) = controller.await_ready(&ctx, &ReadinessOptions::default()) {
            let tail = controller.logs(backend.as_ref(), &ctx, 50).unwrap_or_default();
            let _ = controller.stop(backend.as_ref(), &ctx, &handle);
            let _ = registry.transition(name, InstanceState::Failed);
            for line in tail {
                tracing::warn!("{name}: {line}");
            }
            return Err(e);
        }

        registry.transition(name, InstanceState::Running)?;

        let scheme = if https_port.is_some() { "https" } else { "http" };
        let display_port = https_port.unwrap_or(port);
        let url = format!("{scheme}://{}:{display_port}/", manifest.host);

        Ok(StartOutcome {
            name: name.to_owned(),
            instance_dir: instance_dir.to_path_buf(),
            manifest,
            state: InstanceState::Running,
            url: Some(url),
            warnings,
            dependency_mappings: mappings,
        })
    }

    fn locate_engine_jar(&self, cache_dir: &Path, version: &str) -> Result<PathBuf, CoreError> {
        let base = cache_dir.join(version);
        let preferred = base.join("lib").join(format!("lucee-{version}.jar"));
        if preferred.exists() {
            return Ok(preferred);
        }
        for dir in [base.join("lib"), base.clone()] {
            if let Ok(read) = std::fs::read_dir(&dir) {
                for entry in read.flatten() {
                    let path = entry.path();
                    if path.extension().is_some_and(|e| e == "jar") {
                        return Ok(path);
                    }
                }
            }
        }
        Err(CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no engine jar found for version {version} under {}", base.display()),
        )))
    }

    /// Reconstruct the manifest and [`InstanceContext`] an instance was last
    /// started with, from the snapshot `start` writes alongside it — used
    /// by `stop`/`status`/`list`/`logs` so they don't have to re-resolve
    /// placeholders or re-open the secret store.
    fn load_ctx(&self, name: &str) -> Result<(Manifest, InstanceContext), CoreError> {
        let instance_dir = self.layout.instance_dir(name);
        let snapshot_path = instance_dir.join(SNAPSHOT_FILE);
        let content = std::fs::read_to_string(&snapshot_path)
            .map_err(|_| CoreError::InstanceNotFound(name.to_owned()))?;
        let manifest: Manifest = serde_json::from_str(&content)?;

        let meta = InstanceRegistry::new(self.layout.clone()).metadata(name)?;
        let project_dir = PathBuf::from(&meta.project_dir);
        let webroot = manifest
            .webroot
            .as_ref()
            .map(|w| project_dir.join(w))
            .unwrap_or_else(|| project_dir.clone());

        let ctx = InstanceContext {
            name: name.to_owned(),
            instance_dir,
            project_dir,
            webroot,
            host: manifest.host.clone(),
            port: manifest.port.unwrap_or(DEFAULT_PORT),
            shutdown_port: manifest.shutdown_port.unwrap_or(DEFAULT_PORT + 1),
            https_port: if manifest.https.enabled {
                manifest.https_port
            } else {
                None
            },
            engine_version: manifest.version.clone(),
            runtime: manifest.runtime.clone(),
            express_cache_dir: self.home.join("express"),
            admin_password: manifest.admin.password.clone(),
            agent_env: BTreeMap::new(),
        };

        Ok((manifest, ctx))
    }

    /// Stop a running (or starting) instance. A no-op on any other state.
    pub fn stop(&self, name: &str) -> Result<(), CoreError> {
        let registry = InstanceRegistry::new(self.layout.clone());
        let meta = registry.metadata(name)?;
        if !matches!(meta.state, InstanceState::Running | InstanceState::Starting) {
            return Ok(());
        }

        let lock_path = self.layout.instance_dir(name).join(".lock");
        let _lock = InstanceLock::try_acquire(&lock_path)?
            .ok_or_else(|| CoreError::InstanceBusy(name.to_owned()))?;

        let wal = WriteAheadLog::new(&self.layout);
        wal.initialize()?;
        let op_id = wal.begin(WalOpKind::Stop, name)?;

        registry.transition(name, InstanceState::Stopping)?;

        let (manifest, ctx) = self.load_ctx(name)?;
        let backend = select_backend(&manifest.runtime)?;
        let controller = ProcessController::new();

        match ProcessController::read_handle(&ctx) {
            Some(handle) => controller.stop(backend.as_ref(), &ctx, &handle)?,
            None => {
                let _ = std::fs::remove_file(ctx.pid_file());
                let _ = std::fs::remove_file(ctx.container_file());
            }
        }

        registry.transition(name, InstanceState::ProvisionedStopped)?;
        let mut meta = registry.metadata(name)?;
        meta.pid = None;
        registry.put_metadata(&meta)?;

        wal.commit(&op_id)?;
        Ok(())
    }

    /// Stop (if running) then start again, reusing the instance's last
    /// project directory and environment tag.
    pub fn restart(&self, name: &str) -> Result<StartOutcome, CoreError> {
        let registry = InstanceRegistry::new(self.layout.clone());
        let meta = registry.metadata(name)?;
        let project_dir = PathBuf::from(&meta.project_dir);

        if matches!(meta.state, InstanceState::Running | InstanceState::Starting) {
            self.stop(name)?;
        }

        let opts = StartOptions {
            name: Some(name.to_owned()),
            environment: meta.env_tag.clone(),
            ..Default::default()
        };
        self.start(&project_dir, &opts)
    }

    /// Current view of one instance, reconciling `RUNNING` against actual
    /// process liveness (spec §3: a dead process behind `RUNNING` metadata
    /// is reported and persisted as `ORPHANED`).
    pub fn status(&self, name: &str) -> Result<InstanceView, CoreError> {
        let registry = InstanceRegistry::new(self.layout.clone());
        self.reconcile_one(&registry, name)?;
        registry
            .list()?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| CoreError::InstanceNotFound(name.to_owned()))
    }

    /// All known instances, with the same liveness reconciliation as `status`.
    pub fn list(&self) -> Result<Vec<InstanceView>, CoreError> {
        let registry = InstanceRegistry::new(self.layout.clone());
        let views = registry.list()?;
        for view in &views {
            if view.state == InstanceState::Running {
                let _ = self.reconcile_one(&registry, &view.name);
            }
        }
        registry.list()
    }

    fn reconcile_one(&self, registry: &InstanceRegistry, name: &str) -> Result<(), CoreError> {
        let meta = registry.metadata(name)?;
        if meta.state != InstanceState::Running {
            return Ok(());
        }
        let Ok((manifest, ctx)) = self.load_ctx(name) else {
            return Ok(());
        };
        let Ok(backend) = select_backend(&manifest.runtime) else {
            return Ok(());
        };
        if let Some(handle) = ProcessController::read_handle(&ctx) {
            let alive = ProcessController::new()
                .probe(backend.as_ref(), &ctx, &handle)
                .unwrap_or(false);
            if !alive {
                registry.transition(name, InstanceState::Orphaned)?;
            }
        }
        Ok(())
    }

    /// Remove provisioned-but-stopped instances and orphaned cache entries
    /// (spec §4.4 `server prune`).
    pub fn prune(&self, name: Option<&str>, dry_run: bool) -> Result<PruneReport, CoreError> {
        let pruner = Pruner::new(self.layout.clone());
        let report = match name {
            Some(n) => {
                let n = n.to_owned();
                pruner.collect_with_selector(dry_run, crate::shutdown_requested, move |m| m.name == n)?
            }
            None => pruner.collect(dry_run)?,
        };
        Ok(report)
    }

    /// Up to `lines` trailing lines of an instance's log output.
    pub fn logs(&self, name: &str, lines: usize) -> Result<Vec<String>, CoreError> {
        let (manifest, ctx) = self.load_ctx(name)?;
        let backend = select_backend(&manifest.runtime)?;
        Ok(ProcessController::new().logs(backend.as_ref(), &ctx, lines)?)
    }

    pub fn metadata(&self, name: &str) -> Result<InstanceMetadata, CoreError> {
        InstanceRegistry::new(self.layout.clone()).metadata(name)
    }

    /// Resolve and materialize a project's dependencies (C7) without
    /// preparing the runtime or starting anything — the `deps install`/
    /// `deps prune` surface. `force_prune` overrides
    /// `dependencySettings.pruneOnInstall` for a `deps prune` invocation.
    pub fn install_dependencies(
        &self,
        project_dir: &Path,
        opts: &StartOptions,
        force_prune: bool,
    ) -> Result<DepsInstallOutcome, CoreError> {
        let project_dir = std::fs::canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
        let secrets = self.open_secret_store(opts)?;
        let resolved = self.resolve_manifest(&project_dir, opts, secrets.as_ref())?;
        let manifest = resolved.manifest;

        let registry = InstanceRegistry::new(self.layout.clone());
        let name = registry.resolve_name(&project_dir, manifest.name.as_deref(), opts.name.as_deref(), opts.force)?;
        let instance_dir = registry.instance_dir(&name);
        std::fs::create_dir_all(&instance_dir)?;

        let mut entries: BTreeMap<String, DependencyEntry> = manifest.dependencies.clone();
        if manifest.dependency_settings.install_dev_dependencies {
            entries.extend(manifest.dev_dependencies.clone());
        }

        let mut settings = manifest.dependency_settings.clone();
        if force_prune {
            settings.prune_on_install = true;
        }

        let lock_path = project_dir.join(LOCK_FILE);
        let previous_lock = if lock_path.exists() {
            DependencyLock::read_from_file(&lock_path).ok()
        } else {
            None
        };

        let resolver = DependencyResolver::new(instance_dir, project_dir);
        let (new_lock, mappings) = resolver.ensure(&entries, &settings, previous_lock.as_ref())?;
        new_lock.write_to_file(&lock_path)?;

        Ok(DepsInstallOutcome {
            name,
            lock_path,
            mappings,
        })
    }
}

/// What `Engine::install_dependencies` produced.
#[derive(Debug, Clone)]
pub struct DepsInstallOutcome {
    pub name: String,
    pub lock_path: PathBuf,
    pub mappings: Vec<ResolvedMapping>,
}

/// Derive virtual mappings from a previously written lock, for a start that
/// skips re-resolution (`autoInstallOnServerStart: false`) but still needs
/// C6 to see the dependency's last known location.
fn mappings_from_lock(lock: &DependencyLock) -> Vec<ResolvedMapping> {
    lock.entries
        .iter()
        .filter_map(|entry| {
            entry.mapping.as_ref().map(|mapping| ResolvedMapping {
                name: entry.name.clone(),
                virtual_path: if mapping.ends_with('/') {
                    mapping.clone()
                } else {
                    format!("{mapping}/")
                },
                physical_path: PathBuf::from(&entry.install_path),
            })
        })
        .collect()
}
