use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("unknown environment '{name}', available: {available:?}")]
    UnknownEnvironment { name: String, available: Vec<String> },
    #[error("manifest name resolves to an empty string")]
    EmptyName,
    #[error("port collision: {a} and {b} are both {port}")]
    PortCollision { a: &'static str, b: &'static str, port: u16 },
    #[error("unknown runtime.type '{0}', expected embedded, external-container, or container")]
    UnknownRuntimeType(String),
    #[error("urlRewrite is not supported by runtime type '{0}'")]
    UrlRewriteIncompatible(String),
}

/// The fully resolved, validated configuration for one `server start` invocation.
///
/// Produced by merging defaults, an optional external configuration file, the
/// project manifest, an optional named environment overlay, and ordered CLI
/// overrides (see [`crate::merge`]), followed by placeholder substitution
/// performed by the environment resolver upstream of this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub shutdown_port: Option<u16>,
    #[serde(default)]
    pub https_port: Option<u16>,
    #[serde(default)]
    pub webroot: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub enable_lucee: bool,
    #[serde(default)]
    pub enable_rest: bool,
    #[serde(default)]
    pub configuration_file: Option<String>,
    /// Protected zone: `${...}` here is left for the downstream CFML engine.
    #[serde(default)]
    pub configuration: serde_json::Value,
    #[serde(default)]
    pub jvm: JvmConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub url_rewrite: UrlRewriteConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub https: HttpsConfig,
    #[serde(default)]
    pub open_browser: bool,
    #[serde(default)]
    pub open_browser_url: Option<String>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    /// Preserved for inspection; the selected overlay was already deep-merged
    /// into the rest of this struct by [`crate::merge`] before it was parsed.
    #[serde(default)]
    pub environments: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyEntry>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, DependencyEntry>,
    #[serde(default)]
    pub dependency_settings: DependencySettings,
}

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_version() -> String {
    "5".to_owned()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JvmConfig {
    #[serde(default = "default_min_memory")]
    pub min_memory: String,
    #[serde(default = "default_max_memory")]
    pub max_memory: String,
    /// Protected zone: `${...}` here is left for the JVM/downstream engine.
    #[serde(default)]
    pub additional_args: Vec<String>,
}

impl Default for JvmConfig {
    fn default() -> Self {
        Self {
            min_memory: default_min_memory(),
            max_memory: default_max_memory(),
            additional_args: Vec::new(),
        }
    }
}

fn default_min_memory() -> String {
    "128m".to_owned()
}

fn default_max_memory() -> String {
    "512m".to_owned()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub jmx: JmxConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JmxConfig {
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UrlRewriteConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_router_file")]
    pub router_file: String,
}

impl Default for UrlRewriteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            router_file: default_router_file(),
        }
    }
}

fn default_router_file() -> String {
    "index.cfm".to_owned()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub redirect: bool,
    #[serde(default)]
    pub keystore: Option<KeystoreRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeystoreRef {
    pub path: String,
    pub password: String,
}

/// The three `RuntimeProvider` backends named in the spec, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuntimeConfig {
    Embedded {
        #[serde(default)]
        variant: Option<String>,
    },
    ExternalContainer {
        #[serde(rename = "catalinaHome")]
        catalina_home: String,
    },
    Container {
        image: String,
        #[serde(default = "default_tag")]
        tag: String,
        #[serde(default, rename = "containerName")]
        container_name: Option<String>,
    },
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig::Embedded { variant: None }
    }
}

impl RuntimeConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeConfig::Embedded { .. } => "embedded",
            RuntimeConfig::ExternalContainer { .. } => "external-container",
            RuntimeConfig::Container { .. } => "container",
        }
    }

    pub fn supports_url_rewrite(&self) -> bool {
        !matches!(self, RuntimeConfig::Container { .. })
    }
}

fn default_tag() -> String {
    "latest".to_owned()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    Cfml,
    Jar,
    Extension,
    JavaArtifact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum DependencySource {
    Git {
        url: String,
        #[serde(default = "default_git_ref")]
        git_ref: String,
        #[serde(default)]
        subpath: Option<String>,
    },
    Http {
        url: String,
    },
    File {
        path: String,
    },
    Maven {
        coordinates: String,
    },
}

fn default_git_ref() -> String {
    "HEAD".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEntry {
    pub kind: DependencyKind,
    #[serde(flatten)]
    pub source: DependencySource,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub install_path: Option<String>,
    #[serde(default)]
    pub mapping: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DependencySettings {
    #[serde(default)]
    pub install_location: Option<String>,
    #[serde(default = "default_true_settings")]
    pub auto_install_on_server_start: bool,
    #[serde(default = "default_true_settings")]
    pub verify_integrity: bool,
    #[serde(default = "default_true_settings")]
    pub prune_on_install: bool,
    #[serde(default = "default_install_method")]
    pub install_method: String,
    #[serde(default)]
    pub install_dev_dependencies: bool,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            install_location: None,
            auto_install_on_server_start: true,
            verify_integrity: true,
            prune_on_install: true,
            install_method: default_install_method(),
            install_dev_dependencies: false,
        }
    }
}

fn default_true_settings() -> bool {
    true
}

fn default_install_method() -> String {
    "symlink".to_owned()
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

impl Manifest {
    /// Resolve the instance name: `--name` (handled by the caller), else
    /// `manifest.name`, else the basename of `project_dir`.
    pub fn resolve_name(&self, project_dir: &Path) -> Result<String, ManifestError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ManifestError::EmptyName);
            }
            return Ok(name.clone());
        }
        project_dir
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_owned)
            .filter(|s| !s.is_empty())
            .ok_or(ManifestError::EmptyName)
    }

    /// Validate port collisions, runtime type, and runtime/url-rewrite compatibility.
    /// Auto-adjusts undefined secondary ports before checking (spec §3).
    pub fn validate(&mut self, default_port: u16) -> Result<(), ManifestError> {
        let port = self.port.unwrap_or(default_port);
        self.port = Some(port);
        let shutdown = self.shutdown_port.unwrap_or(port + 1);
        self.shutdown_port = Some(shutdown);
        let jmx = self.monitoring.jmx.port.unwrap_or(port + 2);
        if self.monitoring.enabled {
            self.monitoring.jmx.port = Some(jmx);
        }
        let https_port = self.https_port.unwrap_or(port + 3);
        if self.https.enabled {
            self.https_port = Some(https_port);
        }

        let mut seen: Vec<(&'static str, u16)> = vec![("port", port), ("shutdownPort", shutdown)];
        if self.monitoring.enabled {
            seen.push(("monitoring.jmx.port", jmx));
        }
        if self.https.enabled {
            seen.push(("httpsPort", https_port));
        }
        for i in 0..seen.len() {
            for j in (i + 1)..seen.len() {
                if seen[i].1 == seen[j].1 {
                    return Err(ManifestError::PortCollision {
                        a: seen[i].0,
                        b: seen[j].0,
                        port: seen[i].1,
                    });
                }
            }
        }

        if self.url_rewrite.enabled && !self.runtime.supports_url_rewrite() {
            return Err(ManifestError::UrlRewriteIncompatible(
                self.runtime.type_name().to_owned(),
            ));
        }

        Ok(())
    }
}
