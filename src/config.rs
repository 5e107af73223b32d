//! Manifest loading and validation
//!
//! A manifest declares backend settings and an ordered list of resources.
//! Everything that can be checked without contacting a backend is checked
//! here, so a bad manifest fails before any command runs.

use anyhow::{Context, Result, bail};
use declarative::{ExecutionPlan, Resource, ResourceOptions};
use dockerkit::{DockerBackend, DockerConfig};
use kubekit::{KubeConfig, KubectlBackend};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file name looked up in the working directory
pub const MANIFEST_FILE: &str = "groundwork.toml";

/// Control plane a resource is declared on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Docker,
    Kubernetes,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Kubernetes => write!(f, "kubernetes"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_true() -> bool {
    true
}

fn default_jobs() -> usize {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_cache: true,
            jobs: default_jobs(),
        }
    }
}

/// One `[[resources]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    pub backend: BackendKind,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Dependency stage, lower stages are applied first
    #[serde(default)]
    pub stage: usize,
    #[serde(default)]
    pub skip_create: bool,
    #[serde(default)]
    pub skip_update: bool,
    #[serde(default)]
    pub skip_delete: bool,
    /// Overrides `settings.use_cache` for this resource
    #[serde(default)]
    pub use_cache: Option<bool>,
    /// Kind-specific fields
    #[serde(default)]
    pub spec: toml::Table,
}

impl ResourceEntry {
    fn label(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{} {} {}/{}", self.backend, self.kind, ns, self.name),
            None => format!("{} {} {}", self.backend, self.kind, self.name),
        }
    }

    fn options(&self, use_cache: bool) -> ResourceOptions {
        ResourceOptions {
            skip_create: self.skip_create,
            skip_update: self.skip_update,
            skip_delete: self.skip_delete,
            use_cache: self.use_cache.unwrap_or(use_cache),
        }
    }

    fn spec_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.spec)
            .with_context(|| format!("Invalid spec for {}", self.label()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub kubernetes: KubeConfig,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Parse and validate manifest text
    pub fn parse(content: &str) -> Result<Self> {
        let mut manifest: Self = toml::from_str(content)?;
        if let Some(kubeconfig) = &manifest.kubernetes.kubeconfig {
            let expanded = shellexpand::tilde(&kubeconfig.to_string_lossy()).into_owned();
            manifest.kubernetes.kubeconfig = Some(PathBuf::from(expanded));
        }
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.settings.jobs == 0 {
            bail!("settings.jobs must be at least 1");
        }

        let mut seen = HashSet::new();
        for entry in &self.resources {
            if entry.name.trim().is_empty() {
                bail!("{} {} resource has an empty name", entry.backend, entry.kind);
            }
            if entry.backend == BackendKind::Docker && entry.namespace.is_some() {
                bail!("{}: docker resources have no namespace", entry.label());
            }
            let key = (
                entry.backend,
                entry.kind.as_str(),
                entry.namespace.as_deref(),
                entry.name.as_str(),
            );
            if !seen.insert(key) {
                bail!("{} is declared more than once", entry.label());
            }
        }

        // Building the plans checks kinds and specs
        self.docker_plan(false)?;
        self.kubernetes_plan(false)?;
        Ok(())
    }

    fn entries(&self, backend: BackendKind) -> impl Iterator<Item = &ResourceEntry> {
        self.resources.iter().filter(move |e| e.backend == backend)
    }

    /// Whether any resource is declared on `backend`
    pub fn uses(&self, backend: BackendKind) -> bool {
        self.entries(backend).next().is_some()
    }

    fn options(&self, entry: &ResourceEntry, no_cache: bool) -> ResourceOptions {
        let mut options = entry.options(self.settings.use_cache);
        if no_cache {
            options.use_cache = false;
        }
        options
    }

    /// Staged plan of the docker resources
    ///
    /// `no_cache` disables the state cache for every resource.
    pub fn docker_plan(&self, no_cache: bool) -> Result<ExecutionPlan<DockerBackend>> {
        let mut plan = ExecutionPlan::new();
        for entry in self.entries(BackendKind::Docker) {
            let kind = dockerkit::kind_from_spec(&entry.kind, &entry.name, entry.spec_json()?)?;
            let resource = Resource::from_boxed(kind)?.with_options(self.options(entry, no_cache));
            plan.add(entry.stage, resource);
        }
        Ok(plan)
    }

    /// Staged plan of the kubernetes resources
    pub fn kubernetes_plan(&self, no_cache: bool) -> Result<ExecutionPlan<KubectlBackend>> {
        let mut plan = ExecutionPlan::new();
        for entry in self.entries(BackendKind::Kubernetes) {
            let kind = kubekit::kind_from_spec(
                &entry.kind,
                &entry.name,
                entry.namespace.as_deref(),
                entry.spec_json()?,
            )?;
            let resource = Resource::from_boxed(kind)?.with_options(self.options(entry, no_cache));
            plan.add(entry.stage, resource);
        }
        Ok(plan)
    }
}

/// Manifest path: explicit `--file`/`$GROUNDWORK_MANIFEST`, then the
/// working directory, then the user config directory.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        return Ok(PathBuf::from(expanded));
    }

    let local = PathBuf::from(MANIFEST_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join("groundwork").join(MANIFEST_FILE);
        if user.exists() {
            return Ok(user);
        }
    }

    bail!("No {MANIFEST_FILE} found in the current directory (use --file to point at one)")
}
