//! Manifest commands
//!
//! Every command loads the manifest, narrows it with `--target` and
//! `--backend`, connects only to the backends that still have resources,
//! and runs one plan per backend.

pub mod apply;
pub mod status;

use crate::cli::CommonArgs;
use crate::config::{self, BackendKind, Manifest};
use anyhow::{Context as _, Result};
use declarative::{BackendClient, Engine, EngineOptions, ExecutionPlan};
use dockerkit::DockerBackend;
use kubekit::KubectlBackend;
use std::path::PathBuf;

/// Manifest plus the filtered plans of one command invocation
pub(crate) struct Session {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub docker: ExecutionPlan<DockerBackend>,
    pub kubernetes: ExecutionPlan<KubectlBackend>,
}

impl Session {
    pub fn open(common: &CommonArgs) -> Result<Self> {
        let path = config::resolve_path(common.file.as_deref())?;
        log::info!("Loading manifest {}", path.display());
        let manifest = Manifest::load(&path)?;

        let target = common.target.as_deref();
        let docker = if wanted(common, &manifest, BackendKind::Docker) {
            manifest.docker_plan(common.no_cache)?.filter_by_target(target)
        } else {
            ExecutionPlan::new()
        };
        let kubernetes = if wanted(common, &manifest, BackendKind::Kubernetes) {
            manifest
                .kubernetes_plan(common.no_cache)?
                .filter_by_target(target)
        } else {
            ExecutionPlan::new()
        };

        Ok(Self {
            path,
            manifest,
            docker,
            kubernetes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.docker.is_empty() && self.kubernetes.is_empty()
    }

    pub fn engine(&self, common: &CommonArgs) -> Engine {
        let jobs = common.jobs.unwrap_or(self.manifest.settings.jobs).max(1);
        Engine::new(EngineOptions { jobs })
    }

    pub fn docker_backend(&self) -> Result<DockerBackend> {
        let backend = DockerBackend::new(self.manifest.docker.clone());
        connect(&backend)?;
        Ok(backend)
    }

    pub fn kubernetes_backend(&self) -> Result<KubectlBackend> {
        let backend = KubectlBackend::new(self.manifest.kubernetes.clone());
        connect(&backend)?;
        Ok(backend)
    }
}

fn selected(common: &CommonArgs, backend: BackendKind) -> bool {
    common.backend.is_none_or(|b| b == backend)
}

/// Selected on the command line and declared in the manifest
fn wanted(common: &CommonArgs, manifest: &Manifest, backend: BackendKind) -> bool {
    selected(common, backend) && manifest.uses(backend)
}

fn connect<B: BackendClient>(backend: &B) -> Result<()> {
    backend
        .connect()
        .with_context(|| format!("Could not connect to {}", backend.name()))
}
