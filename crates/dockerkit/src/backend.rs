//! Docker backend using `docker` CLI commands.

use crate::error::{BACKEND, classify, from_docker_output};
use crate::types::{Container, DockerObject, MANAGED_LABEL, Network, Volume};
use declarative::{BackendClient, Error, ErrorCategory, Identity, Result, RetryConfig, with_retry};
use serde::{Deserialize, Serialize};
use std::process::{Command, Output};

/// Connection settings for the docker CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Path or name of the docker executable
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Daemon address, passed to the CLI as `DOCKER_HOST`
    #[serde(default)]
    pub host: Option<String>,
}

fn default_binary() -> String {
    "docker".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            host: None,
        }
    }
}

/// Backend that executes real `docker` commands.
pub struct DockerBackend {
    config: DockerConfig,
    retry: RetryConfig,
}

impl DockerBackend {
    pub fn new(config: DockerConfig) -> Self {
        Self {
            config,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy used for reads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    /// Run a docker command and return output.
    fn run(&self, args: &[String]) -> Result<Output> {
        log::debug!("{} {}", self.config.binary, args.join(" "));
        let mut command = Command::new(&self.config.binary);
        command.args(args);
        if let Some(host) = &self.config.host {
            command.env("DOCKER_HOST", host);
        }
        command.output().map_err(|e| {
            Error::backend(
                BACKEND,
                ErrorCategory::Unavailable,
                format!("failed to execute {}: {e}", self.config.binary),
            )
        })
    }

    /// Run a docker command and check for success.
    fn run_checked(&self, args: &[String], subject: &str) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(from_docker_output(&stderr, subject));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn inspect(&self, identity: &Identity) -> Result<Option<serde_json::Value>> {
        let args = inspect_args(identity)?;
        let output = self.run(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if classify(&stderr) == ErrorCategory::NotFound {
                return Ok(None);
            }
            return Err(from_docker_output(&stderr, &identity.to_string()));
        }
        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(json.as_array().and_then(|arr| arr.first()).cloned())
    }
}

impl BackendClient for DockerBackend {
    type Native = DockerObject;
    type Live = serde_json::Value;

    fn name(&self) -> &str {
        BACKEND
    }

    fn connect(&self) -> Result<()> {
        let args = strings(&["version", "--format", "{{.Server.Version}}"]);
        let version = self.run_checked(&args, "docker version")?;
        log::debug!("Connected to docker daemon {}", version.trim());
        Ok(())
    }

    fn read(&self, identity: &Identity) -> Result<Option<serde_json::Value>> {
        with_retry(&self.retry, &format!("docker inspect {identity}"), || {
            self.inspect(identity)
        })
    }

    fn create(&self, native: &DockerObject) -> Result<()> {
        let subject = native.identity().to_string();
        self.run_checked(&create_args(native), &subject)?;
        Ok(())
    }

    fn update(&self, native: &DockerObject) -> Result<()> {
        match native {
            DockerObject::Network(_) | DockerObject::Volume(_) => {
                log::info!(
                    "{} cannot be changed in place, leaving it as is",
                    native.identity()
                );
                Ok(())
            }
            DockerObject::Container(container) => {
                let subject = native.identity().to_string();
                self.run_checked(&strings(&["rm", "-f", &container.name]), &subject)?;
                self.run_checked(&create_args(native), &subject)?;
                Ok(())
            }
        }
    }

    fn delete(&self, identity: &Identity) -> Result<()> {
        self.run_checked(&delete_args(identity)?, &identity.to_string())?;
        Ok(())
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

fn object_type(identity: &Identity) -> Result<&'static str> {
    match identity.kind.as_str() {
        Network::KIND => Ok("network"),
        Volume::KIND => Ok("volume"),
        Container::KIND => Ok("container"),
        other => Err(Error::config(format!("unknown docker kind '{other}'"))),
    }
}

fn inspect_args(identity: &Identity) -> Result<Vec<String>> {
    Ok(strings(&[object_type(identity)?, "inspect", &identity.name]))
}

fn delete_args(identity: &Identity) -> Result<Vec<String>> {
    Ok(match object_type(identity)? {
        "container" => strings(&["rm", "-f", &identity.name]),
        kind => strings(&[kind, "rm", &identity.name]),
    })
}

fn push_labels<'a>(args: &mut Vec<String>, labels: impl Iterator<Item = (&'a String, &'a String)>) {
    args.push("--label".to_string());
    args.push(format!("{MANAGED_LABEL}=true"));
    for (key, value) in labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }
}

/// Arguments that create `native` from scratch
pub(crate) fn create_args(native: &DockerObject) -> Vec<String> {
    match native {
        DockerObject::Network(network) => {
            let mut args = strings(&["network", "create"]);
            if let Some(driver) = &network.driver {
                args.extend(strings(&["--driver", driver]));
            }
            if network.internal {
                args.push("--internal".to_string());
            }
            push_labels(&mut args, network.labels.iter());
            args.push(network.name.clone());
            args
        }
        DockerObject::Volume(volume) => {
            let mut args = strings(&["volume", "create"]);
            if let Some(driver) = &volume.driver {
                args.extend(strings(&["--driver", driver]));
            }
            push_labels(&mut args, volume.labels.iter());
            args.push(volume.name.clone());
            args
        }
        DockerObject::Container(container) => container_run_args(container),
    }
}

fn container_run_args(container: &Container) -> Vec<String> {
    let mut args = strings(&["run", "-d", "--name", &container.name]);
    if let Some(network) = &container.network {
        args.extend(strings(&["--network", network]));
    }
    if let Some(restart) = &container.restart {
        args.extend(strings(&["--restart", restart]));
    }
    for port in &container.ports {
        args.extend(strings(&["-p", port]));
    }
    for (key, value) in &container.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    for mount in &container.volumes {
        args.extend(strings(&["-v", mount]));
    }
    push_labels(&mut args, container.labels.iter());
    args.push(container.image.clone());
    args.extend(container.command.iter().cloned());
    args
}
