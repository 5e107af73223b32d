//! kubectl backend.
//!
//! Objects are written as JSON on stdin (`create -f -`, `apply -f -`) and
//! read with `get -o json`. Every invocation carries the configured context
//! and kubeconfig.

use crate::error::{BACKEND, classify, from_kubectl_output};
use crate::types::KubeObject;
use declarative::{BackendClient, Error, ErrorCategory, Identity, Result, RetryConfig, with_retry};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Connection settings for kubectl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    /// kubeconfig context, `--context`
    #[serde(default)]
    pub context: Option<String>,
    /// kubeconfig file, `--kubeconfig`
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    /// Namespace for namespaced objects that do not declare one
    #[serde(default)]
    pub namespace: Option<String>,
}

fn default_binary() -> String {
    "kubectl".to_string()
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            context: None,
            kubeconfig: None,
            namespace: None,
        }
    }
}

/// Backend that executes real `kubectl` commands.
pub struct KubectlBackend {
    config: KubeConfig,
    retry: RetryConfig,
}

impl KubectlBackend {
    pub fn new(config: KubeConfig) -> Self {
        Self {
            config,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &KubeConfig {
        &self.config
    }

    /// Namespace used when an object does not declare one
    pub fn default_namespace(&self) -> Option<&str> {
        self.config.namespace.as_deref()
    }

    /// Full argument list: connection flags followed by `args`.
    fn command_args(&self, args: Vec<String>) -> Vec<String> {
        let mut full = Vec::new();
        if let Some(context) = &self.config.context {
            full.push("--context".to_string());
            full.push(context.clone());
        }
        if let Some(kubeconfig) = &self.config.kubeconfig {
            full.push("--kubeconfig".to_string());
            full.push(kubeconfig.display().to_string());
        }
        full.extend(args);
        full
    }

    fn run(&self, args: Vec<String>, stdin: Option<&[u8]>) -> Result<Output> {
        let args = self.command_args(args);
        log::debug!("{} {}", self.config.binary, args.join(" "));

        let spawn_error = |e: std::io::Error| {
            Error::backend(
                BACKEND,
                ErrorCategory::Unavailable,
                format!("failed to execute {}: {e}", self.config.binary),
            )
        };

        let mut command = Command::new(&self.config.binary);
        command.args(&args);
        let Some(input) = stdin else {
            return command.output().map_err(spawn_error);
        };

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        let written = match child.stdin.take() {
            Some(mut pipe) => pipe.write_all(input),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;
        match written {
            // kubectl closed stdin early, its stderr says why
            Err(_) if !output.status.success() => Ok(output),
            Err(e) => Err(e.into()),
            Ok(()) => Ok(output),
        }
    }

    fn run_checked(&self, args: Vec<String>, stdin: Option<&[u8]>, subject: &str) -> Result<String> {
        let output = self.run(args, stdin)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(from_kubectl_output(&stderr, subject));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn get(&self, identity: &Identity) -> Result<Option<serde_json::Value>> {
        let output = self.run(get_args(identity), None)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if classify(&stderr) == ErrorCategory::NotFound {
                return Ok(None);
            }
            return Err(from_kubectl_output(&stderr, &identity.to_string()));
        }
        Ok(Some(serde_json::from_slice(&output.stdout)?))
    }

    fn send(&self, verb: &[&str], object: &KubeObject) -> Result<()> {
        let body = serde_json::to_vec(&object.manifest)?;
        let args = verb.iter().map(|s| (*s).to_string()).collect();
        self.run_checked(args, Some(&body), &object.identity.to_string())?;
        Ok(())
    }
}

impl BackendClient for KubectlBackend {
    type Native = KubeObject;
    type Live = serde_json::Value;

    fn name(&self) -> &str {
        BACKEND
    }

    fn connect(&self) -> Result<()> {
        let args = vec!["version".to_string(), "-o".to_string(), "json".to_string()];
        let stdout = self.run_checked(args, None, "kubectl version")?;
        let version: serde_json::Value = serde_json::from_str(&stdout)?;
        match version["serverVersion"]["gitVersion"].as_str() {
            Some(server) => {
                log::debug!("Connected to cluster {server}");
                Ok(())
            }
            None => Err(Error::backend(
                BACKEND,
                ErrorCategory::Unavailable,
                "kubectl version reported no server version",
            )),
        }
    }

    fn read(&self, identity: &Identity) -> Result<Option<serde_json::Value>> {
        with_retry(&self.retry, &format!("kubectl get {identity}"), || {
            self.get(identity)
        })
    }

    fn create(&self, native: &KubeObject) -> Result<()> {
        self.send(&["create", "--save-config", "-f", "-"], native)
    }

    fn update(&self, native: &KubeObject) -> Result<()> {
        self.send(&["apply", "-f", "-"], native)
    }

    fn delete(&self, identity: &Identity) -> Result<()> {
        self.run_checked(delete_args(identity), None, &identity.to_string())?;
        Ok(())
    }
}

fn target_args(verb: &str, identity: &Identity) -> Vec<String> {
    let mut args = vec![
        verb.to_string(),
        identity.kind.to_lowercase(),
        identity.name.clone(),
    ];
    if let Some(ns) = &identity.namespace {
        args.push("-n".to_string());
        args.push(ns.clone());
    }
    args
}

fn get_args(identity: &Identity) -> Vec<String> {
    let mut args = target_args("get", identity);
    args.extend(["-o".to_string(), "json".to_string()]);
    args
}

fn delete_args(identity: &Identity) -> Vec<String> {
    let mut args = target_args("delete", identity);
    args.push("--wait=false".to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_args_namespaced() {
        let identity = Identity::new("ServiceAccount", "phi-sa").in_namespace("phi-ns");
        assert_eq!(
            get_args(&identity),
            vec!["get", "serviceaccount", "phi-sa", "-n", "phi-ns", "-o", "json"]
        );
    }

    #[test]
    fn test_delete_args_cluster_scoped() {
        let identity = Identity::new("Namespace", "phi-ns");
        assert_eq!(
            delete_args(&identity),
            vec!["delete", "namespace", "phi-ns", "--wait=false"]
        );
    }

    #[test]
    fn test_connection_flags_come_first() {
        let backend = KubectlBackend::new(KubeConfig {
            context: Some("staging".to_string()),
            kubeconfig: Some(PathBuf::from("/tmp/kube.yaml")),
            ..KubeConfig::default()
        });
        let args = backend.command_args(get_args(&Identity::new("Namespace", "a")));
        assert_eq!(
            &args[..5],
            &["--context", "staging", "--kubeconfig", "/tmp/kube.yaml", "get"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_keeps_kubectl_diagnostic() {
        let backend = KubectlBackend::new(KubeConfig {
            binary: "sh".to_string(),
            ..KubeConfig::default()
        });
        let script = "exec 0<&-; echo 'Error from server (Forbidden): denied' >&2; exit 1";
        let input = vec![b' '; 4 * 1024 * 1024];

        let err = backend
            .run_checked(
                vec!["-c".to_string(), script.to_string()],
                Some(&input),
                "ConfigMap app",
            )
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_default_namespace() {
        let backend = KubectlBackend::new(KubeConfig::default());
        assert_eq!(backend.default_namespace(), None);
        assert_eq!(backend.config().binary, "kubectl");
    }
}
