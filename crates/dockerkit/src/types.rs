//! Declared docker objects and their native form.
//!
//! Each declared kind is deserialized from a manifest `spec` table (with
//! `name` added) and validated on construction. The native form handed to
//! the backend is the validated value itself.

use crate::backend::DockerBackend;
use declarative::{BoxedKind, Error, Identity, ResourceKind, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label stamped on every object this crate creates
pub const MANAGED_LABEL: &str = "io.groundwork.managed";

/// Kind names accepted by [`kind_from_spec`]
pub const KINDS: &[&str] = &[Network::KIND, Volume::KIND, Container::KIND];

/// A docker network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Network {
    pub const KIND: &'static str = "Network";

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: None,
            internal: false,
            labels: BTreeMap::new(),
        }
    }
}

/// A named docker volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Volume {
    pub const KIND: &'static str = "Volume";

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: None,
            labels: BTreeMap::new(),
        }
    }
}

/// A long-running container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Port mappings in `docker run -p` syntax ("8080:80")
    #[serde(default)]
    pub ports: Vec<String>,
    /// Mounts in `docker run -v` syntax ("data:/var/lib/data")
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub restart: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Container {
    pub const KIND: &'static str = "Container";

    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            command: Vec::new(),
            env: BTreeMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            network: None,
            restart: None,
            labels: BTreeMap::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(Error::config(format!(
                "Container {} requires an image",
                self.name
            )));
        }
        if let Some(policy) = &self.restart
            && !matches!(
                policy.split(':').next(),
                Some("no" | "always" | "unless-stopped" | "on-failure")
            )
        {
            return Err(Error::config(format!(
                "Container {} has invalid restart policy '{policy}'",
                self.name
            )));
        }
        if let Some(port) = self.ports.iter().find(|p| p.trim().is_empty()) {
            return Err(Error::config(format!(
                "Container {} has an empty port mapping '{port}'",
                self.name
            )));
        }
        Ok(())
    }
}

/// Native object handed to [`DockerBackend`] create/update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerObject {
    Network(Network),
    Volume(Volume),
    Container(Container),
}

impl DockerObject {
    pub fn identity(&self) -> Identity {
        match self {
            Self::Network(n) => Identity::new(Network::KIND, &n.name),
            Self::Volume(v) => Identity::new(Volume::KIND, &v.name),
            Self::Container(c) => Identity::new(Container::KIND, &c.name),
        }
    }
}

impl ResourceKind<DockerBackend> for Network {
    fn identity(&self) -> Identity {
        Identity::new(Self::KIND, &self.name)
    }

    fn to_native(&self, _backend: &DockerBackend) -> Result<DockerObject> {
        Ok(DockerObject::Network(self.clone()))
    }
}

impl ResourceKind<DockerBackend> for Volume {
    fn identity(&self) -> Identity {
        Identity::new(Self::KIND, &self.name)
    }

    fn to_native(&self, _backend: &DockerBackend) -> Result<DockerObject> {
        Ok(DockerObject::Volume(self.clone()))
    }
}

impl ResourceKind<DockerBackend> for Container {
    fn identity(&self) -> Identity {
        Identity::new(Self::KIND, &self.name)
    }

    fn to_native(&self, _backend: &DockerBackend) -> Result<DockerObject> {
        Ok(DockerObject::Container(self.clone()))
    }
}

/// Build a declared docker object from a manifest entry.
///
/// `spec` is the kind-specific table; `name` is merged into it. Unknown kinds,
/// unknown fields and missing required fields are configuration errors.
pub fn kind_from_spec(
    kind: &str,
    name: &str,
    spec: serde_json::Value,
) -> Result<BoxedKind<DockerBackend>> {
    match kind {
        Network::KIND => Ok(Box::new(parse::<Network>(kind, name, spec)?)),
        Volume::KIND => Ok(Box::new(parse::<Volume>(kind, name, spec)?)),
        Container::KIND => {
            let container = parse::<Container>(kind, name, spec)?;
            container.validate()?;
            Ok(Box::new(container))
        }
        other => Err(Error::config(format!(
            "unknown docker kind '{other}' (expected one of: {})",
            KINDS.join(", ")
        ))),
    }
}

fn parse<T: DeserializeOwned>(kind: &str, name: &str, spec: serde_json::Value) -> Result<T> {
    let mut table = match spec {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        _ => {
            return Err(Error::config(format!(
                "{kind} {name}: spec must be a table"
            )));
        }
    };
    table.insert("name".to_string(), serde_json::Value::String(name.to_string()));
    serde_json::from_value(serde_json::Value::Object(table))
        .map_err(|e| Error::config(format!("{kind} {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_spec_container() {
        let kind = kind_from_spec(
            "Container",
            "web",
            json!({"image": "nginx:1.27", "ports": ["8080:80"], "restart": "unless-stopped"}),
        )
        .unwrap();
        assert_eq!(kind.identity(), Identity::new("Container", "web"));
    }

    #[test]
    fn test_container_requires_image() {
        let err = kind_from_spec("Container", "web", json!({})).unwrap_err();
        assert!(err.is_config());

        let err = kind_from_spec("Container", "web", json!({"image": " "})).unwrap_err();
        assert!(err.to_string().contains("requires an image"));
    }

    #[test]
    fn test_invalid_restart_policy() {
        let err = kind_from_spec(
            "Container",
            "web",
            json!({"image": "nginx", "restart": "sometimes"}),
        )
        .unwrap_err();
        assert!(err.is_config());

        assert!(
            kind_from_spec(
                "Container",
                "web",
                json!({"image": "nginx", "restart": "on-failure:3"})
            )
            .is_ok()
        );
    }

    #[test]
    fn test_unknown_kind_and_field() {
        assert!(kind_from_spec("Pod", "x", json!({})).unwrap_err().is_config());
        let err = kind_from_spec("Volume", "data", json!({"size": "10G"})).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_spec_is_allowed_for_network() {
        let kind = kind_from_spec("Network", "backend", serde_json::Value::Null).unwrap();
        assert_eq!(kind.identity().name, "backend");
    }
}
