//! Declared cluster objects.
//!
//! Every kind renders to a complete JSON manifest (`apiVersion`, `kind`,
//! `metadata`, body) piped to `kubectl`. Namespaced kinds take their
//! namespace from the declaration, else from the backend default.

use crate::backend::KubectlBackend;
use declarative::{BoxedKind, Error, Identity, ResourceKind, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Label stamped on every object this crate renders
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "groundwork";

/// Kind names accepted by [`kind_from_spec`]
pub const KINDS: &[&str] = &[
    Namespace::KIND,
    ServiceAccount::KIND,
    ConfigMap::KIND,
    Service::KIND,
    Deployment::KIND,
    RawObject::KIND,
];

/// Native object handed to [`KubectlBackend`] create/update
#[derive(Debug, Clone, PartialEq)]
pub struct KubeObject {
    /// Resolved identity (namespace filled in)
    pub identity: Identity,
    pub manifest: Value,
}

/// Common shape of every kind this crate renders
pub trait Manifest {
    fn api_version(&self) -> &str;
    fn kind(&self) -> &str;
    fn name(&self) -> &str;
    fn namespace(&self) -> Option<&str>;
    fn labels(&self) -> &BTreeMap<String, String>;

    fn namespaced(&self) -> bool {
        true
    }

    /// Top-level fields besides `apiVersion`, `kind` and `metadata`
    fn body(&self) -> Map<String, Value>;
}

/// Namespace the object lives in, `None` for cluster-scoped kinds.
pub fn resolve_namespace<M: Manifest + ?Sized>(
    object: &M,
    backend: &KubectlBackend,
) -> Result<Option<String>> {
    if !object.namespaced() {
        return Ok(None);
    }
    match object.namespace().or(backend.default_namespace()) {
        Some(ns) => Ok(Some(ns.to_string())),
        None => Err(Error::identity_unresolved(
            format!("{} {}", object.kind(), object.name()),
            "no namespace declared and the backend has no default namespace",
        )),
    }
}

/// Render the full manifest for `object` in `namespace`.
pub fn render<M: Manifest + ?Sized>(object: &M, namespace: Option<&str>) -> Value {
    let mut labels: Map<String, Value> = object
        .labels()
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    labels.insert(
        MANAGED_BY_LABEL.to_string(),
        Value::String(MANAGED_BY.to_string()),
    );

    let mut metadata = Map::new();
    metadata.insert("name".to_string(), Value::String(object.name().to_string()));
    if let Some(ns) = namespace {
        metadata.insert("namespace".to_string(), Value::String(ns.to_string()));
    }
    metadata.insert("labels".to_string(), Value::Object(labels));

    let mut manifest = Map::new();
    manifest.insert(
        "apiVersion".to_string(),
        Value::String(object.api_version().to_string()),
    );
    manifest.insert("kind".to_string(), Value::String(object.kind().to_string()));
    manifest.insert("metadata".to_string(), Value::Object(metadata));
    manifest.extend(object.body());
    Value::Object(manifest)
}

fn declared_identity<M: Manifest + ?Sized>(object: &M) -> Identity {
    let identity = Identity::new(object.kind(), object.name());
    match object.namespace() {
        Some(ns) if object.namespaced() => identity.in_namespace(ns),
        _ => identity,
    }
}

macro_rules! kube_resource_kind {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ResourceKind<KubectlBackend> for $ty {
                fn identity(&self) -> Identity {
                    declared_identity(self)
                }

                fn resolve_identity(&self, backend: &KubectlBackend) -> Result<Identity> {
                    let identity = Identity::new(self.kind(), self.name());
                    Ok(match resolve_namespace(self, backend)? {
                        Some(ns) => identity.in_namespace(ns),
                        None => identity,
                    })
                }

                fn to_native(&self, backend: &KubectlBackend) -> Result<KubeObject> {
                    let namespace = resolve_namespace(self, backend)?;
                    let mut identity = Identity::new(self.kind(), self.name());
                    if let Some(ns) = &namespace {
                        identity = identity.in_namespace(ns.clone());
                    }
                    Ok(KubeObject {
                        identity,
                        manifest: render(self, namespace.as_deref()),
                    })
                }
            }
        )+
    };
}

kube_resource_kind!(Namespace, ServiceAccount, ConfigMap, Service, Deployment, RawObject);

// ============================================================================
// Kinds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Namespace {
    pub const KIND: &'static str = "Namespace";

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: BTreeMap::new(),
        }
    }
}

impl Manifest for Namespace {
    fn api_version(&self) -> &str {
        "v1"
    }
    fn kind(&self) -> &str {
        Self::KIND
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn namespace(&self) -> Option<&str> {
        None
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
    fn namespaced(&self) -> bool {
        false
    }
    fn body(&self) -> Map<String, Value> {
        Map::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceAccount {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub automount_token: Option<bool>,
}

impl ServiceAccount {
    pub const KIND: &'static str = "ServiceAccount";

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            labels: BTreeMap::new(),
            automount_token: None,
        }
    }

    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

impl Manifest for ServiceAccount {
    fn api_version(&self) -> &str {
        "v1"
    }
    fn kind(&self) -> &str {
        Self::KIND
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
    fn body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(automount) = self.automount_token {
            body.insert(
                "automountServiceAccountToken".to_string(),
                Value::Bool(automount),
            );
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigMap {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub const KIND: &'static str = "ConfigMap";
}

impl Manifest for ConfigMap {
    fn api_version(&self) -> &str {
        "v1"
    }
    fn kind(&self) -> &str {
        Self::KIND
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
    fn body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("data".to_string(), json!(self.data));
        body
    }
}

/// A port exposed by a [`Service`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicePort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub target_port: Option<IntOrString>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// ClusterIP, NodePort, LoadBalancer or ExternalName
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

impl Service {
    pub const KIND: &'static str = "Service";

    fn validate(&self) -> Result<()> {
        if let Some(t) = &self.service_type
            && !matches!(
                t.as_str(),
                "ClusterIP" | "NodePort" | "LoadBalancer" | "ExternalName"
            )
        {
            return Err(Error::config(format!(
                "Service {} has unknown type '{t}'",
                self.name
            )));
        }
        if self.ports.iter().any(|p| p.port == 0) {
            return Err(Error::config(format!(
                "Service {} declares port 0",
                self.name
            )));
        }
        Ok(())
    }
}

impl Manifest for Service {
    fn api_version(&self) -> &str {
        "v1"
    }
    fn kind(&self) -> &str {
        Self::KIND
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
    fn body(&self) -> Map<String, Value> {
        let ports: Vec<Value> = self
            .ports
            .iter()
            .map(|p| {
                let mut port = Map::new();
                if let Some(name) = &p.name {
                    port.insert("name".to_string(), json!(name));
                }
                port.insert("port".to_string(), json!(p.port));
                if let Some(target) = &p.target_port {
                    port.insert("targetPort".to_string(), target.to_json());
                }
                if let Some(protocol) = &p.protocol {
                    port.insert("protocol".to_string(), json!(protocol));
                }
                Value::Object(port)
            })
            .collect();

        let mut spec = Map::new();
        if let Some(t) = &self.service_type {
            spec.insert("type".to_string(), json!(t));
        }
        spec.insert("selector".to_string(), json!(self.selector));
        spec.insert("ports".to_string(), Value::Array(ports));

        let mut body = Map::new();
        body.insert("spec".to_string(), Value::Object(spec));
        body
    }
}

/// A Kubernetes int-or-string value ("25%" or 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i64),
    String(String),
}

impl IntOrString {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(n) => json!(n),
            Self::String(s) => json!(s),
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Self::Int(n) => *n == 0,
            Self::String(s) => s.trim_end_matches('%').parse::<u32>() == Ok(0),
        }
    }

    /// Non-negative integer, or a non-negative percentage
    fn is_valid_quantity(&self) -> bool {
        match self {
            Self::Int(n) => *n >= 0,
            Self::String(s) => s
                .strip_suffix('%')
                .is_some_and(|pct| pct.parse::<u32>().is_ok()),
        }
    }
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// How a [`Deployment`] replaces its pods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeploymentStrategy {
    RollingUpdate {
        #[serde(default)]
        max_surge: Option<IntOrString>,
        #[serde(default)]
        max_unavailable: Option<IntOrString>,
    },
    Recreate,
}

impl DeploymentStrategy {
    fn validate(&self, owner: &str) -> Result<()> {
        let Self::RollingUpdate {
            max_surge,
            max_unavailable,
        } = self
        else {
            return Ok(());
        };
        for (field, value) in [("max_surge", max_surge), ("max_unavailable", max_unavailable)] {
            if let Some(v) = value
                && !v.is_valid_quantity()
            {
                return Err(Error::config(format!(
                    "{owner}: {field} must be a non-negative integer or percentage, got '{v}'"
                )));
            }
        }
        if let (Some(surge), Some(unavailable)) = (max_surge, max_unavailable)
            && surge.is_zero()
            && unavailable.is_zero()
        {
            return Err(Error::config(format!(
                "{owner}: max_surge and max_unavailable cannot both be zero"
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Recreate => json!({"type": "Recreate"}),
            Self::RollingUpdate {
                max_surge,
                max_unavailable,
            } => {
                let mut rolling = Map::new();
                if let Some(v) = max_surge {
                    rolling.insert("maxSurge".to_string(), v.to_json());
                }
                if let Some(v) = max_unavailable {
                    rolling.insert("maxUnavailable".to_string(), v.to_json());
                }
                json!({"type": "RollingUpdate", "rollingUpdate": rolling})
            }
        }
    }
}

/// Relationship between a node label and a requirement's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Gt,
    Lt,
}

impl NodeSelectorOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Exists => "Exists",
            Self::DoesNotExist => "DoesNotExist",
            Self::Gt => "Gt",
            Self::Lt => "Lt",
        }
    }
}

impl fmt::Display for NodeSelectorOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One label (or field) constraint of a [`NodeSelectorTerm`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSelectorRequirement {
    pub key: String,
    pub operator: NodeSelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

impl NodeSelectorRequirement {
    fn validate(&self, owner: &str) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::config(format!(
                "{owner}: node selector requirement has an empty key"
            )));
        }
        let problem = match self.operator {
            NodeSelectorOperator::In | NodeSelectorOperator::NotIn if self.values.is_empty() => {
                Some("requires at least one value")
            }
            NodeSelectorOperator::Exists | NodeSelectorOperator::DoesNotExist
                if !self.values.is_empty() =>
            {
                Some("takes no values")
            }
            NodeSelectorOperator::Gt | NodeSelectorOperator::Lt
                if self.values.len() != 1 || self.values[0].trim().parse::<i64>().is_err() =>
            {
                Some("requires exactly one integer value")
            }
            _ => None,
        };
        match problem {
            Some(problem) => Err(Error::config(format!(
                "{owner}: operator {} on '{}' {problem}",
                self.operator, self.key
            ))),
            None => Ok(()),
        }
    }

    fn to_json(&self) -> Value {
        let mut requirement = Map::new();
        requirement.insert("key".to_string(), json!(self.key));
        requirement.insert("operator".to_string(), json!(self.operator.as_str()));
        if !self.values.is_empty() {
            requirement.insert("values".to_string(), json!(self.values));
        }
        Value::Object(requirement)
    }
}

/// Requirements that must all hold for a node to match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSelectorTerm {
    /// Requirements on node labels
    #[serde(default)]
    pub match_expressions: Vec<NodeSelectorRequirement>,
    /// Requirements on node fields
    #[serde(default)]
    pub match_fields: Vec<NodeSelectorRequirement>,
}

impl NodeSelectorTerm {
    fn to_json(&self) -> Value {
        let render = |reqs: &[NodeSelectorRequirement]| -> Value {
            Value::Array(reqs.iter().map(NodeSelectorRequirement::to_json).collect())
        };
        let mut term = Map::new();
        if !self.match_expressions.is_empty() {
            term.insert("matchExpressions".to_string(), render(&self.match_expressions));
        }
        if !self.match_fields.is_empty() {
            term.insert("matchFields".to_string(), render(&self.match_fields));
        }
        Value::Object(term)
    }
}

/// Hard node constraint; a node matches when any term matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSelector {
    pub node_selector_terms: Vec<NodeSelectorTerm>,
}

impl NodeSelector {
    fn validate(&self, owner: &str) -> Result<()> {
        if self.node_selector_terms.is_empty() {
            return Err(Error::config(format!(
                "{owner}: node_affinity requires at least one node selector term"
            )));
        }
        for term in &self.node_selector_terms {
            if term.match_expressions.is_empty() && term.match_fields.is_empty() {
                return Err(Error::config(format!(
                    "{owner}: node selector term has no requirements"
                )));
            }
            for requirement in term.match_expressions.iter().chain(&term.match_fields) {
                requirement.validate(owner)?;
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let terms: Vec<Value> = self
            .node_selector_terms
            .iter()
            .map(NodeSelectorTerm::to_json)
            .collect();
        json!({"nodeSelectorTerms": terms})
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deployment {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub image: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Container ports
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default)]
    pub strategy: Option<DeploymentStrategy>,
    /// Nodes the pods may be scheduled on
    #[serde(default)]
    pub node_affinity: Option<NodeSelector>,
}

fn default_replicas() -> u32 {
    1
}

impl Deployment {
    pub const KIND: &'static str = "Deployment";

    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            labels: BTreeMap::new(),
            image: image.to_string(),
            replicas: default_replicas(),
            command: Vec::new(),
            env: BTreeMap::new(),
            ports: Vec::new(),
            service_account: None,
            strategy: None,
            node_affinity: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(Error::config(format!(
                "Deployment {} requires an image",
                self.name
            )));
        }
        if let Some(strategy) = &self.strategy {
            strategy.validate(&format!("Deployment {}", self.name))?;
        }
        if let Some(selector) = &self.node_affinity {
            selector.validate(&format!("Deployment {}", self.name))?;
        }
        Ok(())
    }
}

impl Manifest for Deployment {
    fn api_version(&self) -> &str {
        "apps/v1"
    }
    fn kind(&self) -> &str {
        Self::KIND
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
    fn body(&self) -> Map<String, Value> {
        let selector = json!({"app": self.name});
        let mut pod_labels = self.labels.clone();
        pod_labels.insert("app".to_string(), self.name.clone());

        let mut container = Map::new();
        container.insert("name".to_string(), json!(self.name));
        container.insert("image".to_string(), json!(self.image));
        if !self.command.is_empty() {
            container.insert("command".to_string(), json!(self.command));
        }
        if !self.env.is_empty() {
            let env: Vec<Value> = self
                .env
                .iter()
                .map(|(k, v)| json!({"name": k, "value": v}))
                .collect();
            container.insert("env".to_string(), Value::Array(env));
        }
        if !self.ports.is_empty() {
            let ports: Vec<Value> = self
                .ports
                .iter()
                .map(|p| json!({"containerPort": p}))
                .collect();
            container.insert("ports".to_string(), Value::Array(ports));
        }

        let mut pod_spec = Map::new();
        if let Some(sa) = &self.service_account {
            pod_spec.insert("serviceAccountName".to_string(), json!(sa));
        }
        if let Some(selector) = &self.node_affinity {
            pod_spec.insert(
                "affinity".to_string(),
                json!({"nodeAffinity": {
                    "requiredDuringSchedulingIgnoredDuringExecution": selector.to_json()
                }}),
            );
        }
        pod_spec.insert("containers".to_string(), json!([container]));

        let mut spec = Map::new();
        spec.insert("replicas".to_string(), json!(self.replicas));
        spec.insert("selector".to_string(), json!({"matchLabels": selector}));
        if let Some(strategy) = &self.strategy {
            spec.insert("strategy".to_string(), strategy.to_json());
        }
        spec.insert(
            "template".to_string(),
            json!({"metadata": {"labels": pod_labels}, "spec": pod_spec}),
        );

        let mut body = Map::new();
        body.insert("spec".to_string(), Value::Object(spec));
        body
    }
}

/// Any object given as raw manifest fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawObject {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub api_version: String,
    /// Kind of the rendered object (e.g. "Secret")
    pub kind: String,
    #[serde(default = "default_namespaced")]
    pub namespaced: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Map<String, Value>,
}

fn default_namespaced() -> bool {
    true
}

impl RawObject {
    /// Manifest kind selecting this type
    pub const KIND: &'static str = "Object";

    fn validate(&self) -> Result<()> {
        if self.api_version.trim().is_empty() || self.kind.trim().is_empty() {
            return Err(Error::config(format!(
                "Object {} requires api_version and kind",
                self.name
            )));
        }
        if let Some(key) = ["apiVersion", "kind", "metadata"]
            .into_iter()
            .find(|key| self.body.contains_key(*key))
        {
            return Err(Error::config(format!(
                "Object {}: body must not set '{key}'",
                self.name
            )));
        }
        if !self.namespaced && self.namespace.is_some() {
            return Err(Error::config(format!(
                "Object {} is cluster-scoped but declares a namespace",
                self.name
            )));
        }
        Ok(())
    }
}

impl Manifest for RawObject {
    fn api_version(&self) -> &str {
        &self.api_version
    }
    fn kind(&self) -> &str {
        &self.kind
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
    fn namespaced(&self) -> bool {
        self.namespaced
    }
    fn body(&self) -> Map<String, Value> {
        self.body.clone()
    }
}

// ============================================================================
// Manifest entries
// ============================================================================

/// Build a declared cluster object from a manifest entry.
///
/// `name` and `namespace` are merged into the kind-specific `spec` table.
pub fn kind_from_spec(
    kind: &str,
    name: &str,
    namespace: Option<&str>,
    spec: Value,
) -> Result<BoxedKind<KubectlBackend>> {
    match kind {
        Namespace::KIND => {
            if namespace.is_some() {
                return Err(Error::config(format!(
                    "Namespace {name} is cluster-scoped and cannot declare a namespace"
                )));
            }
            Ok(Box::new(parse::<Namespace>(kind, name, None, spec)?))
        }
        ServiceAccount::KIND => Ok(Box::new(parse::<ServiceAccount>(
            kind, name, namespace, spec,
        )?)),
        ConfigMap::KIND => Ok(Box::new(parse::<ConfigMap>(kind, name, namespace, spec)?)),
        Service::KIND => {
            let service = parse::<Service>(kind, name, namespace, spec)?;
            service.validate()?;
            Ok(Box::new(service))
        }
        Deployment::KIND => {
            let deployment = parse::<Deployment>(kind, name, namespace, spec)?;
            deployment.validate()?;
            Ok(Box::new(deployment))
        }
        RawObject::KIND => {
            let object = parse::<RawObject>(kind, name, namespace, spec)?;
            object.validate()?;
            Ok(Box::new(object))
        }
        other => Err(Error::config(format!(
            "unknown kubernetes kind '{other}' (expected one of: {})",
            KINDS.join(", ")
        ))),
    }
}

fn parse<T: DeserializeOwned>(
    kind: &str,
    name: &str,
    namespace: Option<&str>,
    spec: Value,
) -> Result<T> {
    let mut table = match spec {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => {
            return Err(Error::config(format!(
                "{kind} {name}: spec must be a table"
            )));
        }
    };
    table.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(ns) = namespace {
        table.insert("namespace".to_string(), Value::String(ns.to_string()));
    }
    serde_json::from_value(Value::Object(table))
        .map_err(|e| Error::config(format!("{kind} {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KubeConfig;

    fn backend(default_ns: Option<&str>) -> KubectlBackend {
        KubectlBackend::new(KubeConfig {
            namespace: default_ns.map(str::to_string),
            ..KubeConfig::default()
        })
    }

    #[test]
    fn test_service_account_uses_default_namespace() {
        let sa = ServiceAccount::new("phi-sa");
        let native = sa.to_native(&backend(Some("phi-ns"))).unwrap();

        assert_eq!(native.identity.namespace.as_deref(), Some("phi-ns"));
        assert_eq!(native.manifest["metadata"]["namespace"], "phi-ns");
        assert_eq!(native.manifest["apiVersion"], "v1");
        assert_eq!(
            native.manifest["metadata"]["labels"][MANAGED_BY_LABEL],
            MANAGED_BY
        );
    }

    #[test]
    fn test_declared_namespace_wins() {
        let sa = ServiceAccount::new("phi-sa").in_namespace("team-a");
        let identity = sa.resolve_identity(&backend(Some("phi-ns"))).unwrap();
        assert_eq!(identity.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_unresolved_namespace() {
        let sa = ServiceAccount::new("phi-sa");
        let err = sa.resolve_identity(&backend(None)).unwrap_err();
        assert!(matches!(err, Error::IdentityUnresolved { .. }));
        assert!(sa.to_native(&backend(None)).is_err());
    }

    #[test]
    fn test_namespace_is_cluster_scoped() {
        let ns = Namespace::new("phi-ns");
        let native = ns.to_native(&backend(Some("default"))).unwrap();
        assert_eq!(native.identity.namespace, None);
        assert!(native.manifest["metadata"].get("namespace").is_none());

        let err = kind_from_spec("Namespace", "phi-ns", Some("default"), Value::Null).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_deployment_manifest() {
        let spec = json!({
            "image": "nginx:1.27",
            "replicas": 3,
            "ports": [80],
            "env": {"MODE": "prod"},
            "service_account": "phi-sa",
            "strategy": {"type": "RollingUpdate", "max_surge": "25%", "max_unavailable": 0},
        });
        let kind = kind_from_spec("Deployment", "web", Some("phi-ns"), spec).unwrap();
        let native = kind.to_native(&backend(None)).unwrap();
        let spec = &native.manifest["spec"];

        assert_eq!(native.manifest["apiVersion"], "apps/v1");
        assert_eq!(spec["replicas"], 3);
        assert_eq!(spec["selector"]["matchLabels"]["app"], "web");
        assert_eq!(spec["strategy"]["rollingUpdate"]["maxSurge"], "25%");
        assert_eq!(spec["strategy"]["rollingUpdate"]["maxUnavailable"], 0);
        let pod = &spec["template"]["spec"];
        assert_eq!(pod["serviceAccountName"], "phi-sa");
        assert_eq!(pod["containers"][0]["env"][0]["name"], "MODE");
        assert_eq!(pod["containers"][0]["ports"][0]["containerPort"], 80);
    }

    #[test]
    fn test_recreate_strategy() {
        let spec = json!({"image": "nginx", "strategy": {"type": "Recreate"}});
        let kind = kind_from_spec("Deployment", "web", Some("phi-ns"), spec).unwrap();
        let native = kind.to_native(&backend(None)).unwrap();
        assert_eq!(native.manifest["spec"]["strategy"], json!({"type": "Recreate"}));
    }

    #[test]
    fn test_deployment_node_affinity() {
        let spec = json!({
            "image": "nginx",
            "node_affinity": {"node_selector_terms": [
                {"match_expressions": [
                    {"key": "disktype", "operator": "In", "values": ["ssd", "nvme"]},
                    {"key": "gpu", "operator": "DoesNotExist"},
                ]},
                {"match_fields": [
                    {"key": "metadata.name", "operator": "NotIn", "values": ["node-1"]},
                ]},
            ]},
        });
        let kind = kind_from_spec("Deployment", "web", Some("phi-ns"), spec).unwrap();
        let native = kind.to_native(&backend(None)).unwrap();
        let required = &native.manifest["spec"]["template"]["spec"]["affinity"]["nodeAffinity"]
            ["requiredDuringSchedulingIgnoredDuringExecution"];

        let terms = required["nodeSelectorTerms"].as_array().unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(
            terms[0]["matchExpressions"][0],
            json!({"key": "disktype", "operator": "In", "values": ["ssd", "nvme"]})
        );
        assert_eq!(
            terms[0]["matchExpressions"][1],
            json!({"key": "gpu", "operator": "DoesNotExist"})
        );
        assert!(terms[0].get("matchFields").is_none());
        assert_eq!(terms[1]["matchFields"][0]["operator"], "NotIn");
    }

    #[test]
    fn test_deployment_without_affinity() {
        let kind = kind_from_spec("Deployment", "web", Some("phi-ns"), json!({"image": "nginx"}))
            .unwrap();
        let native = kind.to_native(&backend(None)).unwrap();
        assert!(native.manifest["spec"]["template"]["spec"].get("affinity").is_none());
    }

    fn affinity_error(requirement: Value) -> Option<String> {
        let spec = json!({
            "image": "nginx",
            "node_affinity": {"node_selector_terms": [{"match_expressions": [requirement]}]},
        });
        match kind_from_spec("Deployment", "web", None, spec) {
            Ok(_) => None,
            Err(e) => {
                assert!(e.is_config());
                Some(e.to_string())
            }
        }
    }

    #[test]
    fn test_node_selector_operator_values() {
        let in_empty = affinity_error(json!({"key": "zone", "operator": "In"}));
        assert!(in_empty.unwrap().contains("at least one value"));
        assert!(affinity_error(json!({"key": "zone", "operator": "NotIn", "values": []})).is_some());

        let exists = affinity_error(json!({"key": "gpu", "operator": "Exists", "values": ["x"]}));
        assert!(exists.unwrap().contains("takes no values"));
        assert!(affinity_error(json!({"key": "gpu", "operator": "DoesNotExist", "values": ["x"]})).is_some());
        assert!(affinity_error(json!({"key": "gpu", "operator": "Exists"})).is_none());

        let gt_word = affinity_error(json!({"key": "cores", "operator": "Gt", "values": ["many"]}));
        assert!(gt_word.unwrap().contains("exactly one integer"));
        assert!(affinity_error(json!({"key": "cores", "operator": "Lt", "values": ["4", "8"]})).is_some());
        assert!(affinity_error(json!({"key": "cores", "operator": "Lt"})).is_some());
        assert!(affinity_error(json!({"key": "cores", "operator": "Gt", "values": ["4"]})).is_none());

        assert!(affinity_error(json!({"key": " ", "operator": "Exists"})).is_some());
    }

    #[test]
    fn test_node_selector_shape() {
        let no_terms = json!({"image": "nginx", "node_affinity": {"node_selector_terms": []}});
        assert!(kind_from_spec("Deployment", "web", None, no_terms).unwrap_err().is_config());

        let empty_term = json!({"image": "nginx", "node_affinity": {"node_selector_terms": [{}]}});
        assert!(kind_from_spec("Deployment", "web", None, empty_term).unwrap_err().is_config());

        let bad_operator = json!({
            "image": "nginx",
            "node_affinity": {"node_selector_terms": [
                {"match_expressions": [{"key": "zone", "operator": "Near"}]},
            ]},
        });
        assert!(kind_from_spec("Deployment", "web", None, bad_operator).is_err());
    }

    #[test]
    fn test_invalid_strategy() {
        let both_zero = json!({
            "image": "nginx",
            "strategy": {"type": "RollingUpdate", "max_surge": 0, "max_unavailable": "0%"},
        });
        let err = kind_from_spec("Deployment", "web", None, both_zero).unwrap_err();
        assert!(err.to_string().contains("cannot both be zero"));

        let bad_pct = json!({
            "image": "nginx",
            "strategy": {"type": "RollingUpdate", "max_surge": "lots"},
        });
        assert!(kind_from_spec("Deployment", "web", None, bad_pct).unwrap_err().is_config());
    }

    #[test]
    fn test_service_manifest() {
        let spec = json!({
            "type": "ClusterIP",
            "selector": {"app": "web"},
            "ports": [{"port": 80, "target_port": "http"}],
        });
        let kind = kind_from_spec("Service", "web", Some("phi-ns"), spec).unwrap();
        let native = kind.to_native(&backend(None)).unwrap();
        assert_eq!(native.manifest["spec"]["ports"][0]["targetPort"], "http");

        let bad = json!({"type": "Magic"});
        assert!(kind_from_spec("Service", "web", None, bad).is_err());
    }

    #[test]
    fn test_raw_object() {
        let spec = json!({
            "api_version": "v1",
            "kind": "Secret",
            "body": {"type": "Opaque", "stringData": {"token": "abc"}},
        });
        let kind = kind_from_spec("Object", "creds", Some("phi-ns"), spec).unwrap();
        assert_eq!(kind.identity(), Identity::new("Secret", "creds").in_namespace("phi-ns"));

        let native = kind.to_native(&backend(None)).unwrap();
        assert_eq!(native.manifest["type"], "Opaque");
        assert_eq!(native.manifest["kind"], "Secret");

        let clobber = json!({"api_version": "v1", "kind": "Secret", "body": {"metadata": {}}});
        assert!(kind_from_spec("Object", "creds", None, clobber).is_err());
    }

    #[test]
    fn test_unknown_kind() {
        let err = kind_from_spec("Pod", "x", None, Value::Null).unwrap_err();
        assert!(err.to_string().contains("expected one of"));
    }
}
