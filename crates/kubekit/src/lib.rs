//! # kubekit
//!
//! Kubernetes backend for the `declarative` reconciliation engine, driven
//! through `kubectl`.
//!
//! Supported kinds are [`Namespace`], [`ServiceAccount`], [`ConfigMap`],
//! [`Service`], [`Deployment`] and [`RawObject`] for anything else.
//! Namespaced kinds without a declared namespace use the backend default
//! and fail with `Error::IdentityUnresolved` when there is none.

pub mod backend;
pub mod error;
pub mod types;

pub use backend::{KubeConfig, KubectlBackend};
pub use types::{
    ConfigMap, Deployment, DeploymentStrategy, IntOrString, KINDS, KubeObject, Manifest,
    Namespace, NodeSelector, NodeSelectorOperator, NodeSelectorRequirement, NodeSelectorTerm,
    RawObject, Service, ServiceAccount, ServicePort, kind_from_spec,
};
