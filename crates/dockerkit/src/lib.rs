//! # dockerkit
//!
//! Docker backend for the `declarative` reconciliation engine.
//!
//! Networks, volumes and containers are managed through the `docker` CLI:
//! reads use `docker <type> inspect`, mutations use `create`/`run`/`rm`.
//! Failures are classified from stderr so a missing object reads as absent
//! while a daemon outage surfaces as an error.
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{BackendClient, Engine, NoStatus, Operation, Resource};
//! use dockerkit::{Container, DockerBackend, DockerConfig, Network};
//!
//! let backend = DockerBackend::new(DockerConfig::default());
//! backend.connect().expect("docker daemon not reachable");
//!
//! let mut web = Container::new("web", "nginx:1.27");
//! web.network = Some("backend".to_string());
//!
//! let mut batch = vec![
//!     Resource::new(Network::new("backend")).unwrap(),
//!     Resource::new(web).unwrap(),
//! ];
//! let report = Engine::default().apply(&mut batch, Operation::Create, &backend, &mut NoStatus);
//! println!("{}", report.summary());
//! ```

pub mod backend;
pub mod error;
pub mod types;

pub use backend::{DockerBackend, DockerConfig};
pub use types::{Container, DockerObject, KINDS, MANAGED_LABEL, Network, Volume, kind_from_spec};
