//! # Declarative
//!
//! A framework for declarative resource reconciliation.
//!
//! This crate provides the lifecycle contract used to converge live
//! infrastructure toward a declared state: read the current state, compare
//! it to what is declared, and idempotently create, update or delete.
//!
//! ## Core Concepts
//!
//! - **BackendClient**: A control plane exposing read/create/update/delete primitives
//! - **ResourceKind**: A declared object, mapped to the backend's native form
//! - **Resource**: A declared object plus skip flags and a tri-state [`StateCache`]
//! - **Engine**: Applies an ordered batch and reports every outcome
//!
//! ## Example
//!
//! ```
//! use declarative::{Engine, NoStatus, Operation, Resource};
//! use declarative::backend::memory::{MemoryBackend, MemoryObject};
//!
//! let backend = MemoryBackend::new();
//! let mut batch = vec![
//!     Resource::new(MemoryObject::new("Namespace", "phi-ns")).unwrap(),
//!     Resource::new(MemoryObject::new("ServiceAccount", "phi-sa")).unwrap(),
//! ];
//!
//! let report = Engine::default().apply(&mut batch, Operation::Create, &backend, &mut NoStatus);
//! assert!(report.is_success());
//!
//! // Re-applying converges to the same state without errors.
//! let again = Engine::default().apply(&mut batch, Operation::Create, &backend, &mut NoStatus);
//! assert_eq!(again.summary().unchanged, 2);
//! ```
//!
//! ## Failure model
//!
//! Backend failures are converted to [`Outcome::Failed`] at the resource
//! boundary and never abort a batch. Configuration errors (an incomplete
//! declared identity) are returned from [`Resource::new`] before any backend
//! is contacted. There is no rollback across a batch.

pub mod backend;
pub mod cache;
pub mod context;
pub mod engine;
pub mod error;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod types;

// Re-export main types at crate root
pub use backend::{BackendClient, BoxedKind, ResourceKind};
pub use cache::StateCache;
pub use context::{CollectStatus, NoStatus, StatusSink};
pub use engine::{Engine, PreviewEntry};
pub use error::{Error, ErrorCategory, Result};
pub use planner::ExecutionPlan;
pub use resource::Resource;
pub use retry::{RetryConfig, with_retry};
pub use types::{
    BatchReport, EngineOptions, Identity, Operation, Outcome, Planned, ReportEntry,
    ResourceOptions, Summary,
};
