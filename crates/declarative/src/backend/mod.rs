//! Backend abstraction for infrastructure control planes.
//!
//! The [`BackendClient`] trait is the whole contract the engine needs from a
//! control plane: connect, read, create, update, delete. [`ResourceKind`] is
//! implemented once per (kind, backend) pair and maps a declared spec onto
//! the backend's native object.

pub mod memory;

use crate::error::Result;
use crate::types::Identity;
use std::fmt;

/// Connection to one infrastructure control plane.
///
/// Implementations are shared by reference across every resource in an
/// engine run, so they must be `Send + Sync`. Primitives are blocking.
pub trait BackendClient: Send + Sync {
    /// Native object representation accepted by create/update
    type Native: fmt::Debug + Send;

    /// Live object representation returned by read
    type Live: fmt::Debug + Send + Sync;

    /// Short backend name used in logs and errors (e.g. "docker")
    fn name(&self) -> &str;

    /// Verify the control plane is reachable and credentials work.
    fn connect(&self) -> Result<()>;

    /// Read the live object. `Ok(None)` means the object does not exist.
    fn read(&self, identity: &Identity) -> Result<Option<Self::Live>>;

    /// Create an object that is known not to exist.
    fn create(&self, native: &Self::Native) -> Result<()>;

    /// Update an object that is known to exist.
    fn update(&self, native: &Self::Native) -> Result<()>;

    /// Delete an object that is known to exist.
    fn delete(&self, identity: &Identity) -> Result<()>;
}

/// Declared desired state of one object on backend `B`.
pub trait ResourceKind<B: BackendClient>: Send + fmt::Debug {
    /// Declared identity of the object
    fn identity(&self) -> Identity;

    /// Map the declared spec to the backend's native object.
    ///
    /// Must be deterministic. May consult the backend for context (such as a
    /// default namespace) and fail with `Error::IdentityUnresolved` when that
    /// context is missing.
    fn to_native(&self, backend: &B) -> Result<B::Native>;

    /// Resolve the identity used to address the object on `backend`.
    ///
    /// Defaults to the declared identity.
    fn resolve_identity(&self, _backend: &B) -> Result<Identity> {
        Ok(self.identity())
    }
}

/// A boxed kind for type-erased storage
pub type BoxedKind<B> = Box<dyn ResourceKind<B>>;
