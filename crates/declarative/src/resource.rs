//! Resource lifecycle
//!
//! A [`Resource`] wraps one declared object, its skip flags and its state
//! cache, and turns the four backend primitives into idempotent lifecycle
//! operations. Every operation yields exactly one [`Outcome`]; backend
//! errors never escape this boundary.

use crate::backend::{BackendClient, BoxedKind, ResourceKind};
use crate::cache::StateCache;
use crate::error::{Error, Result};
use crate::types::{Identity, Operation, Outcome, Planned, ResourceOptions};
use std::fmt;

/// A declared object managed through its lifecycle
pub struct Resource<B: BackendClient> {
    kind: BoxedKind<B>,
    identity: Identity,
    options: ResourceOptions,
    cache: StateCache<B::Live>,
}

impl<B: BackendClient> fmt::Debug for Resource<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<B: BackendClient> Resource<B> {
    /// Wrap a declared object.
    ///
    /// Fails with a configuration error when the declared identity is
    /// incomplete; no backend is contacted.
    pub fn new(kind: impl ResourceKind<B> + 'static) -> Result<Self> {
        Self::from_boxed(Box::new(kind))
    }

    /// Wrap an already boxed declared object
    pub fn from_boxed(kind: BoxedKind<B>) -> Result<Self> {
        let identity = kind.identity();
        validate_identity(&identity)?;
        Ok(Self {
            kind,
            identity,
            options: ResourceOptions::default(),
            cache: StateCache::NotRead,
        })
    }

    pub fn with_options(mut self, options: ResourceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn skip_create(mut self, skip: bool) -> Self {
        self.options.skip_create = skip;
        self
    }

    pub fn skip_update(mut self, skip: bool) -> Self {
        self.options.skip_update = skip;
        self
    }

    pub fn skip_delete(mut self, skip: bool) -> Self {
        self.options.skip_delete = skip;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.options.use_cache = use_cache;
        self
    }

    /// Declared identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    /// Last observed state
    pub fn cache(&self) -> &StateCache<B::Live> {
        &self.cache
    }

    /// Declared spec
    pub fn kind(&self) -> &dyn ResourceKind<B> {
        self.kind.as_ref()
    }

    /// Query the live object without mutating the backend.
    ///
    /// With `use_cache`, a previously observed Present/Absent answer is
    /// returned without a backend call.
    pub fn read(&mut self, backend: &B) -> Result<Option<&B::Live>> {
        if self.options.use_cache && self.cache.is_known() {
            log::debug!("{}: state cache hit", self.identity);
            return Ok(self.cache.present());
        }
        self.refresh(backend)?;
        Ok(self.cache.present())
    }

    /// Fresh existence check. Always reads the backend and updates the cache.
    pub fn is_active(&mut self, backend: &B) -> Result<bool> {
        self.refresh(backend)
    }

    /// Create the object if it does not exist.
    pub fn create(&mut self, backend: &B) -> Outcome {
        if self.options.skip_create {
            return self.skipped(Operation::Create);
        }
        if self.options.use_cache && self.cache.is_present() {
            log::debug!("{}: present in state cache", self.identity);
            return Outcome::AlreadyPresent;
        }
        match self.is_active(backend) {
            Ok(true) => {
                log::info!("{} already exists", self.identity);
                Outcome::AlreadyPresent
            }
            Ok(false) => self.issue_create(backend),
            Err(e) => self.fail(Operation::Create, e),
        }
    }

    /// Update the object, creating it when it is missing.
    pub fn update(&mut self, backend: &B) -> Outcome {
        if self.options.skip_update {
            return self.skipped(Operation::Update);
        }
        match self.is_active(backend) {
            Ok(true) => self.issue_update(backend),
            Ok(false) => {
                log::info!("{} not active, creating...", self.identity);
                if self.options.skip_create {
                    return self.skipped(Operation::Create);
                }
                self.issue_create(backend)
            }
            Err(e) => self.fail(Operation::Update, e),
        }
    }

    /// Delete the object if it exists.
    pub fn delete(&mut self, backend: &B) -> Outcome {
        if self.options.skip_delete {
            return self.skipped(Operation::Delete);
        }
        match self.is_active(backend) {
            Ok(true) => self.issue_delete(backend),
            Ok(false) => {
                log::info!("{} not active", self.identity);
                Outcome::AlreadyAbsent
            }
            Err(e) => self.fail(Operation::Delete, e),
        }
    }

    /// Run one lifecycle operation
    pub fn apply(&mut self, op: Operation, backend: &B) -> Outcome {
        match op {
            Operation::Create => self.create(backend),
            Operation::Update => self.update(backend),
            Operation::Delete => self.delete(backend),
        }
    }

    /// Compute what [`apply`](Self::apply) would do, issuing reads only.
    pub fn preview(&mut self, op: Operation, backend: &B) -> Result<Planned> {
        if self.options.skips(op) {
            return Ok(Planned::Skip);
        }
        let planned = match op {
            Operation::Create => {
                if self.options.use_cache && self.cache.is_present() {
                    Planned::NoOp
                } else if self.is_active(backend)? {
                    Planned::NoOp
                } else {
                    Planned::Create
                }
            }
            Operation::Update => {
                if self.is_active(backend)? {
                    Planned::Update
                } else if self.options.skip_create {
                    Planned::Skip
                } else {
                    Planned::Create
                }
            }
            Operation::Delete => {
                if self.is_active(backend)? {
                    Planned::Delete
                } else {
                    Planned::NoOp
                }
            }
        };
        Ok(planned)
    }

    fn refresh(&mut self, backend: &B) -> Result<bool> {
        let remote = self.kind.resolve_identity(backend)?;
        log::debug!("{}: reading {} from {}", self.identity, remote, backend.name());
        match backend.read(&remote) {
            Ok(live) => {
                let present = live.is_some();
                self.cache.set(live);
                Ok(present)
            }
            Err(e) => {
                self.cache.clear();
                Err(e)
            }
        }
    }

    /// Re-derive cached state after a successful mutation, so later cached
    /// queries see it. Only needed when queries may be served from cache.
    fn resync(&mut self, backend: &B) {
        if !self.options.use_cache {
            return;
        }
        if let Err(e) = self.refresh(backend) {
            log::debug!("{}: could not re-read after change: {e}", self.identity);
        }
    }

    fn issue_create(&mut self, backend: &B) -> Outcome {
        let native = match self.kind.to_native(backend) {
            Ok(native) => native,
            Err(e) => return self.fail(Operation::Create, e),
        };
        log::debug!("{}: create on {}", self.identity, backend.name());
        match backend.create(&native) {
            Ok(()) => {
                log::info!("{} created", self.identity);
                self.resync(backend);
                Outcome::Created
            }
            Err(e) => self.fail(Operation::Create, e),
        }
    }

    fn issue_update(&mut self, backend: &B) -> Outcome {
        let native = match self.kind.to_native(backend) {
            Ok(native) => native,
            Err(e) => return self.fail(Operation::Update, e),
        };
        log::debug!("{}: update on {}", self.identity, backend.name());
        match backend.update(&native) {
            Ok(()) => {
                log::info!("{} updated", self.identity);
                self.resync(backend);
                Outcome::Updated
            }
            Err(e) => self.fail(Operation::Update, e),
        }
    }

    fn issue_delete(&mut self, backend: &B) -> Outcome {
        let remote = match self.kind.resolve_identity(backend) {
            Ok(remote) => remote,
            Err(e) => return self.fail(Operation::Delete, e),
        };
        log::debug!("{}: delete on {}", self.identity, backend.name());
        match backend.delete(&remote) {
            Ok(()) => {
                log::info!("{} deleted", self.identity);
                self.resync(backend);
                Outcome::Deleted
            }
            Err(e) => self.fail(Operation::Delete, e),
        }
    }

    fn skipped(&self, operation: Operation) -> Outcome {
        log::info!("Skipping {operation}: {}", self.identity.name);
        Outcome::Skipped { operation }
    }

    fn fail(&self, operation: Operation, error: Error) -> Outcome {
        log::warn!("{} could not be {}: {error}", self.identity, operation.past_tense());
        Outcome::failed(operation, error)
    }
}

fn validate_identity(identity: &Identity) -> Result<()> {
    if identity.kind.trim().is_empty() {
        return Err(Error::config(format!(
            "resource '{}' has an empty kind",
            identity.name
        )));
    }
    if identity.name.trim().is_empty() {
        return Err(Error::config(format!(
            "{} resource has an empty name",
            identity.kind
        )));
    }
    if identity.name.chars().any(char::is_whitespace) {
        return Err(Error::config(format!(
            "{} name '{}' contains whitespace",
            identity.kind, identity.name
        )));
    }
    if let Some(ns) = &identity.namespace
        && ns.trim().is_empty()
    {
        return Err(Error::config(format!("{identity} has an empty namespace")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{CallKind, MemoryBackend, MemoryObject};
    use serde_json::json;

    fn namespace(name: &str) -> Resource<MemoryBackend> {
        Resource::new(MemoryObject::new("Namespace", name)).unwrap()
    }

    #[test]
    fn test_create_then_cached_create_makes_no_calls() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("phi-ns");

        assert_eq!(ns.create(&backend), Outcome::Created);
        assert_eq!(backend.count(CallKind::Create, "phi-ns"), 1);

        backend.clear_calls();
        assert_eq!(ns.create(&backend), Outcome::AlreadyPresent);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_create_on_live_object_is_success_without_create_call() {
        let id = Identity::new("Namespace", "phi-ns");
        let backend = MemoryBackend::new().with_object(id, json!({}));
        let mut ns = namespace("phi-ns");

        assert_eq!(ns.create(&backend), Outcome::AlreadyPresent);
        assert_eq!(backend.count(CallKind::Create, "phi-ns"), 0);
        assert!(ns.cache().is_present());
    }

    #[test]
    fn test_create_without_cache_always_reads() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("phi-ns").use_cache(false);

        assert_eq!(ns.create(&backend), Outcome::Created);
        assert_eq!(ns.create(&backend), Outcome::AlreadyPresent);
        assert_eq!(backend.count(CallKind::Read, "phi-ns"), 2);
        assert_eq!(backend.count(CallKind::Create, "phi-ns"), 1);
    }

    #[test]
    fn test_update_on_absent_falls_back_to_create() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("phi-ns");

        assert_eq!(ns.update(&backend), Outcome::Created);
        assert_eq!(backend.calls_of(CallKind::Create).len(), 1);
        assert!(backend.calls_of(CallKind::Update).is_empty());
    }

    #[test]
    fn test_update_fallback_honours_skip_create() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("phi-ns").skip_create(true);

        assert_eq!(
            ns.update(&backend),
            Outcome::Skipped {
                operation: Operation::Create
            }
        );
        assert!(backend.calls_of(CallKind::Create).is_empty());
    }

    #[test]
    fn test_update_on_present_updates() {
        let id = Identity::new("Namespace", "phi-ns");
        let backend = MemoryBackend::new().with_object(id, json!({"old": true}));
        let mut ns = namespace("phi-ns");

        assert_eq!(ns.update(&backend), Outcome::Updated);
        assert_eq!(backend.calls_of(CallKind::Update).len(), 1);
        assert!(backend.calls_of(CallKind::Create).is_empty());
    }

    #[test]
    fn test_update_reads_fresh_even_with_cache() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("phi-ns");
        assert_eq!(ns.create(&backend), Outcome::Created);

        // Object vanishes behind our back; update must notice and heal.
        backend.remove(&Identity::new("Namespace", "phi-ns"));
        assert_eq!(ns.update(&backend), Outcome::Created);
        assert_eq!(backend.count(CallKind::Create, "phi-ns"), 2);
    }

    #[test]
    fn test_delete_absent_is_trivial() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("phi-ns");

        assert_eq!(ns.delete(&backend), Outcome::AlreadyAbsent);
        assert!(backend.calls_of(CallKind::Delete).is_empty());
    }

    #[test]
    fn test_delete_present() {
        let id = Identity::new("Namespace", "phi-ns");
        let backend = MemoryBackend::new().with_object(id.clone(), json!({}));
        let mut ns = namespace("phi-ns");

        assert_eq!(ns.delete(&backend), Outcome::Deleted);
        assert!(!backend.contains(&id));
        assert!(ns.cache().is_absent());
    }

    #[test]
    fn test_skip_flags_make_zero_calls() {
        let id = Identity::new("Namespace", "phi-ns");
        let backend = MemoryBackend::new().with_object(id, json!({}));
        let mut ns = namespace("phi-ns")
            .skip_create(true)
            .skip_update(true)
            .skip_delete(true);

        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            assert_eq!(ns.apply(op, &backend), Outcome::Skipped { operation: op });
        }
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_read_uses_cache_only_when_enabled() {
        let backend = MemoryBackend::new();
        let mut cached = namespace("a");
        let mut uncached = namespace("b").use_cache(false);

        assert!(cached.read(&backend).unwrap().is_none());
        assert!(cached.read(&backend).unwrap().is_none());
        assert!(uncached.read(&backend).unwrap().is_none());
        assert!(uncached.read(&backend).unwrap().is_none());

        assert_eq!(backend.count(CallKind::Read, "a"), 1);
        assert_eq!(backend.count(CallKind::Read, "b"), 2);
    }

    #[test]
    fn test_is_active_bypasses_cache() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("a");
        assert!(!ns.is_active(&backend).unwrap());

        backend.insert(Identity::new("Namespace", "a"), json!({}));
        assert!(ns.is_active(&backend).unwrap());
        assert_eq!(backend.count(CallKind::Read, "a"), 2);
    }

    #[test]
    fn test_backend_failure_becomes_failed_outcome() {
        let backend = MemoryBackend::new().with_failure(CallKind::Create, "a");
        let mut ns = namespace("a");

        let outcome = ns.create(&backend);
        assert!(!outcome.is_success());
        assert!(outcome.detail().unwrap().contains("injected"));
    }

    #[test]
    fn test_read_failure_clears_cache_and_fails() {
        let backend = MemoryBackend::new().with_failure(CallKind::Read, "a");
        let mut ns = namespace("a");

        assert!(matches!(
            ns.delete(&backend),
            Outcome::Failed {
                operation: Operation::Delete,
                ..
            }
        ));
        assert!(!ns.cache().is_known());
        assert!(backend.calls_of(CallKind::Delete).is_empty());
    }

    #[test]
    fn test_preview_issues_reads_only() {
        let backend = MemoryBackend::new();
        let mut ns = namespace("a");

        assert_eq!(ns.preview(Operation::Create, &backend).unwrap(), Planned::Create);
        assert_eq!(ns.preview(Operation::Update, &backend).unwrap(), Planned::Create);
        assert_eq!(ns.preview(Operation::Delete, &backend).unwrap(), Planned::NoOp);
        assert!(
            backend
                .calls()
                .iter()
                .all(|c| c.kind == CallKind::Read)
        );
    }

    #[test]
    fn test_invalid_identity_is_config_error() {
        let empty = Resource::<MemoryBackend>::new(MemoryObject::new("Namespace", " "));
        assert!(empty.unwrap_err().is_config());

        let spaced = Resource::<MemoryBackend>::new(MemoryObject::new("Namespace", "a b"));
        assert!(spaced.unwrap_err().is_config());

        let no_kind = Resource::<MemoryBackend>::new(MemoryObject::new("", "a"));
        assert!(no_kind.unwrap_err().is_config());
    }
}
