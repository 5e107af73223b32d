//! In-process backend that keeps objects in memory.
//!
//! Every primitive call is recorded in order, and individual calls can be
//! made to fail, which makes the backend suitable for exercising the
//! reconciliation contract without a real control plane.

use crate::backend::{BackendClient, ResourceKind};
use crate::error::{Error, ErrorCategory, Result};
use crate::types::Identity;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Primitive invoked on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Read,
    Create,
    Update,
    Delete,
}

/// One recorded primitive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub identity: Identity,
}

/// Declared object for the memory backend; also its native form
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryObject {
    pub identity: Identity,
    pub body: Value,
}

impl MemoryObject {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            identity: Identity::new(kind, name),
            body: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

impl ResourceKind<MemoryBackend> for MemoryObject {
    fn identity(&self) -> Identity {
        self.identity.clone()
    }

    fn to_native(&self, _backend: &MemoryBackend) -> Result<MemoryObject> {
        Ok(self.clone())
    }
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<Identity, Value>,
    calls: Vec<Call>,
    failures: HashSet<(CallKind, String)>,
}

/// Backend storing objects in a map
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as already live
    pub fn with_object(self, identity: Identity, body: Value) -> Self {
        self.insert(identity, body);
        self
    }

    /// Make every call of `kind` against objects named `name` fail
    pub fn with_failure(self, kind: CallKind, name: &str) -> Self {
        self.lock().failures.insert((kind, name.to_string()));
        self
    }

    /// Put an object in place without recording a call (external change)
    pub fn insert(&self, identity: Identity, body: Value) {
        self.lock().objects.insert(identity, body);
    }

    /// Remove an object without recording a call (external drift)
    pub fn remove(&self, identity: &Identity) -> Option<Value> {
        self.lock().objects.remove(identity)
    }

    /// Whether an object is currently stored
    pub fn contains(&self, identity: &Identity) -> bool {
        self.lock().objects.contains_key(identity)
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Recorded calls of one primitive, in order
    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of recorded calls of `kind` against objects named `name`
    pub fn count(&self, kind: CallKind, name: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind && c.identity.name == name)
            .count()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, kind: CallKind, identity: &Identity) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(Call {
            kind,
            identity: identity.clone(),
        });
        if inner.failures.contains(&(kind, identity.name.clone())) {
            return Err(Error::backend(
                "memory",
                ErrorCategory::Transient,
                format!("injected {kind:?} failure for {identity}"),
            ));
        }
        Ok(inner)
    }
}

impl BackendClient for MemoryBackend {
    type Native = MemoryObject;
    type Live = Value;

    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn read(&self, identity: &Identity) -> Result<Option<Value>> {
        let inner = self.record(CallKind::Read, identity)?;
        Ok(inner.objects.get(identity).cloned())
    }

    fn create(&self, native: &MemoryObject) -> Result<()> {
        let mut inner = self.record(CallKind::Create, &native.identity)?;
        if inner.objects.contains_key(&native.identity) {
            return Err(Error::backend(
                "memory",
                ErrorCategory::Conflict,
                format!("{} already exists", native.identity),
            ));
        }
        inner
            .objects
            .insert(native.identity.clone(), native.body.clone());
        Ok(())
    }

    fn update(&self, native: &MemoryObject) -> Result<()> {
        let mut inner = self.record(CallKind::Update, &native.identity)?;
        match inner.objects.get_mut(&native.identity) {
            Some(body) => {
                *body = native.body.clone();
                Ok(())
            }
            None => Err(Error::backend(
                "memory",
                ErrorCategory::NotFound,
                format!("{} not found", native.identity),
            )),
        }
    }

    fn delete(&self, identity: &Identity) -> Result<()> {
        let mut inner = self.record(CallKind::Delete, identity)?;
        match inner.objects.remove(identity) {
            Some(_) => Ok(()),
            None => Err(Error::backend(
                "memory",
                ErrorCategory::NotFound,
                format!("{identity} not found"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitives_record_calls_in_order() {
        let backend = MemoryBackend::new();
        let obj = MemoryObject::new("Volume", "data").with_body(json!({"driver": "local"}));

        assert!(backend.read(&obj.identity).unwrap().is_none());
        backend.create(&obj).unwrap();
        assert_eq!(
            backend.read(&obj.identity).unwrap(),
            Some(json!({"driver": "local"}))
        );
        backend.delete(&obj.identity).unwrap();

        let kinds: Vec<CallKind> = backend.calls().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CallKind::Read,
                CallKind::Create,
                CallKind::Read,
                CallKind::Delete
            ]
        );
    }

    #[test]
    fn test_injected_failure_is_recorded_and_transient() {
        let backend = MemoryBackend::new().with_failure(CallKind::Create, "a");
        let err = backend.create(&MemoryObject::new("Volume", "a")).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(backend.count(CallKind::Create, "a"), 1);
        assert!(!backend.contains(&Identity::new("Volume", "a")));
    }

    #[test]
    fn test_create_existing_conflicts() {
        let id = Identity::new("Volume", "a");
        let backend = MemoryBackend::new().with_object(id.clone(), Value::Null);
        let err = backend.create(&MemoryObject::new("Volume", "a")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_external_changes_are_not_recorded() {
        let id = Identity::new("Volume", "a");
        let backend = MemoryBackend::new();
        backend.insert(id.clone(), Value::Null);
        backend.remove(&id);
        assert!(backend.calls().is_empty());
    }
}
