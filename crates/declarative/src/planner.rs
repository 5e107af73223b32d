//! Execution planner - groups resources into ordered stages
//!
//! Stages encode dependency order: everything in stage 0 is applied before
//! anything in stage 1. Resources within a stage have no ordering between
//! them. Teardown runs the exact reverse of the declaration order.

use crate::backend::BackendClient;
use crate::resource::Resource;
use crate::types::{Identity, Operation};

/// Resources grouped into dependency-ordered stages
pub struct ExecutionPlan<B: BackendClient> {
    stages: Vec<Vec<Resource<B>>>,
}

impl<B: BackendClient> ExecutionPlan<B> {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Plan where every resource is its own stage, in the given order
    pub fn sequential(resources: Vec<Resource<B>>) -> Self {
        Self {
            stages: resources.into_iter().map(|r| vec![r]).collect(),
        }
    }

    /// Append a stage after all existing stages
    pub fn push_stage(&mut self, resources: Vec<Resource<B>>) {
        self.stages.push(resources);
    }

    /// Add a resource to stage `stage`, creating empty stages as needed
    pub fn add(&mut self, stage: usize, resource: Resource<B>) {
        if self.stages.len() <= stage {
            self.stages.resize_with(stage + 1, Vec::new);
        }
        self.stages[stage].push(resource);
    }

    pub fn stages(&self) -> &[Vec<Resource<B>>] {
        &self.stages
    }

    pub(crate) fn stages_mut(&mut self) -> &mut [Vec<Resource<B>>] {
        &mut self.stages
    }

    /// Identities in the order `op` would visit them
    pub fn order_for(&self, op: Operation) -> Vec<Identity> {
        let forward = self.stages.iter().flatten().map(|r| r.identity().clone());
        if op.is_teardown() {
            let mut order: Vec<Identity> = forward.collect();
            order.reverse();
            order
        } else {
            forward.collect()
        }
    }

    /// Mutable resources in the order `op` would visit them
    pub fn resources_for(&mut self, op: Operation) -> Vec<&mut Resource<B>> {
        let mut order: Vec<&mut Resource<B>> = self.stages.iter_mut().flatten().collect();
        if op.is_teardown() {
            order.reverse();
        }
        order
    }

    /// Keep only resources matching a predicate; empty stages are dropped
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Resource<B>) -> bool,
    {
        Self {
            stages: self
                .stages
                .into_iter()
                .map(|stage| stage.into_iter().filter(|r| predicate(r)).collect::<Vec<_>>())
                .filter(|stage| !stage.is_empty())
                .collect(),
        }
    }

    /// Keep only resources matching a target pattern
    ///
    /// Target format: "kind" or "kind.name" (kind is case-insensitive)
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|r| matches_target(r.identity(), &kind, name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_resources() == 0
    }
}

impl<B: BackendClient> Default for ExecutionPlan<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a target string like "kind.name" into (kind, name)
fn parse_target(target: &str) -> (String, Option<String>) {
    match target.split_once('.') {
        Some((kind, name)) => (kind.to_string(), Some(name.to_string())),
        None => (target.to_string(), None),
    }
}

fn matches_target(identity: &Identity, kind: &str, name: Option<&str>) -> bool {
    if !identity.kind.eq_ignore_ascii_case(kind) {
        return false;
    }
    name.is_none_or(|n| identity.name == n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, MemoryObject};

    fn resource(kind: &str, name: &str) -> Resource<MemoryBackend> {
        Resource::new(MemoryObject::new(kind, name)).unwrap()
    }

    fn names(order: &[Identity]) -> Vec<&str> {
        order.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("Namespace"), ("Namespace".to_string(), None));
        assert_eq!(
            parse_target("Deployment.web.v2"),
            ("Deployment".to_string(), Some("web.v2".to_string()))
        );
    }

    #[test]
    fn test_teardown_is_exact_reverse() {
        let mut plan = ExecutionPlan::new();
        plan.add(0, resource("Namespace", "ns"));
        plan.add(1, resource("ServiceAccount", "sa"));
        plan.add(1, resource("ConfigMap", "cm"));
        plan.add(2, resource("Deployment", "deploy"));

        assert_eq!(
            names(&plan.order_for(Operation::Create)),
            vec!["ns", "sa", "cm", "deploy"]
        );
        assert_eq!(
            names(&plan.order_for(Operation::Delete)),
            vec!["deploy", "cm", "sa", "ns"]
        );
        assert_eq!(plan.total_resources(), 4);
    }

    #[test]
    fn test_add_skips_ahead_creates_empty_stages() {
        let mut plan = ExecutionPlan::new();
        plan.add(2, resource("Volume", "data"));
        assert_eq!(plan.stages().len(), 3);
        assert!(plan.stages()[0].is_empty());
    }

    #[test]
    fn test_filter_by_target() {
        let plan = ExecutionPlan::sequential(vec![
            resource("Namespace", "ns"),
            resource("Deployment", "web"),
            resource("Deployment", "worker"),
        ]);

        let kind_only = plan.filter_by_target(Some("deployment"));
        assert_eq!(kind_only.total_resources(), 2);
        assert_eq!(kind_only.stages().len(), 2);

        let named = kind_only.filter_by_target(Some("Deployment.worker"));
        assert_eq!(names(&named.order_for(Operation::Create)), vec!["worker"]);
    }
}
