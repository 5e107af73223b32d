//! Core types for declarative resource reconciliation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of a declared object.
///
/// Identity is the declared `(kind, name)` pair, not a backend-assigned ID,
/// since the object may not exist yet. Backends whose names are scoped
/// (cluster namespaces) use the optional `namespace`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Identity {
    /// Create an unscoped identity
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Scope the identity to a namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Lifecycle operation requested for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Past participle used in status lines ("created", "updated", "deleted")
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }

    /// Whether resources run in reverse declaration order for this operation
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Outcome of one lifecycle operation on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// Object was created
    Created,
    /// Object was updated
    Updated,
    /// Object was deleted
    Deleted,
    /// Create found the object already live
    AlreadyPresent,
    /// Delete found nothing to remove
    AlreadyAbsent,
    /// A skip flag short-circuited the operation
    Skipped { operation: Operation },
    /// The backend call (or the read guarding it) failed
    Failed { operation: Operation, error: String },
}

impl Outcome {
    pub(crate) fn failed(operation: Operation, error: impl ToString) -> Self {
        Self::Failed {
            operation,
            error: error.to_string(),
        }
    }

    /// Whether the outcome counts as success for the batch
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Whether the backend state was changed
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }

    /// Diagnostic detail for failures
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Human-readable status line for a resource
    pub fn status_line(&self, identity: &Identity) -> String {
        match self {
            Self::Created => format!("{identity} created."),
            Self::Updated => format!("{identity} updated."),
            Self::Deleted => format!("{identity} deleted."),
            Self::AlreadyPresent => format!("{identity} already exists."),
            Self::AlreadyAbsent => format!("{identity} not active."),
            Self::Skipped { operation } => format!("Skipping {operation}: {}", identity.name),
            Self::Failed { operation, error } => format!(
                "{identity} could not be {}: {error}",
                operation.past_tense()
            ),
        }
    }
}

/// Action an operation would take, as computed by a read-only preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Planned {
    /// A skip flag is set
    Skip,
    /// The object would be created
    Create,
    /// The object would be updated in place
    Update,
    /// The object would be deleted
    Delete,
    /// The object is already in the requested presence state
    NoOp,
}

impl fmt::Display for Planned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// Per-resource runtime flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// Report create as successful without touching the backend
    #[serde(default)]
    pub skip_create: bool,
    /// Report update as successful without touching the backend
    #[serde(default)]
    pub skip_update: bool,
    /// Report delete as successful without touching the backend
    #[serde(default)]
    pub skip_delete: bool,
    /// Allow existence queries to be answered from the state cache
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            skip_create: false,
            skip_update: false,
            skip_delete: false,
            use_cache: true,
        }
    }
}

impl ResourceOptions {
    /// Whether the skip flag for `op` is set
    pub fn skips(&self, op: Operation) -> bool {
        match op {
            Operation::Create => self.skip_create,
            Operation::Update => self.skip_update,
            Operation::Delete => self.skip_delete,
        }
    }
}

/// Options for the engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Number of parallel jobs within one plan stage (1 = sequential)
    pub jobs: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// One resource's entry in a batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub identity: Identity,
    pub outcome: Outcome,
}

/// Aggregate outcome of applying one operation to a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub operation: Operation,
    /// Entries in execution order
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            entries: Vec::new(),
        }
    }

    /// Record one resource's outcome
    pub fn push(&mut self, identity: Identity, outcome: Outcome) {
        self.entries.push(ReportEntry { identity, outcome });
    }

    /// Identities whose operation succeeded
    pub fn succeeded(&self) -> BTreeSet<&Identity> {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_success())
            .map(|e| &e.identity)
            .collect()
    }

    /// Identities whose operation failed
    pub fn failed(&self) -> BTreeSet<&Identity> {
        self.entries
            .iter()
            .filter(|e| !e.outcome.is_success())
            .map(|e| &e.identity)
            .collect()
    }

    /// Logical AND of every outcome (an empty batch succeeds)
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    /// Number of resources attempted
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Counts per outcome kind
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in &self.entries {
            summary.add_outcome(&entry.outcome);
        }
        summary
    }

    /// Append another report's entries (same operation)
    pub fn merge(&mut self, other: BatchReport) {
        self.entries.extend(other.entries);
    }
}

/// Outcome counts for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::AlreadyPresent | Outcome::AlreadyAbsent => self.unchanged += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged, {} skipped, {} failed",
            self.created, self.updated, self.deleted, self.unchanged, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let id = Identity::new("Namespace", "phi-ns");
        assert_eq!(Outcome::Created.status_line(&id), "Namespace phi-ns created.");
        assert_eq!(
            Outcome::AlreadyPresent.status_line(&id),
            "Namespace phi-ns already exists."
        );
        assert_eq!(
            Outcome::Skipped {
                operation: Operation::Delete
            }
            .status_line(&id),
            "Skipping delete: phi-ns"
        );
        assert_eq!(
            Outcome::failed(Operation::Create, "boom").status_line(&id),
            "Namespace phi-ns could not be created: boom"
        );
    }

    #[test]
    fn test_report_aggregate_is_logical_and() {
        let mut report = BatchReport::new(Operation::Create);
        assert!(report.is_success());

        report.push(Identity::new("Volume", "a"), Outcome::Created);
        report.push(Identity::new("Volume", "b"), Outcome::failed(Operation::Create, "x"));
        report.push(Identity::new("Volume", "c"), Outcome::AlreadyPresent);

        assert!(!report.is_success());
        assert_eq!(report.succeeded().len(), 2);
        assert_eq!(report.failed().len(), 1);

        let summary = report.summary();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_changes(), 1);
    }

    #[test]
    fn test_skip_flags_per_operation() {
        let opts = ResourceOptions {
            skip_update: true,
            ..Default::default()
        };
        assert!(!opts.skips(Operation::Create));
        assert!(opts.skips(Operation::Update));
        assert!(!opts.skips(Operation::Delete));
        assert!(opts.use_cache);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::failed(Operation::Update, "gone")).unwrap();
        assert_eq!(json["result"], "failed");
        assert_eq!(json["operation"], "update");
        assert_eq!(json["error"], "gone");
    }
}
