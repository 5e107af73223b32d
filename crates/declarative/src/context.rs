//! Status reporting for batch runs
//!
//! The engine reports through a [`StatusSink`] so the crate carries no
//! dependency on a terminal UI. Sink methods return nothing: a sink that
//! cannot write must swallow the failure, and nothing it does can change
//! an outcome.

use crate::types::{BatchReport, Identity, Operation, Outcome};

/// Receives status updates during a batch
pub trait StatusSink: Send {
    /// Called before the first resource of a batch
    fn on_batch_start(&mut self, operation: Operation, count: usize);

    /// Called once per resource, in execution order
    fn on_resource_complete(&mut self, identity: &Identity, outcome: &Outcome);

    /// Called after the last resource of a batch
    fn on_batch_complete(&mut self, report: &BatchReport);
}

/// Sink that discards everything
pub struct NoStatus;

impl StatusSink for NoStatus {
    fn on_batch_start(&mut self, _operation: Operation, _count: usize) {}
    fn on_resource_complete(&mut self, _identity: &Identity, _outcome: &Outcome) {}
    fn on_batch_complete(&mut self, _report: &BatchReport) {}
}

/// Sink that keeps the status lines it receives
#[derive(Debug, Default)]
pub struct CollectStatus {
    pub lines: Vec<String>,
}

impl StatusSink for CollectStatus {
    fn on_batch_start(&mut self, operation: Operation, count: usize) {
        self.lines.push(format!("{operation}: {count} resources"));
    }

    fn on_resource_complete(&mut self, identity: &Identity, outcome: &Outcome) {
        self.lines.push(outcome.status_line(identity));
    }

    fn on_batch_complete(&mut self, report: &BatchReport) {
        let verdict = if report.is_success() { "ok" } else { "failed" };
        self.lines
            .push(format!("{}: {verdict} ({})", report.operation, report.summary()));
    }
}
