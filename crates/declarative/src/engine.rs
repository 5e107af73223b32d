//! Reconciliation engine - applies a batch of resources against one backend
//!
//! The engine never reorders and never stops early: every resource gets
//! exactly one attempt, and the batch result is the logical AND of the
//! individual outcomes. Failures are reported, never rolled back.

use crate::backend::BackendClient;
use crate::context::StatusSink;
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{BatchReport, EngineOptions, Identity, Operation, Outcome, Planned};
use rayon::ThreadPool;
use rayon::prelude::*;

/// Result of previewing one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub identity: Identity,
    /// Planned action, or the read error that prevented planning
    pub planned: Result<Planned, String>,
}

/// Applies lifecycle operations to ordered batches
#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: EngineOptions,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Apply `op` to every resource, strictly in the given order.
    pub fn apply<B: BackendClient>(
        &self,
        resources: &mut [Resource<B>],
        op: Operation,
        backend: &B,
        sink: &mut dyn StatusSink,
    ) -> BatchReport {
        let mut report = BatchReport::new(op);
        sink.on_batch_start(op, resources.len());
        for resource in resources.iter_mut() {
            let outcome = resource.apply(op, backend);
            record(&mut report, sink, resource.identity().clone(), outcome);
        }
        sink.on_batch_complete(&report);
        log_verdict(&report, backend);
        report
    }

    /// Apply `op` to a staged plan.
    ///
    /// Stages run in declaration order, or reversed for delete. With
    /// `jobs > 1`, the resources of one stage run in parallel; their status
    /// lines are emitted once the stage completes, in stage order.
    pub fn apply_plan<B: BackendClient>(
        &self,
        plan: &mut ExecutionPlan<B>,
        op: Operation,
        backend: &B,
        sink: &mut dyn StatusSink,
    ) -> BatchReport {
        let mut report = BatchReport::new(op);
        sink.on_batch_start(op, plan.total_resources());

        let pool = self.thread_pool();
        let stages = plan.stages_mut();
        let mut order: Vec<usize> = (0..stages.len()).collect();
        if op.is_teardown() {
            order.reverse();
        }

        for index in order {
            let stage = &mut stages[index];
            match &pool {
                Some(pool) if stage.len() > 1 => {
                    let mut results = apply_parallel(pool, stage, op, backend);
                    if op.is_teardown() {
                        results.reverse();
                    }
                    for (identity, outcome) in results {
                        record(&mut report, sink, identity, outcome);
                    }
                }
                _ => {
                    let teardown = op.is_teardown();
                    let mut step = |resource: &mut Resource<B>| {
                        let outcome = resource.apply(op, backend);
                        record(&mut report, sink, resource.identity().clone(), outcome);
                    };
                    if teardown {
                        stage.iter_mut().rev().for_each(&mut step);
                    } else {
                        stage.iter_mut().for_each(&mut step);
                    }
                }
            }
        }

        sink.on_batch_complete(&report);
        log_verdict(&report, backend);
        report
    }

    /// Compute the planned action of every resource without mutating anything.
    pub fn preview_plan<B: BackendClient>(
        &self,
        plan: &mut ExecutionPlan<B>,
        op: Operation,
        backend: &B,
    ) -> Vec<PreviewEntry> {
        plan.resources_for(op)
            .into_iter()
            .map(|resource| PreviewEntry {
                identity: resource.identity().clone(),
                planned: resource.preview(op, backend).map_err(|e| e.to_string()),
            })
            .collect()
    }

    fn thread_pool(&self) -> Option<ThreadPool> {
        if self.options.jobs <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Failed to create thread pool, running sequentially: {e}");
                None
            }
        }
    }
}

fn apply_parallel<B: BackendClient>(
    pool: &ThreadPool,
    stage: &mut [Resource<B>],
    op: Operation,
    backend: &B,
) -> Vec<(Identity, Outcome)> {
    pool.install(|| {
        stage
            .par_iter_mut()
            .map(|resource| {
                let outcome = resource.apply(op, backend);
                (resource.identity().clone(), outcome)
            })
            .collect()
    })
}

fn record(
    report: &mut BatchReport,
    sink: &mut dyn StatusSink,
    identity: Identity,
    outcome: Outcome,
) {
    sink.on_resource_complete(&identity, &outcome);
    report.push(identity, outcome);
}

fn log_verdict<B: BackendClient>(report: &BatchReport, backend: &B) {
    if report.is_success() {
        log::info!(
            "{} on {}: {}",
            report.operation,
            backend.name(),
            report.summary()
        );
    } else {
        log::warn!(
            "{} on {} finished with failures: {}",
            report.operation,
            backend.name(),
            report.summary()
        );
    }
}
