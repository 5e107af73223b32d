//! `up`, `patch` and `down`

use super::Session;
use crate::Context;
use crate::cli::{DownArgs, RunArgs};
use crate::ui;
use anyhow::{Context as _, Result};
use declarative::{BackendClient, Engine, ExecutionPlan, Operation, StatusSink};

/// Apply `op` to every selected resource. Returns whether all succeeded.
///
/// Docker resources run before kubernetes ones, and after them for delete.
pub fn run(ctx: &Context, op: Operation, args: &RunArgs) -> Result<bool> {
    let mut session = Session::open(&args.common)?;
    if session.is_empty() {
        ui::warn("No resources match the selection");
        return Ok(true);
    }

    let engine = session.engine(&args.common);
    let mut sink = ui::ConsoleStatus::new(ctx.quiet);
    let mut success = true;

    let mut steps = [Step::Docker, Step::Kubernetes];
    if op.is_teardown() {
        steps.reverse();
    }

    for step in steps {
        match step {
            Step::Docker if !session.docker.is_empty() => {
                let backend = session.docker_backend()?;
                success &= execute(
                    &mut session.docker,
                    op,
                    &backend,
                    &engine,
                    args.dry_run,
                    &mut sink,
                );
            }
            Step::Kubernetes if !session.kubernetes.is_empty() => {
                let backend = session.kubernetes_backend()?;
                success &= execute(
                    &mut session.kubernetes,
                    op,
                    &backend,
                    &engine,
                    args.dry_run,
                    &mut sink,
                );
            }
            _ => {}
        }
    }

    Ok(success)
}

/// `down`, after confirmation unless `--yes` or `--dry-run`
pub fn down(ctx: &Context, args: &DownArgs) -> Result<bool> {
    if !args.yes && !args.run.dry_run && !confirm_teardown()? {
        ui::info("Aborted, nothing was deleted");
        return Ok(true);
    }
    run(ctx, Operation::Delete, &args.run)
}

#[derive(Clone, Copy)]
enum Step {
    Docker,
    Kubernetes,
}

fn confirm_teardown() -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt("Delete every selected resource?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Run or preview one backend's plan
pub(crate) fn execute<B: BackendClient>(
    plan: &mut ExecutionPlan<B>,
    op: Operation,
    backend: &B,
    engine: &Engine,
    dry_run: bool,
    sink: &mut dyn StatusSink,
) -> bool {
    if dry_run {
        return preview(plan, op, backend, engine);
    }
    engine.apply_plan(plan, op, backend, sink).is_success()
}

fn preview<B: BackendClient>(
    plan: &mut ExecutionPlan<B>,
    op: Operation,
    backend: &B,
    engine: &Engine,
) -> bool {
    ui::header(&format!("{op} on {} (dry run)", backend.name()));
    let mut success = true;
    for entry in engine.preview_plan(plan, op, backend) {
        match entry.planned {
            Ok(planned) => {
                ui::line(&format!(
                    "  {} {:<8} {}",
                    ui::planned_glyph(planned),
                    planned.to_string(),
                    entry.identity
                ));
            }
            Err(e) => {
                success = false;
                ui::error(&format!("{}: {e}", entry.identity));
            }
        }
    }
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::backend::memory::{CallKind, MemoryBackend, MemoryObject};
    use declarative::{CollectStatus, Resource};

    fn plan() -> ExecutionPlan<MemoryBackend> {
        let mut plan = ExecutionPlan::new();
        plan.add(0, Resource::new(MemoryObject::new("Network", "backend")).unwrap());
        plan.add(1, Resource::new(MemoryObject::new("Container", "web")).unwrap());
        plan
    }

    #[test]
    fn test_execute_applies_plan() {
        let backend = MemoryBackend::new();
        let mut sink = CollectStatus::default();
        let mut plan = plan();

        let ok = execute(
            &mut plan,
            Operation::Create,
            &backend,
            &Engine::default(),
            false,
            &mut sink,
        );

        assert!(ok);
        assert!(backend.contains(&declarative::Identity::new("Container", "web")));
        assert!(sink.lines.last().is_some_and(|l| l.starts_with("create: ok")));
    }

    #[test]
    fn test_dry_run_never_mutates() {
        let backend = MemoryBackend::new();
        let mut sink = CollectStatus::default();
        let mut plan = plan();

        let ok = execute(
            &mut plan,
            Operation::Create,
            &backend,
            &Engine::default(),
            true,
            &mut sink,
        );

        assert!(ok);
        assert!(sink.lines.is_empty());
        assert!(backend.calls_of(CallKind::Create).is_empty());
        assert_eq!(backend.calls_of(CallKind::Read).len(), 2);
    }

    #[test]
    fn test_execute_reports_failure() {
        let backend = MemoryBackend::new().with_failure(CallKind::Create, "web");
        let mut sink = CollectStatus::default();
        let mut plan = plan();

        let ok = execute(
            &mut plan,
            Operation::Create,
            &backend,
            &Engine::default(),
            false,
            &mut sink,
        );

        assert!(!ok);
        assert!(backend.contains(&declarative::Identity::new("Network", "backend")));
    }

    #[test]
    fn test_dry_run_read_failure() {
        let backend = MemoryBackend::new().with_failure(CallKind::Read, "web");
        let mut sink = CollectStatus::default();
        let mut plan = plan();

        let ok = execute(
            &mut plan,
            Operation::Delete,
            &backend,
            &Engine::default(),
            true,
            &mut sink,
        );
        assert!(!ok);
    }
}
