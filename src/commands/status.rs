//! `status` - fresh existence check of every selected resource

use super::Session;
use crate::Context;
use crate::cli::StatusArgs;
use crate::config::BackendKind;
use crate::ui;
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use declarative::{BackendClient, ExecutionPlan, Identity, Operation};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Present,
    Absent,
    Error,
}

#[derive(Debug, Serialize)]
pub struct ResourceStatus {
    pub backend: BackendKind,
    #[serde(flatten)]
    pub identity: Identity,
    pub state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub manifest: String,
    pub resources: Vec<ResourceStatus>,
}

impl StatusReport {
    pub fn is_success(&self) -> bool {
        self.resources.iter().all(|r| r.state != State::Error)
    }
}

pub fn run(ctx: &Context, args: &StatusArgs) -> Result<bool> {
    let mut session = Session::open(&args.common)?;
    let mut resources = Vec::new();

    if !session.docker.is_empty() {
        let backend = session.docker_backend()?;
        resources.extend(observe(&mut session.docker, &backend, BackendKind::Docker));
    }
    if !session.kubernetes.is_empty() {
        let backend = session.kubernetes_backend()?;
        resources.extend(observe(
            &mut session.kubernetes,
            &backend,
            BackendKind::Kubernetes,
        ));
    }

    let report = StatusReport {
        generated_at: Utc::now(),
        manifest: session.path.display().to_string(),
        resources,
    };

    if args.json {
        ui::line(&serde_json::to_string_pretty(&report)?);
    } else {
        print_report(ctx, &report);
    }
    Ok(report.is_success())
}

/// Read every resource, bypassing the state cache
pub(crate) fn observe<B: BackendClient>(
    plan: &mut ExecutionPlan<B>,
    backend: &B,
    kind: BackendKind,
) -> Vec<ResourceStatus> {
    plan.resources_for(Operation::Create)
        .into_iter()
        .map(|resource| {
            let (state, error) = match resource.is_active(backend) {
                Ok(true) => (State::Present, None),
                Ok(false) => (State::Absent, None),
                Err(e) => (State::Error, Some(e.to_string())),
            };
            ResourceStatus {
                backend: kind,
                identity: resource.identity().clone(),
                state,
                error,
            }
        })
        .collect()
}

fn print_report(ctx: &Context, report: &StatusReport) {
    if report.resources.is_empty() {
        ui::warn("No resources match the selection");
        return;
    }

    ui::header(&format!("Status of {}", report.manifest));
    for status in &report.resources {
        let glyph = match status.state {
            State::Present => "✓".green(),
            State::Absent => "○".yellow(),
            State::Error => "✗".red(),
        };
        let scope = status
            .identity
            .namespace
            .as_deref()
            .map(|ns| format!(" ({ns})"))
            .unwrap_or_default();
        ui::line(&format!(
            "  {glyph} {:<10} {}{}",
            status.backend.to_string(),
            status.identity,
            scope.dimmed()
        ));
        if let Some(error) = &status.error {
            ui::dim(error);
        }
    }

    if !ctx.quiet {
        let present = report
            .resources
            .iter()
            .filter(|r| r.state == State::Present)
            .count();
        ui::line("");
        ui::info(&format!(
            "{present} of {} resources present",
            report.resources.len()
        ));
    }
}
