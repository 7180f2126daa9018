// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-run reconciler: the run-lifecycle state machine.
//!
//! Pending runs are validated, provisioned (service account, mirrored
//! bundles, ephemeral RBAC) and turned into a Job. Running runs are
//! tracked against the Job and pod until a terminal phase is recorded;
//! terminal phases are monotonic. A finalizer gates deletion so the
//! cluster-scoped RBAC sweep always runs before the object disappears.

mod provision;
mod track;

pub use track::{decide_tracking, TrackDecision, TrackInputs};

use crate::context::Context;
use crate::error::Error;
use crate::rbac;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::finalizer::{finalizer, Event as FinalizerEvent};
use kube::runtime::{watcher, Controller};
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use sz_bus::{BusMessage, Topic, META_AGENT_RUN_ID, META_INSTANCE_NAME};
use sz_resources::{AgentRun, AgentRunStatus, CleanupDisposition, RunPhase};

pub const FINALIZER: &str = "agentruns.sympozium.dev/cleanup";

/// How often a Running run is re-examined absent other triggers.
const TRACK_INTERVAL: Duration = Duration::from_secs(10);

async fn reconcile(run: Arc<AgentRun>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = run
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?
        .to_string();
    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), &namespace);

    finalizer(&runs, FINALIZER, run, |event| async {
        match event {
            FinalizerEvent::Apply(run) => apply(run, ctx.clone()).await,
            FinalizerEvent::Cleanup(run) => cleanup(run, ctx.clone()).await,
        }
    })
    .await
    .map_err(Error::from)
}

async fn apply(run: Arc<AgentRun>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = run.name_any();
    match run.phase() {
        RunPhase::Pending => match provision::provision(&run, &ctx).await {
            Ok(job_name) => {
                let status = AgentRunStatus {
                    phase: RunPhase::Running,
                    job_name: Some(job_name),
                    start_time: Some(ctx.clock.now()),
                    ..run.status.clone().unwrap_or_default()
                };
                patch_status(&run, &ctx, &status).await?;
                publish_event(&ctx, &run, Topic::RunStarted).await;
                tracing::info!(run = %name, "run provisioned");
                Ok(Action::requeue(TRACK_INTERVAL))
            }
            Err(err) if err.is_validation() => {
                tracing::warn!(run = %name, reason = %err, "run rejected by validation");
                record_failure(&run, &ctx, &err.to_string(), None).await?;
                Ok(Action::await_change())
            }
            Err(err) => Err(err),
        },
        RunPhase::Running => track::track(&run, &ctx).await,
        RunPhase::Succeeded | RunPhase::Failed => finalize_terminal(&run, &ctx).await,
    }
}

/// Deletion reconcile: sweep cluster RBAC, then let the object go.
async fn cleanup(run: Arc<AgentRun>, ctx: Arc<Context>) -> Result<Action, Error> {
    rbac::sweep_cluster_grants(&ctx.client, &run.name_any()).await;
    Ok(Action::await_change())
}

/// Terminal-phase reconcile: sweep, then self-delete when asked to.
async fn finalize_terminal(run: &AgentRun, ctx: &Context) -> Result<Action, Error> {
    let name = run.name_any();
    rbac::sweep_cluster_grants(&ctx.client, &name).await;

    if run.spec.cleanup == CleanupDisposition::Delete && run.metadata.deletion_timestamp.is_none()
    {
        let namespace = run
            .metadata
            .namespace
            .as_deref()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), namespace);
        match runs.delete(&name, &DeleteParams::default()).await {
            Ok(_) => tracing::info!(run = %name, "terminal run deleted"),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(err) => tracing::warn!(run = %name, error = %err, "self-delete failed"),
        }
    }
    Ok(Action::await_change())
}

/// Record a terminal failure. Never downgrades an existing terminal
/// phase.
pub(crate) async fn record_failure(
    run: &AgentRun,
    ctx: &Context,
    reason: &str,
    exit_code: Option<i32>,
) -> Result<(), Error> {
    if run.phase().is_terminal() {
        return Ok(());
    }
    let status = AgentRunStatus {
        phase: RunPhase::Failed,
        error: Some(reason.to_string()),
        completion_time: Some(ctx.clock.now()),
        exit_code,
        ..run.status.clone().unwrap_or_default()
    };
    patch_status(run, ctx, &status).await?;
    publish_event(ctx, run, Topic::RunFailed).await;
    rbac::sweep_cluster_grants(&ctx.client, &run.name_any()).await;
    Ok(())
}

pub(crate) async fn patch_status(
    run: &AgentRun,
    ctx: &Context,
    status: &AgentRunStatus,
) -> Result<(), Error> {
    let namespace = run
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), namespace);
    runs.patch_status(
        &run.name_any(),
        &PatchParams::default(),
        &Patch::Merge(serde_json::json!({ "status": status })),
    )
    .await?;
    Ok(())
}

/// Best-effort lifecycle event; bus trouble never affects the phase.
pub(crate) async fn publish_event(ctx: &Context, run: &AgentRun, topic: Topic) {
    let payload = serde_json::json!({ "run": run.name_any(), "topic": topic.as_str() });
    let message = BusMessage::new(&topic, payload.to_string().into_bytes())
        .with_meta(META_AGENT_RUN_ID, run.name_any())
        .with_meta(META_INSTANCE_NAME, run.spec.identity_ref.clone());
    if let Err(err) = ctx.bus.publish(message).await {
        tracing::debug!(run = %run.name_any(), error = %err, "lifecycle publish failed");
    }
}

pub(crate) fn elapsed_since(
    start: Option<DateTime<Utc>>,
    created: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Duration {
    let reference = start.or(created).unwrap_or(now);
    (now - reference).to_std().unwrap_or_default()
}

/// Drive the run controller until shutdown.
pub async fn run(ctx: Arc<Context>) {
    let runs: Api<AgentRun> = Api::all(ctx.client.clone());
    let jobs: Api<Job> = Api::all(ctx.client.clone());
    Controller::new(runs, watcher::Config::default())
        .owns(jobs, watcher::Config::default())
        .run(reconcile, super::error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                tracing::debug!(error = %err, "run controller event");
            }
        })
        .await;
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
