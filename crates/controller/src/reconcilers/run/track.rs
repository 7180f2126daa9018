// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running-phase tracking: job liveness, lingering-sidecar reaping,
//! result and memory extraction, timeout enforcement.

use super::{elapsed_since, patch_status, publish_event, record_failure};
use crate::context::Context;
use crate::error::Error;
use crate::rbac;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams, PropagationPolicy};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::time::Duration;
use sz_bus::Topic;
use sz_core::{markers, memory_store_name, LABEL_AGENT_RUN};
use sz_resources::{AgentRun, AgentRunStatus, RunMetrics, RunPhase};

const TRACK_INTERVAL: Duration = Duration::from_secs(10);
/// Lines scanned for the result marker.
const RESULT_TAIL: i64 = 20;
/// Lines scanned for the memory marker.
const MEMORY_TAIL: i64 = 100;

/// Everything the tracking decision needs, gathered from the Job and pod.
#[derive(Debug, Clone, Default)]
pub struct TrackInputs {
    pub job_exists: bool,
    pub job_succeeded: bool,
    pub job_failed: bool,
    pub container_count: usize,
    /// Exit code of the agent container, when it has terminated.
    pub agent_exit: Option<i32>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackDecision {
    Wait,
    /// Job reported success; extract and succeed.
    CompleteViaJob,
    /// Job reported failure.
    FailViaJob,
    /// Sleep-based sidecars keep the pod alive; the agent container's
    /// terminated state is authoritative. Reap the Job first.
    ReapLingering { exit_code: i32 },
    /// Wall-clock budget exhausted.
    Timeout,
    /// The Job disappeared under us.
    JobGone,
}

/// Pure tracking decision. Explicit job signals win over the timeout so
/// a run that finished just in time is not misreported.
pub fn decide_tracking(inputs: &TrackInputs) -> TrackDecision {
    if !inputs.job_exists {
        return TrackDecision::JobGone;
    }
    if inputs.job_succeeded {
        return TrackDecision::CompleteViaJob;
    }
    if inputs.job_failed {
        return TrackDecision::FailViaJob;
    }
    if inputs.container_count >= 3 {
        if let Some(exit_code) = inputs.agent_exit {
            return TrackDecision::ReapLingering { exit_code };
        }
    }
    if inputs.timed_out {
        return TrackDecision::Timeout;
    }
    TrackDecision::Wait
}

pub(super) async fn track(run: &AgentRun, ctx: &Context) -> Result<Action, Error> {
    let namespace = run
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = run.name_any();
    let job_name = run
        .status
        .as_ref()
        .and_then(|s| s.job_name.clone())
        .unwrap_or_else(|| name.clone());

    let jobs: Api<Job> = Api::namespaced(ctx.client.clone(), namespace);
    let job = jobs.get_opt(&job_name).await?;

    let pods: Api<Pod> = Api::namespaced(ctx.client.clone(), namespace);
    let selector = format!("{LABEL_AGENT_RUN}={name}");
    let pod = pods
        .list(&ListParams::default().labels(&selector))
        .await?
        .items
        .into_iter()
        .next();

    let now = ctx.clock.now();
    let elapsed = elapsed_since(
        run.status.as_ref().and_then(|s| s.start_time),
        run.metadata.creation_timestamp.as_ref().map(|t| t.0),
        now,
    );

    let inputs = TrackInputs {
        job_exists: job.is_some(),
        job_succeeded: job
            .as_ref()
            .and_then(|j| j.status.as_ref())
            .and_then(|s| s.succeeded)
            .unwrap_or(0)
            > 0,
        job_failed: job
            .as_ref()
            .and_then(|j| j.status.as_ref())
            .and_then(|s| s.failed)
            .unwrap_or(0)
            > 0,
        container_count: pod
            .as_ref()
            .and_then(|p| p.spec.as_ref())
            .map(|s| s.containers.len())
            .unwrap_or(0),
        agent_exit: pod.as_ref().and_then(agent_exit_code),
        timed_out: elapsed > run.effective_timeout(),
    };

    match decide_tracking(&inputs) {
        TrackDecision::Wait => {
            // Record the pod name as soon as it is known.
            if let Some(pod_name) = pod.as_ref().map(|p| p.name_any()) {
                let recorded = run.status.as_ref().and_then(|s| s.pod_name.as_deref());
                if recorded != Some(pod_name.as_str()) {
                    let status = AgentRunStatus {
                        pod_name: Some(pod_name),
                        ..run.status.clone().unwrap_or_default()
                    };
                    patch_status(run, ctx, &status).await?;
                }
            }
            Ok(Action::requeue(TRACK_INTERVAL))
        }
        TrackDecision::CompleteViaJob => {
            let pod_name = pod.as_ref().map(|p| p.name_any());
            complete(run, ctx, namespace, pod_name, inputs.agent_exit).await?;
            Ok(Action::requeue(TRACK_INTERVAL))
        }
        TrackDecision::FailViaJob => {
            record_failure(run, ctx, "job failed", inputs.agent_exit).await?;
            Ok(Action::requeue(TRACK_INTERVAL))
        }
        TrackDecision::ReapLingering { exit_code } => {
            // Extract from logs while the pod is still around, then reap
            // the Job so sleep-based sidecars die, then record the phase.
            let pod_name = pod.as_ref().map(|p| p.name_any());
            let tail = fetch_tail(ctx, namespace, pod_name.as_deref(), MEMORY_TAIL).await;

            tracing::info!(run = %name, exit_code, "agent terminated with lingering sidecars, reaping job");
            let dp = DeleteParams {
                propagation_policy: Some(PropagationPolicy::Background),
                ..Default::default()
            };
            if let Err(err) = jobs.delete(&job_name, &dp).await {
                tracing::warn!(run = %name, job = %job_name, error = %err, "job reap failed");
            }

            if exit_code == 0 {
                record_success(run, ctx, namespace, pod_name, tail, Some(exit_code)).await?;
            } else {
                record_failure(
                    run,
                    ctx,
                    &format!("agent exited with code {exit_code}"),
                    Some(exit_code),
                )
                .await?;
            }
            Ok(Action::requeue(TRACK_INTERVAL))
        }
        TrackDecision::Timeout => {
            tracing::warn!(run = %name, "run timed out, deleting job");
            let dp = DeleteParams {
                propagation_policy: Some(PropagationPolicy::Foreground),
                ..Default::default()
            };
            if let Err(err) = jobs.delete(&job_name, &dp).await {
                tracing::warn!(run = %name, job = %job_name, error = %err, "timeout job delete failed");
            }
            record_failure(run, ctx, "timeout", None).await?;
            Ok(Action::requeue(TRACK_INTERVAL))
        }
        TrackDecision::JobGone => {
            record_failure(run, ctx, "job disappeared", None).await?;
            Ok(Action::requeue(TRACK_INTERVAL))
        }
    }
}

/// Job success path: fetch the log tail once, extract both markers.
async fn complete(
    run: &AgentRun,
    ctx: &Context,
    namespace: &str,
    pod_name: Option<String>,
    exit_code: Option<i32>,
) -> Result<(), Error> {
    let tail = fetch_tail(ctx, namespace, pod_name.as_deref(), MEMORY_TAIL).await;
    record_success(run, ctx, namespace, pod_name, tail, exit_code).await
}

/// Record Succeeded with whatever the markers yield. Missing logs or
/// markers record an empty result rather than blocking the transition.
async fn record_success(
    run: &AgentRun,
    ctx: &Context,
    namespace: &str,
    pod_name: Option<String>,
    tail: Option<String>,
    exit_code: Option<i32>,
) -> Result<(), Error> {
    if run.phase().is_terminal() {
        return Ok(());
    }
    let name = run.name_any();

    let (result, error, metrics) = match tail.as_deref().and_then(last_lines_result) {
        Some(extracted) => match extracted.status {
            markers::ResultStatus::Success => {
                (extracted.response, None, parse_metrics(extracted.metrics))
            }
            markers::ResultStatus::Error => {
                (String::new(), extracted.error, parse_metrics(extracted.metrics))
            }
        },
        None => (String::new(), None, None),
    };

    if let Some(memory) = tail.as_deref().and_then(markers::extract_memory) {
        apply_memory(run, ctx, namespace, &memory).await;
    }

    let status = AgentRunStatus {
        phase: RunPhase::Succeeded,
        pod_name: pod_name.or_else(|| run.status.as_ref().and_then(|s| s.pod_name.clone())),
        result: Some(result),
        error,
        exit_code,
        metrics,
        completion_time: Some(ctx.clock.now()),
        ..run.status.clone().unwrap_or_default()
    };
    patch_status(run, ctx, &status).await?;
    publish_event(ctx, run, Topic::RunCompleted).await;
    rbac::sweep_cluster_grants(&ctx.client, &name).await;
    tracing::info!(run = %name, "run succeeded");
    Ok(())
}

/// The result marker lives in the last ~20 lines; the fetched tail may be
/// longer because the memory scan needs ~100.
fn last_lines_result(tail: &str) -> Option<markers::AgentResult> {
    let lines: Vec<&str> = tail.lines().collect();
    let start = lines.len().saturating_sub(RESULT_TAIL as usize);
    markers::extract_result(&lines[start..].join("\n"))
}

fn parse_metrics(value: Option<serde_json::Value>) -> Option<RunMetrics> {
    let value = value?;
    serde_json::from_value(value).ok()
}

/// Patch the memory store's `MEMORY.md`, honoring the size cap. A
/// missing store is ignored.
async fn apply_memory(run: &AgentRun, ctx: &Context, namespace: &str, memory: &str) {
    let maps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    let store_name = memory_store_name(&run.spec.identity_ref);
    match maps.get_opt(&store_name).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::debug!(run = %run.name_any(), "no memory store, dropping memory delta");
            return;
        }
        Err(err) => {
            tracing::warn!(run = %run.name_any(), error = %err, "memory store lookup failed");
            return;
        }
    }

    let max = fetch_memory_cap(ctx, namespace, &run.spec.identity_ref).await;
    let bounded = truncate_to(memory, max);

    let patch = serde_json::json!({ "data": { "MEMORY.md": bounded } });
    if let Err(err) = maps.patch(&store_name, &PatchParams::default(), &Patch::Merge(&patch)).await
    {
        tracing::warn!(run = %run.name_any(), error = %err, "memory patch failed");
    } else {
        tracing::info!(run = %run.name_any(), "memory updated");
    }
}

async fn fetch_memory_cap(ctx: &Context, namespace: &str, identity: &str) -> usize {
    let identities: Api<sz_resources::Identity> = Api::namespaced(ctx.client.clone(), namespace);
    identities
        .get_opt(identity)
        .await
        .ok()
        .flatten()
        .and_then(|i| i.spec.memory.map(|m| m.max_size as usize))
        .unwrap_or(64 * 1024)
}

/// Truncate on a char boundary at or below `max` bytes.
fn truncate_to(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

async fn fetch_tail(
    ctx: &Context,
    namespace: &str,
    pod_name: Option<&str>,
    lines: i64,
) -> Option<String> {
    let pod_name = pod_name?;
    let pods: Api<Pod> = Api::namespaced(ctx.client.clone(), namespace);
    let params = LogParams {
        container: Some("agent".to_string()),
        tail_lines: Some(lines),
        ..Default::default()
    };
    match pods.logs(pod_name, &params).await {
        Ok(tail) => Some(tail),
        Err(err) => {
            tracing::debug!(pod = pod_name, error = %err, "log fetch failed");
            None
        }
    }
}

fn agent_exit_code(pod: &Pod) -> Option<i32> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find(|cs| cs.name == "agent")?
        .state
        .as_ref()?
        .terminated
        .as_ref()
        .map(|t| t.exit_code)
}
