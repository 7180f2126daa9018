// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule reconciler: cron-driven creation of runs with concurrency
//! policies and memory injection.

use crate::context::Context;
use crate::error::Error;
use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Resource, ResourceExt};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sz_core::memory_store_name;
use sz_resources::{
    AgentRun, AgentRunSpec, AgentSchedule, AgentScheduleStatus, ConcurrencyPolicy, Identity,
    SchedulePhase,
};

/// Upper bound on a quiet requeue, so spec edits are noticed promptly.
const MAX_WAIT: Duration = Duration::from_secs(60);
/// Requeue after a Forbid skip.
const FORBID_RETRY: Duration = Duration::from_secs(30);
/// Requeue while suspended.
const SUSPENDED_RETRY: Duration = Duration::from_secs(60);

/// Parse a cron expression, accepting the classic five-field form by
/// pinning seconds to zero.
pub fn parse_cron(expr: &str) -> Result<CronSchedule, Error> {
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    CronSchedule::from_str(&normalized)
        .map_err(|e| Error::InvalidCron { expr: expr.to_string(), reason: e.to_string() })
}

/// Next trigger strictly after the reference time.
pub fn next_fire(
    schedule: &CronSchedule,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// What a reconcile pass should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not due yet; requeue after the duration.
    Wait(Duration),
    /// Previous run still active under Forbid; skip this trigger.
    SkipConcurrent,
    /// Fire now; under Replace the previous run is deleted first.
    Fire { replace_previous: bool },
}

/// Pure trigger decision. `previous_active` reports whether the last
/// created run is still Pending/Running.
pub fn decide(
    schedule: &CronSchedule,
    last_run: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: ConcurrencyPolicy,
    previous_active: bool,
) -> Decision {
    let reference = last_run.unwrap_or(created);
    let Some(next) = next_fire(schedule, reference) else {
        // Expression with no future firings; check back occasionally.
        return Decision::Wait(MAX_WAIT);
    };
    if now < next {
        let until = (next - now).to_std().unwrap_or(MAX_WAIT);
        return Decision::Wait(until.min(MAX_WAIT));
    }
    if previous_active {
        match policy {
            ConcurrencyPolicy::Forbid => return Decision::SkipConcurrent,
            ConcurrencyPolicy::Allow => return Decision::Fire { replace_previous: false },
            ConcurrencyPolicy::Replace => return Decision::Fire { replace_previous: true },
        }
    }
    Decision::Fire { replace_previous: false }
}

/// Task text for a firing, with the optional memory context prefix.
pub fn build_task(task: &str, memory: Option<&str>) -> String {
    match memory.map(str::trim).filter(|m| !m.is_empty()) {
        Some(memory) => format!("## Memory Context\n{memory}\n\n## Task\n{task}"),
        None => task.to_string(),
    }
}

async fn reconcile(sched: Arc<AgentSchedule>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = sched
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = sched.name_any();
    let schedules: Api<AgentSchedule> = Api::namespaced(ctx.client.clone(), namespace);

    if sched.spec.suspend {
        patch_phase(&schedules, &name, &sched, SchedulePhase::Suspended, None).await?;
        return Ok(Action::requeue(SUSPENDED_RETRY));
    }

    let cron = match parse_cron(&sched.spec.cron) {
        Ok(cron) => cron,
        Err(err) => {
            tracing::warn!(schedule = %name, error = %err, "invalid cron expression");
            patch_phase(&schedules, &name, &sched, SchedulePhase::Error, None).await?;
            return Ok(Action::requeue(SUSPENDED_RETRY));
        }
    };

    let now = ctx.clock.now();
    let created = sched.meta().creation_timestamp.as_ref().map(|t| t.0).unwrap_or(now);

    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), namespace);
    let previous = match sched.last_run_name() {
        Some(last) => runs.get_opt(last).await?,
        None => None,
    };
    let previous_active = previous.as_ref().is_some_and(AgentRun::is_active);

    let decision = decide(
        &cron,
        sched.last_run_time(),
        created,
        now,
        sched.spec.concurrency_policy,
        previous_active,
    );

    match decision {
        Decision::Wait(wait) => {
            patch_phase(&schedules, &name, &sched, SchedulePhase::Active, next_fire(&cron, now))
                .await?;
            Ok(Action::requeue(wait))
        }
        Decision::SkipConcurrent => {
            tracing::info!(schedule = %name, "previous run still active, skipping trigger");
            Ok(Action::requeue(FORBID_RETRY))
        }
        Decision::Fire { replace_previous } => {
            if replace_previous {
                if let Some(prev) = previous.as_ref().and_then(|p| p.metadata.name.clone()) {
                    tracing::info!(schedule = %name, run = %prev, "replacing previous run");
                    if let Err(err) = runs.delete(&prev, &DeleteParams::default()).await {
                        tracing::warn!(schedule = %name, run = %prev, error = %err, "replace delete failed");
                    }
                }
            }
            match fire(&sched, &ctx, namespace, &name, now, &cron).await {
                Err(Error::InstanceNotFound(identity)) => {
                    tracing::warn!(schedule = %name, %identity, "identity missing, marking schedule Error");
                    patch_phase(&schedules, &name, &sched, SchedulePhase::Error, None).await?;
                    Ok(Action::requeue(SUSPENDED_RETRY))
                }
                other => other,
            }
        }
    }
}

/// Create the run for this trigger and roll the observed state forward.
async fn fire(
    sched: &AgentSchedule,
    ctx: &Context,
    namespace: &str,
    name: &str,
    now: DateTime<Utc>,
    cron: &CronSchedule,
) -> Result<Action, Error> {
    let identities: Api<Identity> = Api::namespaced(ctx.client.clone(), namespace);
    let identity = identities
        .get_opt(&sched.spec.identity_ref)
        .await?
        .ok_or_else(|| Error::InstanceNotFound(sched.spec.identity_ref.clone()))?;

    let memory = if sched.spec.include_memory {
        fetch_memory(ctx, namespace, &sched.spec.identity_ref).await
    } else {
        None
    };
    let task = build_task(&sched.spec.task, memory.as_deref());

    let run_name = sched.next_run_name(name);
    let owner = sched.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    let mut run = AgentRun::new(
        &run_name,
        AgentRunSpec {
            identity_ref: sched.spec.identity_ref.clone(),
            agent_id: sched.spec.identity_ref.clone(),
            session_key: uuid::Uuid::new_v4().to_string(),
            task,
            skills: identity.spec.skills.clone(),
            ..Default::default()
        },
    );
    run.metadata.namespace = Some(namespace.to_string());
    run.metadata.owner_references = Some(vec![owner]);
    if let Some(tag) = &sched.spec.tag {
        run.metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("sympozium.dev/tag".to_string(), tag.clone());
    }

    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), namespace);
    match runs.create(&PostParams::default(), &run).await {
        Ok(_) => tracing::info!(schedule = %name, run = %run_name, "schedule fired"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            tracing::debug!(schedule = %name, run = %run_name, "run already exists");
        }
        Err(err) => return Err(err.into()),
    }

    let total = sched.status.as_ref().map(|s| s.total_runs).unwrap_or(0) + 1;
    let next = next_fire(cron, now);
    let status = AgentScheduleStatus {
        phase: SchedulePhase::Active,
        last_run_name: Some(run_name),
        last_run_time: Some(now),
        next_run_time: next,
        total_runs: total,
    };
    let schedules: Api<AgentSchedule> = Api::namespaced(ctx.client.clone(), namespace);
    schedules
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": status })),
        )
        .await?;

    let wait = next
        .and_then(|n| (n - now).to_std().ok())
        .unwrap_or(MAX_WAIT)
        .min(MAX_WAIT);
    Ok(Action::requeue(wait))
}

async fn fetch_memory(ctx: &Context, namespace: &str, identity: &str) -> Option<String> {
    let maps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    let store = maps.get_opt(&memory_store_name(identity)).await.ok()??;
    store.data.as_ref()?.get("MEMORY.md").cloned()
}

async fn patch_phase(
    schedules: &Api<AgentSchedule>,
    name: &str,
    sched: &AgentSchedule,
    phase: SchedulePhase,
    next: Option<DateTime<Utc>>,
) -> Result<(), Error> {
    let mut status = sched.status.clone().unwrap_or_default();
    status.phase = phase;
    if next.is_some() {
        status.next_run_time = next;
    }
    schedules
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": status })),
        )
        .await?;
    Ok(())
}

/// Drive the schedule controller until shutdown.
pub async fn run(ctx: Arc<Context>) {
    let schedules: Api<AgentSchedule> = Api::all(ctx.client.clone());
    let runs: Api<AgentRun> = Api::all(ctx.client.clone());
    Controller::new(schedules, watcher::Config::default())
        .owns(runs, watcher::Config::default())
        .run(reconcile, super::error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                tracing::debug!(error = %err, "schedule controller event");
            }
        })
        .await;
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
