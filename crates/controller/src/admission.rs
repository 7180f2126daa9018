// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy gate at resource-admission time.
//!
//! `validate_run` is the pure decision matrix; it is shared with the run
//! reconciler's Pending gate so admission and reconcile can never
//! disagree. The webhook handler wraps it in the AdmissionReview
//! envelope. Lookup failures fail open: the reconcile-time gate is
//! authoritative and will still stop an invalid run.

use crate::context::Context;
use crate::error::Error;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use kube::api::{Api, ListParams};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use kube::ResourceExt;
use std::sync::Arc;
use sz_resources::{AgentPolicy, AgentRun, Identity, ToolAction};
use thiserror::Error;

/// Feature gate controlling sub-agent spawning.
pub const GATE_SPAWNING: &str = "spawning";
/// Feature gate controlling sandboxed runs.
pub const GATE_SANDBOX: &str = "sandbox";

/// A structured admission rejection; the display string is user-visible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("sub-agent depth {depth} exceeds max {max}")]
    DepthExceeded { depth: u32, max: u32 },
    #[error("identity has {active} active runs, max {max}")]
    TooManyActiveRuns { active: u32, max: u32 },
    #[error("policy requires a sandbox")]
    SandboxRequired,
    #[error("tool '{0}' is denied by policy")]
    ToolDenied(String),
    #[error("feature gate '{0}' is disabled")]
    GateDisabled(String),
}

/// Validate a run against its bound policy. `active` is the number of
/// non-terminal runs already charged to the same identity.
pub fn validate_run(run: &AgentRun, policy: &AgentPolicy, active: u32) -> Result<(), Rejection> {
    if let Some(sub) = &policy.spec.sub_agents {
        let depth = run.spawn_depth();
        if depth > sub.max_depth {
            return Err(Rejection::DepthExceeded { depth, max: sub.max_depth });
        }
        if sub.max_concurrent > 0 && active >= sub.max_concurrent {
            return Err(Rejection::TooManyActiveRuns { active, max: sub.max_concurrent });
        }
    }

    let sandboxed = run.spec.sandbox.as_ref().is_some_and(|s| s.enabled);
    if policy.spec.sandbox.as_ref().is_some_and(|s| s.required) && !sandboxed {
        return Err(Rejection::SandboxRequired);
    }

    // Run-level tool gating is a comma-separated request list; `ask` is
    // advisory and passes here.
    if let Some(requested) = &run.spec.tool_gating {
        for tool in requested.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if policy.tool_action(tool) == ToolAction::Deny {
                return Err(Rejection::ToolDenied(tool.to_string()));
            }
        }
    }

    if run.spec.parent.is_some() && !policy.gate_enabled(GATE_SPAWNING) {
        return Err(Rejection::GateDisabled(GATE_SPAWNING.to_string()));
    }
    if sandboxed && !policy.gate_enabled(GATE_SANDBOX) {
        return Err(Rejection::GateDisabled(GATE_SANDBOX.to_string()));
    }

    Ok(())
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::DepthExceeded { depth, max } => Error::DepthExceeded { depth, max },
            Rejection::TooManyActiveRuns { active, max } => {
                Error::ConcurrencyExceeded { active, max }
            }
            other => Error::PolicyViolation(other.to_string()),
        }
    }
}

/// Count non-terminal runs for an identity, excluding one run by name.
pub async fn count_active_runs(
    client: &kube::Client,
    namespace: &str,
    identity: &str,
    exclude: &str,
) -> Result<u32, Error> {
    let api: Api<AgentRun> = Api::namespaced(client.clone(), namespace);
    let runs = api.list(&ListParams::default()).await?;
    let count = runs
        .items
        .iter()
        .filter(|r| r.spec.identity_ref == identity)
        .filter(|r| r.name_any() != exclude)
        .filter(|r| r.is_active())
        .count();
    Ok(count as u32)
}

/// Webhook router; mounted by the control-plane binary.
pub fn router(ctx: Arc<Context>) -> Router {
    Router::new().route("/validate-agentrun", post(handle)).with_state(ctx)
}

async fn handle(
    State(ctx): State<Arc<Context>>,
    Json(review): Json<AdmissionReview<AgentRun>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<AgentRun> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "malformed admission review");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    let mut response = AdmissionResponse::from(&request);
    if let Some(run) = &request.object {
        if let Err(rejection) = gate(run, &ctx).await {
            tracing::info!(run = %run.name_any(), %rejection, "admission rejected run");
            response = response.deny(rejection.to_string());
        }
    }
    Json(response.into_review())
}

/// Resolve the policy chain for a run and apply the decision matrix.
async fn gate(run: &AgentRun, ctx: &Context) -> Result<(), Rejection> {
    let Some(namespace) = run.metadata.namespace.as_deref() else {
        return Ok(());
    };

    let identities: Api<Identity> = Api::namespaced(ctx.client.clone(), namespace);
    let identity = match identities.get(&run.spec.identity_ref).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(error = %err, "identity lookup failed at admission, allowing");
            return Ok(());
        }
    };
    let Some(policy_name) = identity.spec.policy_ref.as_deref() else {
        return Ok(());
    };
    let policies: Api<AgentPolicy> = Api::namespaced(ctx.client.clone(), namespace);
    let policy = match policies.get(policy_name).await {
        Ok(policy) => policy,
        Err(err) => {
            tracing::debug!(error = %err, "policy lookup failed at admission, allowing");
            return Ok(());
        }
    };

    let active = match count_active_runs(
        &ctx.client,
        namespace,
        &run.spec.identity_ref,
        &run.name_any(),
    )
    .await
    {
        Ok(active) => active,
        Err(err) => {
            tracing::debug!(error = %err, "active-run count failed at admission, allowing");
            0
        }
    };

    validate_run(run, &policy, active)
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
