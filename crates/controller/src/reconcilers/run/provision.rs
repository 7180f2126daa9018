// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-phase provisioning: validate, prepare, create the Job.

use crate::admission;
use crate::compose::{build_job, JobParams, ResolvedSidecar};
use crate::context::Context;
use crate::error::Error;
use crate::netpol;
use crate::rbac;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Resource, ResourceExt};
use sz_core::bundle_name;
use sz_resources::{AgentPolicy, AgentRun, Identity, RbacRule, SkillPack};

/// Validate a pending run and create its Job. Returns the job name.
pub(super) async fn provision(run: &AgentRun, ctx: &Context) -> Result<String, Error> {
    let namespace = run
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = run.name_any();

    let identity = fetch_identity(run, ctx, namespace).await?;
    let policy = enforce_policy(run, ctx, namespace, &identity).await?;

    rbac::ensure_service_account(&ctx.client, namespace).await?;

    // Safety net: a run created with no skills inherits the identity's
    // current list.
    let skills = if run.spec.skills.is_empty() && !identity.spec.skills.is_empty() {
        let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), namespace);
        runs.patch(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "spec": { "skills": identity.spec.skills } })),
        )
        .await?;
        identity.spec.skills.clone()
    } else {
        run.spec.skills.clone()
    };

    let (sidecars, grants) = resolve_skills(ctx, namespace, &skills).await?;

    let owner = run.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    rbac::create_grants(&ctx.client, namespace, &name, &owner, &grants).await?;

    // Compose against the (possibly re-inherited) skills list, with
    // identity sandbox preferences and the policy's default image filled
    // in where the run is silent.
    let mut effective = run.clone();
    effective.spec.skills = skills;
    merge_sandbox(&mut effective, &identity, policy.as_ref());

    if let Some(network) = policy.as_ref().and_then(|p| p.spec.network.as_ref()) {
        apply_network_policy(ctx, namespace, &name, network, owner.clone()).await;
    }

    let job = build_job(&JobParams {
        run: &effective,
        identity: &identity,
        memory_enabled: identity.memory_enabled(),
        sidecars: &sidecars,
        images: &ctx.images,
        bus_url: &ctx.bus_url,
        service_account: rbac::SERVICE_ACCOUNT,
        owner: Some(owner),
    });
    let job_name = job.metadata.name.clone().unwrap_or_default();

    let jobs: Api<Job> = Api::namespaced(ctx.client.clone(), namespace);
    match jobs.create(&PostParams::default(), &job).await {
        Ok(_) => tracing::info!(run = %name, job = %job_name, "job created"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            tracing::debug!(run = %name, job = %job_name, "job already exists");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(job_name)
}

async fn fetch_identity(
    run: &AgentRun,
    ctx: &Context,
    namespace: &str,
) -> Result<Identity, Error> {
    let identities: Api<Identity> = Api::namespaced(ctx.client.clone(), namespace);
    identities
        .get_opt(&run.spec.identity_ref)
        .await?
        .ok_or_else(|| Error::InstanceNotFound(run.spec.identity_ref.clone()))
}

/// Reconcile-time policy gate, sharing the admission decision matrix.
/// Returns the bound policy for downstream composition.
async fn enforce_policy(
    run: &AgentRun,
    ctx: &Context,
    namespace: &str,
    identity: &Identity,
) -> Result<Option<AgentPolicy>, Error> {
    let Some(policy_name) = identity.spec.policy_ref.as_deref() else {
        return Ok(None);
    };
    let policies: Api<AgentPolicy> = Api::namespaced(ctx.client.clone(), namespace);
    let policy = policies
        .get_opt(policy_name)
        .await?
        .ok_or_else(|| Error::PolicyNotFound(policy_name.to_string()))?;

    let active = admission::count_active_runs(
        &ctx.client,
        namespace,
        &run.spec.identity_ref,
        &run.name_any(),
    )
    .await?;

    admission::validate_run(run, &policy, active)?;
    Ok(Some(policy))
}

/// Fill in sandbox settings the run left unspecified: the identity's
/// preference switches it on, the policy's default image names it.
fn merge_sandbox(run: &mut AgentRun, identity: &Identity, policy: Option<&AgentPolicy>) {
    if run.spec.sandbox.is_none() {
        if let Some(prefs) = identity.spec.agent.sandbox.as_ref().filter(|p| p.enabled) {
            run.spec.sandbox = Some(sz_resources::SandboxSpec {
                enabled: true,
                image: prefs.image.clone(),
            });
        }
    }
    if let Some(sandbox) = run.spec.sandbox.as_mut().filter(|s| s.enabled && s.image.is_none()) {
        sandbox.image = policy
            .and_then(|p| p.spec.sandbox.as_ref())
            .and_then(|s| s.default_image.clone());
    }
}

/// Best-effort: egress isolation should not block the run when the
/// NetworkPolicy API is unavailable.
async fn apply_network_policy(
    ctx: &Context,
    namespace: &str,
    run_name: &str,
    config: &sz_resources::NetworkPolicyConfig,
    owner: k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference,
) {
    let Some(policy) = netpol::build_network_policy(run_name, namespace, config, owner) else {
        return;
    };
    let name = policy.metadata.name.clone().unwrap_or_default();
    let api: Api<k8s_openapi::api::networking::v1::NetworkPolicy> =
        Api::namespaced(ctx.client.clone(), namespace);
    match api.create(&PostParams::default(), &policy).await {
        Ok(_) => tracing::info!(run = %run_name, netpol = %name, "egress policy created"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(err) => tracing::warn!(run = %run_name, error = %err, "egress policy create failed"),
    }
}

/// Resolve each referenced pack: collect sidecar specs and their RBAC
/// rules, and mirror bundles into the run's namespace when they only
/// exist in the control-plane namespace. A pack that cannot be found
/// anywhere is skipped with a warning; the run proceeds with an empty
/// projection for it.
async fn resolve_skills(
    ctx: &Context,
    namespace: &str,
    skills: &[String],
) -> Result<(Vec<ResolvedSidecar>, Vec<(String, Vec<RbacRule>, Vec<RbacRule>)>), Error> {
    let local: Api<SkillPack> = Api::namespaced(ctx.client.clone(), namespace);
    let central: Api<SkillPack> = Api::namespaced(ctx.client.clone(), &ctx.control_namespace);

    let mut sidecars = Vec::new();
    let mut grants = Vec::new();

    for skill in skills {
        let pack = match local.get_opt(skill).await? {
            Some(pack) => Some(pack),
            None => central.get_opt(skill).await?,
        };
        let Some(pack) = pack else {
            tracing::warn!(%skill, "skill pack not found, proceeding without it");
            continue;
        };

        mirror_bundle(ctx, namespace, skill).await;

        if let Some(sidecar) = &pack.spec.sidecar {
            sidecars.push(ResolvedSidecar { pack: skill.clone(), spec: sidecar.clone() });
            if !sidecar.rbac_rules.is_empty() || !sidecar.cluster_rbac_rules.is_empty() {
                grants.push((
                    skill.clone(),
                    sidecar.rbac_rules.clone(),
                    sidecar.cluster_rbac_rules.clone(),
                ));
            }
        }
    }
    Ok((sidecars, grants))
}

/// Ensure the materialized bundle exists in the run's namespace, copying
/// it from the control-plane namespace on demand. Failure leaves the
/// projection empty; the pod still starts.
async fn mirror_bundle(ctx: &Context, namespace: &str, skill: &str) {
    let name = bundle_name(skill);
    let local: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    match local.get_opt(&name).await {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(%skill, error = %err, "bundle lookup failed");
            return;
        }
    }

    let central: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), &ctx.control_namespace);
    let source = match central.get_opt(&name).await {
        Ok(Some(source)) => source,
        Ok(None) => {
            tracing::warn!(%skill, "bundle missing in control namespace, projection stays empty");
            return;
        }
        Err(err) => {
            tracing::warn!(%skill, error = %err, "central bundle lookup failed");
            return;
        }
    };

    let mirror = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_string()),
            labels: source.metadata.labels.clone(),
            ..Default::default()
        },
        data: source.data.clone(),
        binary_data: source.binary_data.clone(),
        ..Default::default()
    };
    match local.create(&PostParams::default(), &mirror).await {
        Ok(_) => tracing::info!(%skill, %namespace, "bundle mirrored"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(err) => tracing::warn!(%skill, error = %err, "bundle mirror failed"),
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
