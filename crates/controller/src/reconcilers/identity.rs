// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity reconciler: per-channel gateway deployments, the persistent
//! memory store, and status aggregation.

use crate::context::{Context, ImageConfig};
use crate::error::Error;
use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, EnvFromSource, PodSpec, PodTemplateSpec, SecretEnvSource,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use sz_core::{gateway_name, memory_store_name, LABEL_CHANNEL, LABEL_INSTANCE};
use sz_resources::{
    AgentRun, ChannelBinding, Identity, IdentityPhase, IdentityStatus,
};

const MANAGER: &str = "sympozium-identity";

/// Seed content for a fresh memory store.
pub const MEMORY_SEED: &str = "# Memory\n\nNothing here yet.\n";

fn gateway_labels(identity: &str, channel: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_CHANNEL.to_string(), channel.to_string()),
        (LABEL_INSTANCE.to_string(), identity.to_string()),
    ])
}

/// Desired gateway deployment for one channel binding.
pub fn desired_gateway(
    identity: &Identity,
    binding: &ChannelBinding,
    images: &ImageConfig,
    bus_url: &str,
) -> Result<Deployment, Error> {
    let owner =
        identity.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    let identity_name = identity.name_any();
    let name = gateway_name(&identity_name, &binding.r#type);
    let labels = gateway_labels(&identity_name, &binding.r#type);

    let container = Container {
        name: "gateway".to_string(),
        image: Some(images.gateway(&binding.r#type)),
        env: Some(vec![
            env("INSTANCE_NAME", &identity_name),
            env("CHANNEL_TYPE", &binding.r#type),
            env("EVENT_BUS_URL", bus_url),
        ]),
        env_from: Some(vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: binding.credential_secret.clone(),
                optional: Some(false),
            }),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: identity.metadata.namespace.clone(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector { match_labels: Some(labels.clone()), ..Default::default() },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(PodSpec { containers: vec![container], ..Default::default() }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn env(name: &str, value: &str) -> k8s_openapi::api::core::v1::EnvVar {
    k8s_openapi::api::core::v1::EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Gateways currently owned by the identity whose channel left the spec.
pub fn stale_gateways<'a>(
    identity: &Identity,
    existing: impl IntoIterator<Item = &'a Deployment>,
) -> Vec<String> {
    let declared: Vec<String> =
        identity.spec.channels.iter().map(|c| c.r#type.clone()).collect();
    existing
        .into_iter()
        .filter_map(|d| {
            let channel = d.metadata.labels.as_ref()?.get(LABEL_CHANNEL)?;
            if declared.iter().any(|c| c == channel) {
                None
            } else {
                d.metadata.name.clone()
            }
        })
        .collect()
}

async fn reconcile(identity: Arc<Identity>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = identity
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = identity.name_any();

    let deployments: Api<Deployment> = Api::namespaced(ctx.client.clone(), namespace);

    // Ensure one gateway per declared channel.
    for binding in &identity.spec.channels {
        let gateway = desired_gateway(&identity, binding, &ctx.images, &ctx.bus_url)?;
        let gateway_name = gateway.metadata.name.clone().unwrap_or_default();
        deployments
            .patch(&gateway_name, &PatchParams::apply(MANAGER).force(), &Patch::Apply(&gateway))
            .await?;
    }

    // Prune gateways for channels removed from the spec.
    let selector = format!("{LABEL_INSTANCE}={name}");
    let owned = deployments.list(&ListParams::default().labels(&selector)).await?;
    for stale in stale_gateways(&identity, owned.items.iter()) {
        tracing::info!(identity = %name, gateway = %stale, "removing gateway for dropped channel");
        if let Err(err) = deployments.delete(&stale, &DeleteParams::default()).await {
            tracing::warn!(identity = %name, gateway = %stale, error = %err, "gateway delete failed");
        }
    }

    // Seed the memory store once; never overwrite an existing store.
    if identity.memory_enabled() {
        ensure_memory_store(&ctx, namespace, &identity).await?;
    }

    // Observed run counts.
    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), namespace);
    let all_runs = runs.list(&ListParams::default()).await?;
    let mine: Vec<&AgentRun> =
        all_runs.items.iter().filter(|r| r.spec.identity_ref == name).collect();
    let active = mine.iter().filter(|r| r.is_active()).count() as u32;
    let total = mine.len() as u32;

    // Preserve the channel map maintained by the health aggregator.
    let channels = identity.status.as_ref().map(|s| s.channels.clone()).unwrap_or_default();
    let status = IdentityStatus {
        phase: IdentityPhase::Ready,
        channels,
        active_runs: active,
        total_runs: total,
    };
    let identities: Api<Identity> = Api::namespaced(ctx.client.clone(), namespace);
    identities
        .patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": status })),
        )
        .await?;

    Ok(Action::requeue(Duration::from_secs(120)))
}

async fn ensure_memory_store(
    ctx: &Context,
    namespace: &str,
    identity: &Identity,
) -> Result<(), Error> {
    let maps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    let store_name = memory_store_name(&identity.name_any());
    if maps.get_opt(&store_name).await?.is_some() {
        return Ok(());
    }
    let owner =
        identity.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    let store = ConfigMap {
        metadata: ObjectMeta {
            name: Some(store_name.clone()),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        data: Some(BTreeMap::from([("MEMORY.md".to_string(), MEMORY_SEED.to_string())])),
        ..Default::default()
    };
    match maps.create(&PostParams::default(), &store).await {
        Ok(_) => {
            tracing::info!(identity = %identity.name_any(), store = %store_name, "memory store seeded");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Drive the identity controller until shutdown.
pub async fn run(ctx: Arc<Context>) {
    let identities: Api<Identity> = Api::all(ctx.client.clone());
    let deployments: Api<Deployment> = Api::all(ctx.client.clone());
    let maps: Api<ConfigMap> = Api::all(ctx.client.clone());
    Controller::new(identities, watcher::Config::default())
        .owns(deployments, watcher::Config::default())
        .owns(maps, watcher::Config::default())
        .run(reconcile, super::error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                tracing::debug!(error = %err, "identity controller event");
            }
        })
        .await;
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
