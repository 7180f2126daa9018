// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skill-pack reconciler: materialize declarative skill bundles into
//! content-addressable mounted data.

use crate::context::Context;
use crate::error::Error;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use sz_core::bundle_name;
use sz_resources::{SkillPack, SkillPackPhase, SkillPackSpec, SkillPackStatus};

const MANAGER: &str = "sympozium-skillpack";

/// Render the pack's skills to bundle entries, in declared order (later
/// duplicates override earlier ones).
pub fn render_bundle(spec: &SkillPackSpec) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    for skill in &spec.skills {
        let body = match skill.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => {
                format!("# {}\n\n> {}\n\n{}", skill.name, description, skill.content)
            }
            None => format!("# {}\n\n{}", skill.name, skill.content),
        };
        data.insert(format!("{}.md", skill.name), body);
    }
    data
}

/// Desired bundle ConfigMap, owned by the pack.
pub fn desired_bundle(pack: &SkillPack) -> Result<ConfigMap, Error> {
    let owner = pack.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(bundle_name(&pack.name_any())),
            namespace: pack.metadata.namespace.clone(),
            owner_references: Some(vec![owner]),
            labels: Some(BTreeMap::from([(
                sz_core::LABEL_MANAGED_BY.to_string(),
                sz_core::MANAGED_BY.to_string(),
            )])),
            ..Default::default()
        },
        data: Some(render_bundle(&pack.spec)),
        ..Default::default()
    })
}

async fn reconcile(pack: Arc<SkillPack>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = pack
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = pack.name_any();

    let bundle = desired_bundle(&pack)?;
    let bundle_name = bundle.metadata.name.clone().unwrap_or_default();
    let maps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    let apply = maps
        .patch(&bundle_name, &PatchParams::apply(MANAGER).force(), &Patch::Apply(&bundle))
        .await;

    let status = match apply {
        Ok(_) => {
            tracing::debug!(pack = %name, bundle = %bundle_name, "bundle materialized");
            SkillPackStatus {
                phase: SkillPackPhase::Ready,
                bundle_name: Some(bundle_name),
                skill_count: pack.spec.skills.len() as u32,
            }
        }
        Err(err) => {
            tracing::warn!(pack = %name, error = %err, "bundle apply failed");
            SkillPackStatus {
                phase: SkillPackPhase::Error,
                bundle_name: None,
                skill_count: pack.spec.skills.len() as u32,
            }
        }
    };
    let failed = status.phase == SkillPackPhase::Error;

    let packs: Api<SkillPack> = Api::namespaced(ctx.client.clone(), namespace);
    packs
        .patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": status })),
        )
        .await?;

    if failed {
        Ok(Action::requeue(Duration::from_secs(30)))
    } else {
        Ok(Action::requeue(Duration::from_secs(300)))
    }
}

/// Drive the skill-pack controller until shutdown.
pub async fn run(ctx: Arc<Context>) {
    let packs: Api<SkillPack> = Api::all(ctx.client.clone());
    let bundles: Api<ConfigMap> = Api::all(ctx.client.clone());
    Controller::new(packs, watcher::Config::default())
        .owns(bundles, watcher::Config::default())
        .run(reconcile, super::error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                tracing::debug!(error = %err, "skillpack controller event");
            }
        })
        .await;
}

#[cfg(test)]
#[path = "skillpack_tests.rs"]
mod tests;
