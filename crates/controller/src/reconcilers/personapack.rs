// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persona-pack reconciler: stamp out identities, schedules, and memory
//! seeds from a bundle.

use crate::context::Context;
use crate::error::Error;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use sz_core::{memory_store_name, persona_child_name, LABEL_PERSONA_PACK};
use sz_resources::{
    AgentConfig, AgentSchedule, AgentScheduleSpec, ChannelBinding, Identity, IdentitySpec,
    InstalledPersona, MemoryConfig, Persona, PersonaPack, PersonaPackPhase, PersonaPackStatus,
};

const MANAGER: &str = "sympozium-personapack";

fn pack_label(pack: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_PERSONA_PACK.to_string(), pack.to_string())])
}

/// Identity stamped for one persona.
pub fn desired_identity(pack: &PersonaPack, persona: &Persona) -> Result<Identity, Error> {
    let owner = pack.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    let pack_name = pack.name_any();
    let name = persona_child_name(&pack_name, &persona.name);

    let channels: Vec<ChannelBinding> = persona
        .channels
        .iter()
        .filter_map(|channel| {
            let secret = pack.spec.channel_secrets.get(channel)?;
            Some(ChannelBinding { r#type: channel.clone(), credential_secret: secret.clone() })
        })
        .collect();

    let mut identity = Identity::new(
        &name,
        IdentitySpec {
            channels,
            agent: AgentConfig {
                model: persona.model.clone().unwrap_or_default(),
                ..Default::default()
            },
            skills: persona.skills.clone(),
            policy_ref: pack.spec.policy_ref.clone(),
            credentials: pack.spec.credentials.clone(),
            memory: persona.memory_seed.as_ref().map(|_| MemoryConfig {
                enabled: true,
                system_prompt: persona.system_prompt.clone(),
                ..Default::default()
            }),
        },
    );
    identity.metadata.namespace = pack.metadata.namespace.clone();
    identity.metadata.labels = Some(pack_label(&pack_name));
    identity.metadata.owner_references = Some(vec![owner]);
    Ok(identity)
}

/// Schedule stamped for one persona, when it declares one.
pub fn desired_schedule(pack: &PersonaPack, persona: &Persona) -> Result<Option<AgentSchedule>, Error> {
    let Some(spec) = &persona.schedule else { return Ok(None) };
    let owner = pack.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;
    let pack_name = pack.name_any();
    let name = persona_child_name(&pack_name, &persona.name);

    let mut schedule = AgentSchedule::new(
        &name,
        AgentScheduleSpec {
            identity_ref: name.clone(),
            cron: spec.cron.clone(),
            task: spec.task.clone(),
            include_memory: spec.include_memory,
            ..Default::default()
        },
    );
    schedule.metadata.namespace = pack.metadata.namespace.clone();
    schedule.metadata.labels = Some(pack_label(&pack_name));
    schedule.metadata.owner_references = Some(vec![owner]);
    Ok(Some(schedule))
}

async fn reconcile(pack: Arc<PersonaPack>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = pack
        .metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = pack.name_any();

    let identities: Api<Identity> = Api::namespaced(ctx.client.clone(), namespace);
    let schedules: Api<AgentSchedule> = Api::namespaced(ctx.client.clone(), namespace);
    let packs: Api<PersonaPack> = Api::namespaced(ctx.client.clone(), namespace);

    if !pack.spec.enabled {
        delete_all_children(&identities, &schedules, &name).await;
        let status = PersonaPackStatus {
            phase: PersonaPackPhase::Disabled,
            persona_count: pack.spec.personas.len() as u32,
            installed_count: 0,
            installed_personas: Vec::new(),
        };
        packs
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Merge(serde_json::json!({ "status": status })),
            )
            .await?;
        return Ok(Action::requeue(Duration::from_secs(300)));
    }

    let mut installed = Vec::new();
    for persona in pack.active_personas() {
        let identity = desired_identity(&pack, persona)?;
        let identity_name = identity.name_any();
        let applied = identities
            .patch(&identity_name, &PatchParams::apply(MANAGER).force(), &Patch::Apply(&identity))
            .await?;

        let schedule_name = match desired_schedule(&pack, persona)? {
            Some(schedule) => {
                let schedule_name = schedule.name_any();
                schedules
                    .patch(
                        &schedule_name,
                        &PatchParams::apply(MANAGER).force(),
                        &Patch::Apply(&schedule),
                    )
                    .await?;
                Some(schedule_name)
            }
            None => None,
        };

        if let Some(seed) = &persona.memory_seed {
            seed_memory(&ctx, namespace, &applied, seed).await?;
        }

        installed.push(InstalledPersona {
            persona: persona.name.clone(),
            identity_name,
            schedule_name,
        });
    }

    prune_children(&identities, &schedules, &name, &installed).await;

    let status = PersonaPackStatus {
        phase: PersonaPackPhase::Ready,
        persona_count: pack.spec.personas.len() as u32,
        installed_count: installed.len() as u32,
        installed_personas: installed,
    };
    packs
        .patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": status })),
        )
        .await?;

    Ok(Action::requeue(Duration::from_secs(120)))
}

/// Write the seed only when the store does not exist yet; installed
/// personas keep whatever memory they have accumulated.
async fn seed_memory(
    ctx: &Context,
    namespace: &str,
    identity: &Identity,
    seed: &str,
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
            name: Some(store_name),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        data: Some(BTreeMap::from([("MEMORY.md".to_string(), seed.to_string())])),
        ..Default::default()
    };
    match maps.create(&PostParams::default(), &store).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

async fn delete_all_children(
    identities: &Api<Identity>,
    schedules: &Api<AgentSchedule>,
    pack: &str,
) {
    let lp = ListParams::default().labels(&format!("{LABEL_PERSONA_PACK}={pack}"));
    let dp = DeleteParams::default();
    if let Ok(list) = schedules.list(&lp).await {
        for item in list {
            if let Some(name) = item.metadata.name.as_deref() {
                if let Err(err) = schedules.delete(name, &dp).await {
                    tracing::warn!(%pack, name, error = %err, "schedule delete failed");
                }
            }
        }
    }
    if let Ok(list) = identities.list(&lp).await {
        for item in list {
            if let Some(name) = item.metadata.name.as_deref() {
                tracing::info!(%pack, identity = name, "deleting stamped identity");
                if let Err(err) = identities.delete(name, &dp).await {
                    tracing::warn!(%pack, name, error = %err, "identity delete failed");
                }
            }
        }
    }
}

/// Delete children whose persona is no longer stamped (excluded or
/// removed from the pack).
async fn prune_children(
    identities: &Api<Identity>,
    schedules: &Api<AgentSchedule>,
    pack: &str,
    installed: &[InstalledPersona],
) {
    let lp = ListParams::default().labels(&format!("{LABEL_PERSONA_PACK}={pack}"));
    let dp = DeleteParams::default();
    if let Ok(list) = identities.list(&lp).await {
        for item in list {
            let Some(name) = item.metadata.name.as_deref() else { continue };
            if installed.iter().any(|i| i.identity_name == name) {
                continue;
            }
            tracing::info!(%pack, identity = name, "pruning excluded persona");
            if let Err(err) = identities.delete(name, &dp).await {
                tracing::warn!(%pack, name, error = %err, "identity prune failed");
            }
        }
    }
    if let Ok(list) = schedules.list(&lp).await {
        for item in list {
            let Some(name) = item.metadata.name.as_deref() else { continue };
            if installed.iter().any(|i| i.schedule_name.as_deref() == Some(name)) {
                continue;
            }
            if let Err(err) = schedules.delete(name, &dp).await {
                tracing::warn!(%pack, name, error = %err, "schedule prune failed");
            }
        }
    }
}

/// Drive the persona-pack controller until shutdown.
pub async fn run(ctx: Arc<Context>) {
    let packs: Api<PersonaPack> = Api::all(ctx.client.clone());
    let identities: Api<Identity> = Api::all(ctx.client.clone());
    let schedules: Api<AgentSchedule> = Api::all(ctx.client.clone());
    Controller::new(packs, watcher::Config::default())
        .owns(identities, watcher::Config::default())
        .owns(schedules, watcher::Config::default())
        .run(reconcile, super::error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                tracing::debug!(error = %err, "personapack controller event");
            }
        })
        .await;
}

#[cfg(test)]
#[path = "personapack_tests.rs"]
mod tests;
