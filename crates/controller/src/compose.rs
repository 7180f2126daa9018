// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job spec construction for agent runs.
//!
//! `build_job` is a pure function from a run plus its resolved inputs to
//! the full container/volume graph: agent container, bridge sidecar,
//! optional sandbox, one sidecar per skill pack, projected skill volumes,
//! optional memory volume, and the ephemeral workspace/ipc/tmp volumes.
//! Given identical inputs the produced spec differs only in the labels
//! carrying the run name.

use crate::context::ImageConfig;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapProjection, ConfigMapVolumeSource, Container, EmptyDirVolumeSource,
    EnvFromSource, EnvVar, PodSecurityContext, PodSpec, PodTemplateSpec, ProjectedVolumeSource,
    ResourceRequirements, SecretEnvSource, SecurityContext, Volume, VolumeMount, VolumeProjection,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;
use sz_core::{LABEL_AGENT_RUN, LABEL_COMPONENT, LABEL_INSTANCE};
use sz_resources::{AgentRun, Identity, ModelSpec, SidecarSpec};

/// Grace period added to the run timeout for pod setup/teardown.
const DEADLINE_SLACK_SECS: u64 = 60;
/// Seconds a finished job lingers before automatic cleanup.
const JOB_TTL_SECS: i32 = 300;

const AGENT_UID: i64 = 1000;

pub const VOLUME_WORKSPACE: &str = "workspace";
pub const VOLUME_SKILLS: &str = "skills";
pub const VOLUME_IPC: &str = "ipc";
pub const VOLUME_TMP: &str = "tmp";
pub const VOLUME_MEMORY: &str = "memory";

/// A skill pack sidecar resolved against its SkillPack object.
#[derive(Debug, Clone)]
pub struct ResolvedSidecar {
    pub pack: String,
    pub spec: SidecarSpec,
}

pub struct JobParams<'a> {
    pub run: &'a AgentRun,
    pub identity: &'a Identity,
    pub memory_enabled: bool,
    pub sidecars: &'a [ResolvedSidecar],
    pub images: &'a ImageConfig,
    pub bus_url: &'a str,
    pub service_account: &'a str,
    /// Owner reference binding the job to its run; `None` in dry builds.
    pub owner: Option<OwnerReference>,
}

/// Labels applied consistently to the job, the pod template, and thereby
/// the pod.
pub fn run_labels(run_name: &str, instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_AGENT_RUN.to_string(), run_name.to_string()),
        (LABEL_INSTANCE.to_string(), instance.to_string()),
        (LABEL_COMPONENT.to_string(), "agent-run".to_string()),
    ])
}

/// Model for the run: the run-level override wins over identity defaults.
pub fn effective_model(run: &AgentRun, identity: &Identity) -> ModelSpec {
    if let Some(model) = &run.spec.model {
        return model.clone();
    }
    ModelSpec {
        provider: "anthropic".to_string(),
        name: identity.spec.agent.model.clone(),
        base_url: identity.spec.agent.base_url.clone(),
        thinking_level: identity.spec.agent.thinking_level.clone(),
    }
}

/// Build the Job for one run. One pod, no retries.
pub fn build_job(params: &JobParams<'_>) -> Job {
    let run_name = params.run.metadata.name.clone().unwrap_or_default();
    let namespace = params.run.metadata.namespace.clone();
    let labels = run_labels(&run_name, &params.run.spec.identity_ref);

    let timeout = params.run.effective_timeout().as_secs();
    let deadline = (timeout + DEADLINE_SLACK_SECS) as i64;

    let mut containers = vec![agent_container(params), bridge_container(params, &run_name)];
    if params.run.spec.sandbox.as_ref().is_some_and(|s| s.enabled) {
        containers.push(sandbox_container(params));
    }
    for sidecar in params.sidecars {
        containers.push(skill_container(sidecar));
    }

    Job {
        metadata: ObjectMeta {
            name: Some(run_name.clone()),
            namespace,
            labels: Some(labels.clone()),
            owner_references: params.owner.clone().map(|o| vec![o]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            ttl_seconds_after_finished: Some(JOB_TTL_SECS),
            active_deadline_seconds: Some(deadline),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    service_account_name: Some(params.service_account.to_string()),
                    security_context: Some(PodSecurityContext {
                        run_as_user: Some(AGENT_UID),
                        run_as_non_root: Some(true),
                        fs_group: Some(AGENT_UID),
                        ..Default::default()
                    }),
                    containers,
                    volumes: Some(build_volumes(params)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn agent_container(params: &JobParams<'_>) -> Container {
    let run = params.run;
    let model = effective_model(run, params.identity);

    let mut env = vec![
        env_var("SYMPOZIUM_RUN_ID", run.metadata.name.as_deref().unwrap_or_default()),
        env_var("AGENT_ID", &run.spec.agent_id),
        env_var("SESSION_KEY", &run.spec.session_key),
        env_var("TASK", &run.spec.task),
        env_var("MODEL_PROVIDER", &model.provider),
        env_var("MODEL_NAME", &model.name),
    ];
    if let Some(prompt) = &run.spec.system_prompt {
        env.push(env_var("SYSTEM_PROMPT", prompt));
    }
    if let Some(base_url) = &model.base_url {
        env.push(env_var("MODEL_BASE_URL", base_url));
    }
    if let Some(thinking) = &model.thinking_level {
        env.push(env_var("MODEL_THINKING", thinking));
    }
    if let Some(gating) = &run.spec.tool_gating {
        env.push(env_var("TOOL_GATING", gating));
    }
    if !params.sidecars.is_empty() {
        env.push(env_var("TOOLS_ENABLED", "true"));
    }

    let env_from = params.identity.primary_credential().map(|secret| {
        vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret.to_string(),
                optional: Some(false),
            }),
            ..Default::default()
        }]
    });

    let mut mounts = vec![
        mount(VOLUME_WORKSPACE, "/workspace", false),
        mount(VOLUME_SKILLS, "/skills", true),
        mount(VOLUME_IPC, "/ipc", false),
        mount(VOLUME_TMP, "/tmp", false),
    ];
    if params.memory_enabled {
        mounts.push(mount(VOLUME_MEMORY, "/memory", true));
    }

    Container {
        name: "agent".to_string(),
        image: Some(params.images.agent()),
        env: Some(env),
        env_from,
        volume_mounts: Some(mounts),
        security_context: Some(hardened()),
        resources: Some(resources("250m", "512Mi", "1000m", "1Gi")),
        ..Default::default()
    }
}

fn bridge_container(params: &JobParams<'_>, run_name: &str) -> Container {
    Container {
        name: "ipc-bridge".to_string(),
        image: Some(params.images.bridge()),
        env: Some(vec![
            env_var("EVENT_BUS_URL", params.bus_url),
            env_var("AGENT_RUN_ID", run_name),
            env_var("INSTANCE_NAME", &params.run.spec.identity_ref),
            env_var("SYMPOZIUM_IPC_DIR", "/ipc"),
        ]),
        volume_mounts: Some(vec![mount(VOLUME_IPC, "/ipc", false)]),
        security_context: Some(hardened()),
        resources: Some(resources("50m", "64Mi", "200m", "128Mi")),
        ..Default::default()
    }
}

fn sandbox_container(params: &JobParams<'_>) -> Container {
    let image = params
        .run
        .spec
        .sandbox
        .as_ref()
        .and_then(|s| s.image.clone())
        .unwrap_or_else(|| params.images.sandbox());
    Container {
        name: "sandbox".to_string(),
        image: Some(image),
        command: Some(vec!["sleep".to_string(), "infinity".to_string()]),
        volume_mounts: Some(vec![
            mount(VOLUME_WORKSPACE, "/workspace", false),
            mount(VOLUME_TMP, "/tmp", false),
        ]),
        security_context: Some(hardened()),
        ..Default::default()
    }
}

fn skill_container(sidecar: &ResolvedSidecar) -> Container {
    let spec = &sidecar.spec;
    let env: Vec<EnvVar> = spec.env.iter().map(|(k, v)| env_var(k, v)).collect();

    let mut mounts = vec![mount(VOLUME_IPC, "/ipc", false), mount(VOLUME_TMP, "/tmp", false)];
    if spec.mount_workspace {
        mounts.push(mount(VOLUME_WORKSPACE, "/workspace", false));
    }

    let (req_cpu, req_mem) = ("100m", "128Mi");
    let (lim_cpu, lim_mem) = match &spec.resources {
        Some(r) => (r.cpu.as_deref().unwrap_or("500m"), r.memory.as_deref().unwrap_or("512Mi")),
        None => ("500m", "512Mi"),
    };

    Container {
        name: format!("skill-{}", sidecar.pack),
        image: Some(spec.image.clone()),
        command: spec.command.clone(),
        env: if env.is_empty() { None } else { Some(env) },
        volume_mounts: Some(mounts),
        security_context: Some(hardened()),
        resources: Some(resources(req_cpu, req_mem, lim_cpu, lim_mem)),
        ..Default::default()
    }
}

fn build_volumes(params: &JobParams<'_>) -> Vec<Volume> {
    let mut volumes = vec![
        empty_dir(VOLUME_WORKSPACE, "1Gi", false),
        empty_dir(VOLUME_IPC, "64Mi", true),
        empty_dir(VOLUME_TMP, "256Mi", false),
        skills_volume(&params.run.spec.skills),
    ];
    if params.memory_enabled {
        volumes.push(Volume {
            name: VOLUME_MEMORY.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: sz_core::memory_store_name(&params.run.spec.identity_ref),
                // A missing store must not block pod startup.
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    volumes
}

/// Projection over every referenced materialized bundle. With no skills
/// the projection is empty and the mount is just an empty directory.
fn skills_volume(skills: &[String]) -> Volume {
    let sources: Vec<VolumeProjection> = skills
        .iter()
        .map(|pack| VolumeProjection {
            config_map: Some(ConfigMapProjection {
                name: sz_core::bundle_name(pack),
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();
    Volume {
        name: VOLUME_SKILLS.to_string(),
        projected: Some(ProjectedVolumeSource { sources: Some(sources), ..Default::default() }),
        ..Default::default()
    }
}

fn empty_dir(name: &str, size: &str, in_memory: bool) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: in_memory.then(|| "Memory".to_string()),
            size_limit: Some(Quantity(size.to_string())),
        }),
        ..Default::default()
    }
}

fn hardened() -> SecurityContext {
    SecurityContext {
        read_only_root_filesystem: Some(true),
        allow_privilege_escalation: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn resources(req_cpu: &str, req_mem: &str, lim_cpu: &str, lim_mem: &str) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(req_cpu.to_string())),
            ("memory".to_string(), Quantity(req_mem.to_string())),
        ])),
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(lim_cpu.to_string())),
            ("memory".to_string(), Quantity(lim_mem.to_string())),
        ])),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}

fn mount(name: &str, path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: read_only.then_some(true),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
