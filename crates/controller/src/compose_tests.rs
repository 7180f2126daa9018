// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sz_resources::{AgentRunSpec, IdentitySpec, SandboxSpec, SidecarResources};

fn images() -> ImageConfig {
    ImageConfig { registry: "reg.example.com/sz".into(), tag: "v1".into() }
}

fn basic_run() -> AgentRun {
    let mut run = AgentRun::new(
        "alice-x",
        AgentRunSpec { identity_ref: "alice".into(), task: "hi".into(), ..Default::default() },
    );
    run.metadata.namespace = Some("tenants".into());
    run
}

fn basic_identity() -> Identity {
    Identity::new(
        "alice",
        IdentitySpec {
            agent: sz_resources::AgentConfig { model: "m1".into(), ..Default::default() },
            credentials: vec![sz_resources::CredentialRef {
                provider: "anthropic".into(),
                secret_name: "s1".into(),
            }],
            ..Default::default()
        },
    )
}

fn build(run: &AgentRun, identity: &Identity, sidecars: &[ResolvedSidecar]) -> Job {
    let imgs = images();
    build_job(&JobParams {
        run,
        identity,
        memory_enabled: false,
        sidecars,
        images: &imgs,
        bus_url: "nats://nats:4222",
        service_account: "sympozium-agent",
        owner: None,
    })
}

fn container_names(job: &Job) -> Vec<String> {
    job.spec
        .as_ref()
        .unwrap()
        .template
        .spec
        .as_ref()
        .unwrap()
        .containers
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

#[test]
fn plain_run_has_agent_and_bridge_only() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    assert_eq!(container_names(&job), vec!["agent", "ipc-bridge"]);
}

#[test]
fn job_runs_one_pod_with_no_retries() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let spec = job.spec.as_ref().unwrap();
    assert_eq!(spec.backoff_limit, Some(0));
    assert!(spec.ttl_seconds_after_finished.is_some());
    let pod = spec.template.spec.as_ref().unwrap();
    assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
}

#[test]
fn default_deadline_is_timeout_plus_slack() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    assert_eq!(job.spec.as_ref().unwrap().active_deadline_seconds, Some(660));

    let mut run = basic_run();
    run.spec.timeout_seconds = Some(30);
    let job = build(&run, &basic_identity(), &[]);
    assert_eq!(job.spec.as_ref().unwrap().active_deadline_seconds, Some(90));
}

#[test]
fn pod_runs_as_non_root() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let sc = job
        .spec
        .as_ref()
        .unwrap()
        .template
        .spec
        .as_ref()
        .unwrap()
        .security_context
        .as_ref()
        .unwrap();
    assert_eq!(sc.run_as_user, Some(1000));
    assert_eq!(sc.fs_group, Some(1000));
}

#[test]
fn agent_container_is_hardened_and_resourced() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let agent = pod.containers.iter().find(|c| c.name == "agent").unwrap();
    let sc = agent.security_context.as_ref().unwrap();
    assert_eq!(sc.read_only_root_filesystem, Some(true));
    assert_eq!(sc.allow_privilege_escalation, Some(false));
    assert_eq!(sc.capabilities.as_ref().unwrap().drop.as_ref().unwrap(), &vec!["ALL".to_string()]);
    let res = agent.resources.as_ref().unwrap();
    assert_eq!(res.requests.as_ref().unwrap()["cpu"].0, "250m");
    assert_eq!(res.limits.as_ref().unwrap()["memory"].0, "1Gi");
}

#[test]
fn agent_env_carries_run_and_model() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let agent = pod.containers.iter().find(|c| c.name == "agent").unwrap();
    let env = agent.env.as_ref().unwrap();
    let get = |name: &str| {
        env.iter().find(|e| e.name == name).and_then(|e| e.value.as_deref())
    };
    assert_eq!(get("SYMPOZIUM_RUN_ID"), Some("alice-x"));
    assert_eq!(get("TASK"), Some("hi"));
    assert_eq!(get("MODEL_NAME"), Some("m1"));
    assert_eq!(get("MODEL_PROVIDER"), Some("anthropic"));
    // No sidecars: tools stay off.
    assert_eq!(get("TOOLS_ENABLED"), None);
}

#[test]
fn credential_secret_is_injected_via_env_from() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let agent = pod.containers.iter().find(|c| c.name == "agent").unwrap();
    let env_from = agent.env_from.as_ref().unwrap();
    assert_eq!(env_from[0].secret_ref.as_ref().unwrap().name, "s1");
}

#[test]
fn run_model_override_wins() {
    let mut run = basic_run();
    run.spec.model = Some(sz_resources::ModelSpec {
        provider: "other".into(),
        name: "m2".into(),
        ..Default::default()
    });
    let model = effective_model(&run, &basic_identity());
    assert_eq!(model.name, "m2");
    assert_eq!(model.provider, "other");
}

#[test]
fn bridge_mounts_only_ipc() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let bridge = pod.containers.iter().find(|c| c.name == "ipc-bridge").unwrap();
    let mounts = bridge.volume_mounts.as_ref().unwrap();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].name, VOLUME_IPC);
    let env = bridge.env.as_ref().unwrap();
    assert!(env.iter().any(|e| e.name == "EVENT_BUS_URL"));
    assert!(env.iter().any(|e| e.name == "AGENT_RUN_ID"));
}

#[test]
fn sandbox_sidecar_attaches_when_enabled() {
    let mut run = basic_run();
    run.spec.sandbox = Some(SandboxSpec { enabled: true, image: None });
    let job = build(&run, &basic_identity(), &[]);
    assert_eq!(container_names(&job), vec!["agent", "ipc-bridge", "sandbox"]);
    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let sandbox = pod.containers.iter().find(|c| c.name == "sandbox").unwrap();
    assert_eq!(sandbox.command.as_ref().unwrap(), &vec!["sleep".to_string(), "infinity".to_string()]);
    let mounts: Vec<_> =
        sandbox.volume_mounts.as_ref().unwrap().iter().map(|m| m.name.clone()).collect();
    assert_eq!(mounts, vec![VOLUME_WORKSPACE, VOLUME_TMP]);
}

fn ops_sidecar(mount_workspace: bool) -> ResolvedSidecar {
    ResolvedSidecar {
        pack: "ops".into(),
        spec: sz_resources::SidecarSpec {
            image: "kubectl:latest".into(),
            mount_workspace,
            resources: Some(SidecarResources { cpu: Some("2".into()), memory: None }),
            ..Default::default()
        },
    }
}

#[test]
fn skill_sidecars_enable_tools_and_mount_opt_in_workspace() {
    let mut run = basic_run();
    run.spec.skills = vec!["ops".into()];
    let job = build(&run, &basic_identity(), &[ops_sidecar(true)]);
    assert_eq!(container_names(&job), vec!["agent", "ipc-bridge", "skill-ops"]);

    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let agent = pod.containers.iter().find(|c| c.name == "agent").unwrap();
    let tools = agent
        .env
        .as_ref()
        .unwrap()
        .iter()
        .find(|e| e.name == "TOOLS_ENABLED")
        .and_then(|e| e.value.as_deref());
    assert_eq!(tools, Some("true"));

    let skill = pod.containers.iter().find(|c| c.name == "skill-ops").unwrap();
    let mounts: Vec<_> =
        skill.volume_mounts.as_ref().unwrap().iter().map(|m| m.name.clone()).collect();
    assert_eq!(mounts, vec![VOLUME_IPC, VOLUME_TMP, VOLUME_WORKSPACE]);
    let limits = skill.resources.as_ref().unwrap().limits.as_ref().unwrap();
    assert_eq!(limits["cpu"].0, "2");
    assert_eq!(limits["memory"].0, "512Mi");
}

#[test]
fn volumes_cover_workspace_ipc_tmp_and_skills() {
    let mut run = basic_run();
    run.spec.skills = vec!["ops".into(), "research".into()];
    let job = build(&run, &basic_identity(), &[]);
    let volumes = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap().volumes.as_ref().unwrap();
    let names: Vec<_> = volumes.iter().map(|v| v.name.clone()).collect();
    assert_eq!(names, vec![VOLUME_WORKSPACE, VOLUME_IPC, VOLUME_TMP, VOLUME_SKILLS]);

    let ipc = volumes.iter().find(|v| v.name == VOLUME_IPC).unwrap();
    let dir = ipc.empty_dir.as_ref().unwrap();
    assert_eq!(dir.medium.as_deref(), Some("Memory"));
    assert_eq!(dir.size_limit.as_ref().unwrap().0, "64Mi");

    let skills = volumes.iter().find(|v| v.name == VOLUME_SKILLS).unwrap();
    let sources = skills.projected.as_ref().unwrap().sources.as_ref().unwrap();
    let bundles: Vec<_> = sources
        .iter()
        .filter_map(|s| s.config_map.as_ref())
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(bundles, vec!["skillpack-ops", "skillpack-research"]);
}

#[test]
fn no_skills_yields_empty_projection() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let volumes = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap().volumes.as_ref().unwrap();
    let skills = volumes.iter().find(|v| v.name == VOLUME_SKILLS).unwrap();
    assert!(skills.projected.as_ref().unwrap().sources.as_ref().unwrap().is_empty());
}

#[test]
fn memory_volume_is_optional_configmap() {
    let run = basic_run();
    let identity = basic_identity();
    let imgs = images();
    let job = build_job(&JobParams {
        run: &run,
        identity: &identity,
        memory_enabled: true,
        sidecars: &[],
        images: &imgs,
        bus_url: "nats://nats:4222",
        service_account: "sympozium-agent",
        owner: None,
    });
    let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let memory = pod.volumes.as_ref().unwrap().iter().find(|v| v.name == VOLUME_MEMORY).unwrap();
    let cm = memory.config_map.as_ref().unwrap();
    assert_eq!(cm.name, "alice-memory");
    assert_eq!(cm.optional, Some(true));

    let agent = pod.containers.iter().find(|c| c.name == "agent").unwrap();
    let mem_mount = agent
        .volume_mounts
        .as_ref()
        .unwrap()
        .iter()
        .find(|m| m.name == VOLUME_MEMORY)
        .unwrap();
    assert_eq!(mem_mount.read_only, Some(true));
}

#[test]
fn composition_is_deterministic() {
    let mut run = basic_run();
    run.spec.skills = vec!["ops".into()];
    let identity = basic_identity();
    let a = build(&run, &identity, &[ops_sidecar(false)]);
    let b = build(&run, &identity, &[ops_sidecar(false)]);
    assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
}

#[test]
fn labels_are_consistent_across_job_and_template() {
    let job = build(&basic_run(), &basic_identity(), &[]);
    let job_labels = job.metadata.labels.as_ref().unwrap();
    let template_labels = job
        .spec
        .as_ref()
        .unwrap()
        .template
        .metadata
        .as_ref()
        .unwrap()
        .labels
        .as_ref()
        .unwrap();
    assert_eq!(job_labels, template_labels);
    assert_eq!(job_labels[sz_core::LABEL_AGENT_RUN], "alice-x");
    assert_eq!(job_labels[sz_core::LABEL_INSTANCE], "alice");
    assert_eq!(job_labels[sz_core::LABEL_COMPONENT], "agent-run");
}
