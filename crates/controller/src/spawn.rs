// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sub-agent spawning: turn `agent.spawn.request` bus messages into run
//! objects.
//!
//! A spawn request originates as a file drop in the parent pod's `spawn/`
//! directory; the bridge forwards it verbatim. Spawned runs are
//! indistinguishable from user-created ones except for the `parent`
//! field. Depth is the only coupling, and the policy gate enforces it
//! like any other run.

use crate::context::Context;
use crate::error::Error;
use kube::api::{Api, PostParams};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sz_bus::{BusMessage, Topic, META_AGENT_RUN_ID};
use sz_resources::{AgentRun, AgentRunSpec, ParentRef};

/// Payload schema of a spawn request drop.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    pub instance: String,
    pub namespace: String,
    pub task: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub depth: u32,
}

/// Build the child run for a spawn request. The suffix keeps sibling
/// spawns from colliding.
pub fn build_spawned_run(
    request: &SpawnRequest,
    parent_run: &str,
    suffix: &str,
) -> AgentRun {
    let name = sz_core::sanitize_name(&format!("{}-spawn-{}", request.instance, suffix));
    let mut run = AgentRun::new(
        &name,
        AgentRunSpec {
            identity_ref: request.instance.clone(),
            session_key: request.session.clone(),
            parent: Some(ParentRef {
                run: parent_run.to_string(),
                session: request.session.clone(),
                depth: request.depth.max(1),
            }),
            task: request.task.clone(),
            system_prompt: request.system_prompt.clone(),
            skills: request.skills.clone(),
            ..Default::default()
        },
    );
    run.metadata.namespace = Some(request.namespace.clone());
    run
}

async fn handle(ctx: &Context, msg: &BusMessage) -> Result<(), Error> {
    let request: SpawnRequest = serde_json::from_slice(&msg.payload)?;
    let parent = msg.meta(META_AGENT_RUN_ID).unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let run = build_spawned_run(&request, parent, &suffix[..8]);
    let name = run.metadata.name.clone().unwrap_or_default();

    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), &request.namespace);
    match runs.create(&PostParams::default(), &run).await {
        Ok(_) => {
            tracing::info!(run = %name, parent = %parent, depth = request.depth, "spawned sub-agent run");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Consume spawn requests until shutdown, re-subscribing on bus failure.
pub async fn run(ctx: Arc<Context>) {
    loop {
        let mut sub = match ctx.bus.subscribe(&Topic::SpawnRequest).await {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(error = %err, "spawn subscription failed, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        while let Some(msg) = sub.recv().await {
            if let Err(err) = handle(&ctx, &msg).await {
                tracing::warn!(error = %err, "spawn request dropped");
            }
        }
        tracing::warn!("spawn subscription ended, re-subscribing");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
