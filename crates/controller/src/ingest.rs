// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus ingestion: external events that create or update resources.
//!
//! Gateways publish `channel.message.received` for every inbound chat
//! message; each message becomes a run against the addressed identity.
//! The API tier publishes `schedule.upsert` to declare schedules without
//! talking to the resource registry itself.

use crate::context::Context;
use crate::error::Error;
use kube::api::{Api, Patch, PatchParams, PostParams};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sz_bus::{BusMessage, Topic};
use sz_resources::{AgentRun, AgentRunSpec, AgentSchedule, AgentScheduleSpec, ConcurrencyPolicy};

const MANAGER: &str = "sympozium-ingest";

/// Payload schema of an inbound channel message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub instance: String,
    pub namespace: String,
    pub channel: String,
    #[serde(default)]
    pub sender: String,
    pub text: String,
    /// Conversation key; messages in one conversation share a session.
    #[serde(default)]
    pub session: String,
}

/// Payload schema of a schedule upsert.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpsert {
    pub name: String,
    pub namespace: String,
    pub identity: String,
    pub cron: String,
    pub task: String,
    #[serde(default)]
    pub suspend: bool,
    #[serde(default)]
    pub include_memory: bool,
}

/// Build the run for one inbound message. The suffix keeps concurrent
/// messages from colliding.
pub fn build_message_run(message: &ChannelMessage, suffix: &str) -> AgentRun {
    let name = sz_core::sanitize_name(&format!("{}-msg-{}", message.instance, suffix));
    let mut run = AgentRun::new(
        &name,
        AgentRunSpec {
            identity_ref: message.instance.clone(),
            session_key: message.session.clone(),
            task: message.text.clone(),
            ..Default::default()
        },
    );
    run.metadata.namespace = Some(message.namespace.clone());
    let labels = run.metadata.labels.get_or_insert_with(Default::default);
    labels.insert(sz_core::LABEL_INSTANCE.to_string(), message.instance.clone());
    labels.insert(sz_core::LABEL_CHANNEL.to_string(), message.channel.clone());
    run
}

/// Build the declared schedule for an upsert.
pub fn build_upserted_schedule(upsert: &ScheduleUpsert) -> AgentSchedule {
    let mut schedule = AgentSchedule::new(
        &sz_core::sanitize_name(&upsert.name),
        AgentScheduleSpec {
            identity_ref: upsert.identity.clone(),
            cron: upsert.cron.clone(),
            task: upsert.task.clone(),
            suspend: upsert.suspend,
            concurrency_policy: ConcurrencyPolicy::Forbid,
            include_memory: upsert.include_memory,
            ..Default::default()
        },
    );
    schedule.metadata.namespace = Some(upsert.namespace.clone());
    schedule
}

async fn handle_message(ctx: &Context, msg: &BusMessage) -> Result<(), Error> {
    let message: ChannelMessage = serde_json::from_slice(&msg.payload)?;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let run = build_message_run(&message, &suffix[..8]);
    let name = run.metadata.name.clone().unwrap_or_default();

    let runs: Api<AgentRun> = Api::namespaced(ctx.client.clone(), &message.namespace);
    match runs.create(&PostParams::default(), &run).await {
        Ok(_) => {
            tracing::info!(
                run = %name,
                instance = %message.instance,
                channel = %message.channel,
                "run created for inbound message"
            );
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

async fn handle_upsert(ctx: &Context, msg: &BusMessage) -> Result<(), Error> {
    let upsert: ScheduleUpsert = serde_json::from_slice(&msg.payload)?;
    let schedule = build_upserted_schedule(&upsert);
    let name = schedule.metadata.name.clone().unwrap_or_default();

    let schedules: Api<AgentSchedule> = Api::namespaced(ctx.client.clone(), &upsert.namespace);
    schedules
        .patch(&name, &PatchParams::apply(MANAGER).force(), &Patch::Apply(&schedule))
        .await?;
    tracing::info!(schedule = %name, identity = %upsert.identity, "schedule upserted from bus");
    Ok(())
}

/// Consume inbound channel messages until shutdown, re-subscribing on
/// bus failure.
pub async fn run_messages(ctx: Arc<Context>) {
    let topic = Topic::ChannelMessageReceived;
    loop {
        let mut sub = match ctx.bus.subscribe(&topic).await {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(%topic, error = %err, "subscription failed, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        while let Some(msg) = sub.recv().await {
            if let Err(err) = handle_message(&ctx, &msg).await {
                tracing::warn!(%topic, error = %err, "channel message dropped");
            }
        }
        tracing::warn!(%topic, "subscription ended, re-subscribing");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Consume schedule upserts until shutdown, re-subscribing on bus
/// failure.
pub async fn run_upserts(ctx: Arc<Context>) {
    let topic = Topic::ScheduleUpsert;
    loop {
        let mut sub = match ctx.bus.subscribe(&topic).await {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(%topic, error = %err, "subscription failed, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        while let Some(msg) = sub.recv().await {
            if let Err(err) = handle_upsert(&ctx, &msg).await {
                tracing::warn!(%topic, error = %err, "schedule upsert dropped");
            }
        }
        tracing::warn!(%topic, "subscription ended, re-subscribing");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
