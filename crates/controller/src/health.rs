// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway health aggregation: fold `channel.health.update` messages into
//! identity status.

use crate::context::Context;
use crate::error::Error;
use kube::api::{Api, Patch, PatchParams};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sz_bus::{BusMessage, Topic};
use sz_resources::Identity;

/// Payload schema of a gateway health report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthUpdate {
    pub instance: String,
    pub namespace: String,
    pub channel: String,
    /// Free-form connection state, e.g. `connected`, `degraded`.
    pub status: String,
}

async fn handle(ctx: &Context, msg: &BusMessage) -> Result<(), Error> {
    let update: HealthUpdate = serde_json::from_slice(&msg.payload)?;
    let identities: Api<Identity> = Api::namespaced(ctx.client.clone(), &update.namespace);
    let mut channels = serde_json::Map::new();
    channels.insert(update.channel.clone(), serde_json::Value::String(update.status.clone()));
    let patch = serde_json::json!({ "status": { "channels": channels } });
    identities
        .patch_status(&update.instance, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    tracing::debug!(
        instance = %update.instance,
        channel = %update.channel,
        status = %update.status,
        "channel health recorded"
    );
    Ok(())
}

/// Consume health updates until shutdown, re-subscribing on bus failure.
pub async fn run(ctx: Arc<Context>) {
    loop {
        let mut sub = match ctx.bus.subscribe(&Topic::ChannelHealthUpdate).await {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(error = %err, "health subscription failed, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        while let Some(msg) = sub.recv().await {
            if let Err(err) = handle(&ctx, &msg).await {
                tracing::debug!(error = %err, "health update dropped");
            }
        }
        tracing::warn!("health subscription ended, re-subscribing");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
