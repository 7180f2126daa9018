// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! szb: the per-pod IPC bridge sidecar.

use std::path::PathBuf;
use sz_bridge::{Bridge, BridgeConfig, BridgeError};
use sz_bus::NatsBus;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bus_url = env_or("EVENT_BUS_URL", "nats://nats:4222");
    let run_id = env_or("AGENT_RUN_ID", "");
    let instance = env_or("INSTANCE_NAME", "");
    let root = PathBuf::from(env_or("SYMPOZIUM_IPC_DIR", "/ipc"));

    let client_name = format!("szb-{run_id}");
    let bus = NatsBus::connect(&bus_url, &client_name).await?;
    let bridge = Bridge::new(BridgeConfig { root, run_id, instance }, bus);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    bridge.run(cancel).await
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            tracing::warn!(error = %err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = term.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
