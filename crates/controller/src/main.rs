// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! szd: the Sympozium control plane.

use kube::Client;
use std::sync::Arc;
use sz_bus::NatsBus;
use sz_controller::{admission, env, health, ingest, reconcilers, spawn, Context};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = Client::try_default().await?;
    let bus_url = env::bus_url();
    let bus = NatsBus::connect(&bus_url, "szd").await?;
    let ctx = Arc::new(Context::new(client, Arc::new(bus)));

    tracing::info!(
        bus = %bus_url,
        control_namespace = %ctx.control_namespace,
        "control plane starting"
    );

    let admission_addr = env::admission_addr();
    let listener = tokio::net::TcpListener::bind(admission_addr).await?;
    tracing::info!(addr = %admission_addr, "admission server listening");
    let admission_router = admission::router(ctx.clone());

    tokio::select! {
        _ = reconcilers::run::run(ctx.clone()) => {}
        _ = reconcilers::identity::run(ctx.clone()) => {}
        _ = reconcilers::schedule::run(ctx.clone()) => {}
        _ = reconcilers::skillpack::run(ctx.clone()) => {}
        _ = reconcilers::personapack::run(ctx.clone()) => {}
        _ = spawn::run(ctx.clone()) => {}
        _ = health::run(ctx.clone()) => {}
        _ = ingest::run_messages(ctx.clone()) => {}
        _ = ingest::run_upserts(ctx.clone()) => {}
        result = async { axum::serve(listener, admission_router).await } => {
            if let Err(err) = result {
                tracing::error!(error = %err, "admission server failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
