// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-drop ↔ bus translation.
//!
//! Outbound: drops under `output/`, `spawn/`, `tools/` and `messages/`
//! become bus messages carrying the file bytes verbatim. Inbound:
//! follow-up and tool-result messages become file drops under `input/`
//! and `tools/`. The bridge never interprets payload schemas.

use crate::watcher::{DirWatcher, FileEvent};
use crate::BridgeError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use sz_bus::{BusMessage, EventBus, Topic, META_AGENT_RUN_ID, META_INSTANCE_NAME};
use tokio_util::sync::CancellationToken;

pub const SUBDIRS: [&str; 5] = ["input", "output", "spawn", "tools", "messages"];

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Root of the shared ipc volume, `/ipc` in the pod.
    pub root: PathBuf,
    pub run_id: String,
    pub instance: String,
}

/// Where a file drop is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Publish(Topic),
    /// Bridge-written or unknown files; never republished.
    Ignore,
}

/// Classify a dropped file by its subdirectory and name.
pub fn classify(root: &Path, path: &Path) -> Classified {
    let Ok(rel) = path.strip_prefix(root) else {
        return Classified::Ignore;
    };
    let mut parts = rel.components().filter_map(|c| c.as_os_str().to_str());
    let (Some(dir), Some(name)) = (parts.next(), parts.next()) else {
        return Classified::Ignore;
    };
    if parts.next().is_some() {
        return Classified::Ignore;
    }
    let topic = match dir {
        "output" => match name {
            "result.json" => Topic::RunCompleted,
            "status.json" => Topic::StatusUpdate,
            _ if name.starts_with("stream-") => Topic::StreamChunk,
            _ => return Classified::Ignore,
        },
        "spawn" => Topic::SpawnRequest,
        "tools" if name.starts_with("exec-request") => Topic::ToolExecRequest,
        "messages" => Topic::ChannelMessageSend,
        _ => return Classified::Ignore,
    };
    Classified::Publish(topic)
}

pub struct Bridge<B> {
    config: BridgeConfig,
    bus: B,
}

impl<B: EventBus> Bridge<B> {
    pub fn new(config: BridgeConfig, bus: B) -> Self {
        Self { config, bus }
    }

    /// Run until the token is cancelled. Does not buffer unsent messages
    /// across restarts; the agent container is expected to retry.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        self.ensure_subdirs()?;

        let (_watcher, mut files) = DirWatcher::watch(&self.config.root)?;
        let mut followups = self
            .bus
            .subscribe(&Topic::Followup(self.config.run_id.clone()))
            .await?;
        let mut tool_results = self
            .bus
            .subscribe(&Topic::ToolExecResultFor(self.config.run_id.clone()))
            .await?;

        // Files are write-once per message; one publish per path even when
        // the watcher surfaces both halves of a coalesced create+write.
        let mut published: HashSet<PathBuf> = HashSet::new();

        tracing::info!(
            root = %self.config.root.display(),
            run_id = %self.config.run_id,
            "bridge running"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("bridge shutting down");
                    return Ok(());
                }
                event = files.recv() => {
                    let Some(event) = event else { return Err(BridgeError::WatcherClosed) };
                    self.handle_drop(event, &mut published).await;
                }
                msg = followups.recv() => {
                    let Some(msg) = msg else { return Err(BridgeError::Bus(sz_bus::BusError::Closed)) };
                    self.write_inbound("input", "followup", &msg);
                }
                msg = tool_results.recv() => {
                    let Some(msg) = msg else { return Err(BridgeError::Bus(sz_bus::BusError::Closed)) };
                    self.write_inbound("tools", "exec-result", &msg);
                }
            }
        }
    }

    fn ensure_subdirs(&self) -> Result<(), BridgeError> {
        for sub in SUBDIRS {
            let dir = self.config.root.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| BridgeError::io(&dir, e))?;
        }
        Ok(())
    }

    async fn handle_drop(&self, event: FileEvent, published: &mut HashSet<PathBuf>) {
        let Classified::Publish(topic) = classify(&self.config.root, &event.path) else {
            return;
        };
        if published.contains(&event.path) {
            return;
        }
        let bytes = match std::fs::read(&event.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %event.path.display(), error = %err, "unreadable drop, skipping");
                return;
            }
        };
        let message = BusMessage::new(&topic, bytes)
            .with_meta(META_AGENT_RUN_ID, self.config.run_id.clone())
            .with_meta(META_INSTANCE_NAME, self.config.instance.clone());
        match self.bus.publish(message).await {
            Ok(()) => {
                published.insert(event.path.clone());
                tracing::debug!(path = %event.path.display(), %topic, "drop published");
            }
            Err(err) => {
                // Not marked published: a later write event retries.
                tracing::warn!(path = %event.path.display(), %topic, error = %err, "publish failed");
            }
        }
    }

    fn write_inbound(&self, subdir: &str, prefix: &str, msg: &BusMessage) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = self.config.root.join(subdir).join(format!("{prefix}-{nanos}.json"));
        if let Err(err) = std::fs::write(&path, &msg.payload) {
            tracing::warn!(path = %path.display(), error = %err, "inbound write failed");
        } else {
            tracing::debug!(path = %path.display(), topic = %msg.topic, "inbound message written");
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
