// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process bus backend.
//!
//! Semantics match `NatsBus` minus durability: per-subscriber channels,
//! per-topic publish order, no replay after restart. Backs the test suite
//! and single-process development setups.

use crate::{BusError, BusMessage, BusSubscription, EventBus, Topic};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Clone, Default)]
pub struct MemoryBus {
    subscribers: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let targets: Vec<mpsc::Sender<BusMessage>> = {
            let subs = self.subscribers.lock();
            subs.get(&message.topic).cloned().unwrap_or_default()
        };
        let mut dead = false;
        for tx in &targets {
            if tx.send(message.clone()).await.is_err() {
                dead = true;
            }
        }
        if dead {
            let mut subs = self.subscribers.lock();
            if let Some(list) = subs.get_mut(&message.topic) {
                list.retain(|tx| !tx.is_closed());
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<BusSubscription, BusError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().entry(topic.as_str()).or_default().push(tx);
        Ok(BusSubscription::new(rx))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
