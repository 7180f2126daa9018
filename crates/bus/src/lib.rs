// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sz-bus: publish/subscribe over a durable topic broker.
//!
//! The control plane and every bridge sidecar speak through this adapter.
//! Delivery is at-least-once; subscriptions are durable and replayable on
//! reconnect. `NatsBus` is the production backend (JetStream); `MemoryBus`
//! backs tests and single-process setups.

mod error;
mod memory;
mod message;
mod nats;
mod topic;

pub use error::BusError;
pub use memory::MemoryBus;
pub use message::{BusMessage, META_AGENT_RUN_ID, META_INSTANCE_NAME};
pub use nats::NatsBus;
pub use topic::Topic;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A stream of messages delivered to one subscriber.
///
/// Dropping the subscription cancels delivery; the backing pump observes
/// the closed channel and stops.
pub struct BusSubscription {
    rx: mpsc::Receiver<BusMessage>,
}

impl BusSubscription {
    pub(crate) fn new(rx: mpsc::Receiver<BusMessage>) -> Self {
        Self { rx }
    }

    /// Next message, or `None` once the bus side has shut down.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }
}

/// Abstract publish/subscribe over a durable topic broker.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one message. Connection loss surfaces as
    /// [`BusError::Unavailable`].
    async fn publish(&self, message: BusMessage) -> Result<(), BusError>;

    /// Open a per-subscriber channel on a topic. Subscribers are expected
    /// to call `subscribe` again after a failure.
    async fn subscribe(&self, topic: &Topic) -> Result<BusSubscription, BusError>;
}
