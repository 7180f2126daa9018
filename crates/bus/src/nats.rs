// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS JetStream bus backend.
//!
//! One stream (`SYMPOZIUM`) captures every `sympozium.*` subject. Each
//! subscription is a durable pull consumer, so a subscriber that
//! reconnects under the same name resumes where it left off. Messages are
//! acked only after they have been handed to the subscriber channel,
//! which keeps delivery at-least-once.

use crate::{BusError, BusMessage, BusSubscription, EventBus, Topic};
use async_nats::jetstream::consumer::{pull, PullConsumer};
use async_nats::jetstream::{self, stream};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const STREAM_NAME: &str = "SYMPOZIUM";
const SUBJECT_PREFIX: &str = "sympozium";
const SUBSCRIBER_BUFFER: usize = 64;

pub struct NatsBus {
    jetstream: jetstream::Context,
    /// Stable prefix for durable consumer names.
    client_name: String,
    subscription_seq: Arc<AtomicU64>,
}

impl NatsBus {
    /// Connect and ensure the platform stream exists.
    pub async fn connect(url: &str, client_name: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        let jetstream = jetstream::new(client);
        jetstream
            .get_or_create_stream(stream::Config {
                name: STREAM_NAME.to_string(),
                subjects: vec![format!("{SUBJECT_PREFIX}.>")],
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self {
            jetstream,
            client_name: client_name.to_string(),
            subscription_seq: Arc::new(AtomicU64::new(0)),
        })
    }

    fn subject(topic: &str) -> String {
        format!("{SUBJECT_PREFIX}.{topic}")
    }

    fn durable_name(&self, topic: &str) -> String {
        // NATS durable names may not contain dots.
        let seq = self.subscription_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", self.client_name, topic.replace('.', "-"), seq)
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let subject = Self::subject(&message.topic);
        let bytes = serde_json::to_vec(&message)
            .map_err(|e| BusError::Unavailable(format!("envelope encoding failed: {e}")))?;
        let ack = self
            .jetstream
            .publish(subject, bytes.into())
            .await
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        ack.await.map_err(|e| BusError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<BusSubscription, BusError> {
        let topic_str = topic.as_str();
        let subject = Self::subject(&topic_str);
        let stream = self
            .jetstream
            .get_stream(STREAM_NAME)
            .await
            .map_err(|e| BusError::Subscribe { topic: topic_str.clone(), reason: e.to_string() })?;
        let consumer: PullConsumer = stream
            .create_consumer(pull::Config {
                durable_name: Some(self.durable_name(&topic_str)),
                filter_subject: subject,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Subscribe { topic: topic_str.clone(), reason: e.to_string() })?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        tokio::spawn(pump(consumer, tx, topic_str));
        Ok(BusSubscription::new(rx))
    }
}

/// Forward broker messages into the subscriber channel, acking after each
/// successful hand-off. Ends when the subscriber goes away or the broker
/// stream errors (the subscriber re-subscribes on its own schedule).
async fn pump(consumer: PullConsumer, tx: mpsc::Sender<BusMessage>, topic: String) {
    let mut messages = match consumer.messages().await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(%topic, error = %err, "consumer stream failed to open");
            return;
        }
    };
    while let Some(next) = messages.next().await {
        let raw = match next {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(%topic, error = %err, "consumer stream error, ending subscription");
                return;
            }
        };
        let parsed = match serde_json::from_slice::<BusMessage>(&raw.payload) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%topic, error = %err, "discarding undecodable bus message");
                let _ = raw.ack().await;
                continue;
            }
        };
        if tx.send(parsed).await.is_err() {
            // Subscriber gone; leave the message unacked for redelivery.
            return;
        }
        if let Err(err) = raw.ack().await {
            tracing::warn!(%topic, error = %err, "ack failed, message may be redelivered");
        }
    }
}
