// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus message envelope

use crate::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata key carrying the run the message belongs to.
pub const META_AGENT_RUN_ID: &str = "agentRunID";
/// Metadata key carrying the identity the message belongs to.
pub const META_INSTANCE_NAME: &str = "instanceName";

/// One message on the bus.
///
/// The payload is opaque to the bus and every adapter; producers and
/// consumers agree on its schema out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    /// Publish time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: &Topic, payload: impl Into<Vec<u8>>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            topic: topic.as_str(),
            timestamp_ms,
            metadata: HashMap::new(),
            payload: payload.into(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Payload interpreted as UTF-8, lossily.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
