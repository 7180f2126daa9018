// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared reconciler context

use crate::env;
use kube::Client;
use std::sync::Arc;
use sz_bus::EventBus;
use sz_core::{Clock, SystemClock};

/// Derives `<registry>/<component>:<tag>` default images.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub registry: String,
    pub tag: String,
}

impl ImageConfig {
    pub fn from_env() -> Self {
        Self { registry: env::image_registry(), tag: env::image_tag() }
    }

    pub fn component(&self, component: &str) -> String {
        format!("{}/{}:{}", self.registry, component, self.tag)
    }

    /// Default agent container image.
    pub fn agent(&self) -> String {
        self.component("agent")
    }

    /// Bridge sidecar image.
    pub fn bridge(&self) -> String {
        self.component("bridge")
    }

    /// Default sandbox image when a run enables one without naming it.
    pub fn sandbox(&self) -> String {
        self.component("sandbox")
    }

    /// Gateway image for a channel type.
    pub fn gateway(&self, channel: &str) -> String {
        self.component(&format!("gateway-{channel}"))
    }
}

/// State shared by every reconciler in the process.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub bus: Arc<dyn EventBus>,
    pub images: ImageConfig,
    pub bus_url: String,
    pub control_namespace: String,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    pub fn new(client: Client, bus: Arc<dyn EventBus>) -> Self {
        Self {
            client,
            bus,
            images: ImageConfig::from_env(),
            bus_url: env::bus_url(),
            control_namespace: env::control_namespace(),
            clock: Arc::new(SystemClock),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
