// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the control plane.

use std::net::SocketAddr;

/// Event bus URL shared by the control plane and every bridge sidecar.
pub fn bus_url() -> String {
    std::env::var("EVENT_BUS_URL").unwrap_or_else(|_| "nats://nats:4222".to_string())
}

/// Namespace the control plane itself runs in; skill bundles authored
/// there are mirrored into execution namespaces on demand.
pub fn control_namespace() -> String {
    std::env::var("SYMPOZIUM_NAMESPACE").unwrap_or_else(|_| "sympozium-system".to_string())
}

/// Image registry for platform components.
pub fn image_registry() -> String {
    std::env::var("SYMPOZIUM_IMAGE_REGISTRY").unwrap_or_else(|_| "ghcr.io/sympozium".to_string())
}

/// Image tag for platform components.
pub fn image_tag() -> String {
    std::env::var("SYMPOZIUM_IMAGE_TAG").unwrap_or_else(|_| "latest".to_string())
}

/// Bind address for the admission webhook server.
pub fn admission_addr() -> SocketAddr {
    std::env::var("SYMPOZIUM_ADMISSION_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8443)))
}
