// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The long-lived agent identity record.
//!
//! An Identity binds channels, model defaults, skills, policy, credentials
//! and persistent memory to a tenant-scoped name. The identity reconciler
//! drives it into per-channel gateway deployments and a memory store; runs
//! reference it for everything they do not override.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sympozium.dev",
    version = "v1alpha1",
    kind = "Identity",
    plural = "identities",
    shortname = "id",
    status = "IdentityStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Active","type":"integer","jsonPath":".status.activeRuns"}"#,
    printcolumn = r#"{"name":"Total","type":"integer","jsonPath":".status.totalRuns"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySpec {
    /// Chat channels this identity is reachable on.
    #[serde(default)]
    pub channels: Vec<ChannelBinding>,
    /// Default agent configuration, overridable per run.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Ordered skill pack references, resolved by name in the same
    /// namespace (control-plane bundles are mirrored on demand).
    #[serde(default)]
    pub skills: Vec<String>,
    /// Governance policy applied to runs of this identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_ref: Option<String>,
    /// Ordered provider credentials; the first one feeds the agent
    /// container's `envFrom`.
    #[serde(default)]
    pub credentials: Vec<CredentialRef>,
    /// Persistent memory configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBinding {
    /// Channel type, e.g. `telegram`, `slack`, `discord`, `whatsapp`.
    pub r#type: String,
    /// Secret holding the channel credential, projected into the gateway.
    pub credential_secret: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxPrefs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_agents: Option<SubAgentLimits>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPrefs {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubAgentLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRef {
    /// Provider name, e.g. `anthropic`.
    pub provider: String,
    /// Secret holding the provider credential.
    pub secret_name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Cap on `MEMORY.md`, in bytes.
    #[serde(default = "default_memory_max_size")]
    pub max_size: u32,
    /// Addendum appended to the system prompt when memory is injected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_memory_max_size() -> u32 {
    64 * 1024
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { enabled: false, max_size: default_memory_max_size(), system_prompt: None }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum IdentityPhase {
    #[default]
    Pending,
    Ready,
    Error,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityStatus {
    #[serde(default)]
    pub phase: IdentityPhase,
    /// Per-channel connection state reported by gateways over the bus.
    #[serde(default)]
    pub channels: BTreeMap<String, String>,
    #[serde(default)]
    pub active_runs: u32,
    #[serde(default)]
    pub total_runs: u32,
}

impl Identity {
    /// Whether persistent memory is switched on.
    pub fn memory_enabled(&self) -> bool {
        self.spec.memory.as_ref().is_some_and(|m| m.enabled)
    }

    /// The credential secret injected into agent containers, if any.
    pub fn primary_credential(&self) -> Option<&str> {
        self.spec.credentials.first().map(|c| c.secret_name.as_str())
    }

    /// Declared channel types, in spec order.
    pub fn channel_types(&self) -> Vec<&str> {
        self.spec.channels.iter().map(|c| c.r#type.as_str()).collect()
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
