// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Governance policy consulted by admission and reconciliation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sympozium.dev",
    version = "v1alpha1",
    kind = "AgentPolicy",
    plural = "agentpolicies",
    shortname = "apol",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AgentPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_agents: Option<SubAgentPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_gating: Option<ToolGating>,
    #[serde(default)]
    pub feature_gates: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkPolicyConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPolicy {
    /// Runs must declare a sandbox when set.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory: Option<String>,
    #[serde(default)]
    pub allow_host_mounts: bool,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubAgentPolicy {
    #[serde(default)]
    pub max_depth: u32,
    #[serde(default)]
    pub max_concurrent: u32,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToolAction {
    #[default]
    Allow,
    Deny,
    /// Advisory: surfaced to the agent process, not enforced at admission.
    Ask,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolGating {
    #[serde(default)]
    pub default_action: ToolAction,
    #[serde(default)]
    pub rules: Vec<ToolRule>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolRule {
    pub tool: String,
    #[serde(default)]
    pub action: ToolAction,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicyConfig {
    #[serde(default)]
    pub deny_all: bool,
    #[serde(default)]
    pub allow_dns: bool,
    #[serde(default)]
    pub allow_bus: bool,
    #[serde(default)]
    pub allowed_egress: Vec<String>,
}

impl AgentPolicy {
    /// Effective action for a named tool.
    pub fn tool_action(&self, tool: &str) -> ToolAction {
        let Some(gating) = &self.spec.tool_gating else {
            return ToolAction::Allow;
        };
        gating
            .rules
            .iter()
            .find(|r| r.tool == tool)
            .map(|r| r.action)
            .unwrap_or(gating.default_action)
    }

    /// Whether a feature gate is enabled (absent gates are enabled).
    pub fn gate_enabled(&self, gate: &str) -> bool {
        self.spec.feature_gates.get(gate).copied().unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
