// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Portable skill bundles.
//!
//! A skill pack is a set of Markdown instruction documents plus an
//! optional runtime sidecar with its RBAC requirements. The skill-pack
//! reconciler materializes the documents into a ConfigMap bundle mounted
//! read-only into agent pods.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sympozium.dev",
    version = "v1alpha1",
    kind = "SkillPack",
    plural = "skillpacks",
    shortname = "skill",
    status = "SkillPackStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Skills","type":"integer","jsonPath":".status.skillCount"}"#,
    printcolumn = r#"{"name":"Bundle","type":"string","jsonPath":".status.bundleName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SkillPackSpec {
    /// Skills in mount order.
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-form runtime requirements, advisory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Long-lived sidecar attached to every run that references this pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<SidecarSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Binaries/tools the skill expects inside the sidecar image.
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// Markdown instruction document.
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Mount the shared workspace volume into the sidecar.
    #[serde(default)]
    pub mount_workspace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<SidecarResources>,
    /// Namespace-scoped permissions granted for the duration of a run.
    #[serde(default)]
    pub rbac_rules: Vec<RbacRule>,
    /// Cluster-scoped permissions granted for the duration of a run.
    #[serde(default)]
    pub cluster_rbac_rules: Vec<RbacRule>,
}

/// A single permission rule, mirroring `rbac.authorization.k8s.io` shapes
/// without dragging the full API type into the CRD schema.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RbacRule {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_names: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SidecarResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum SkillPackPhase {
    #[default]
    Pending,
    Ready,
    Error,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillPackStatus {
    #[serde(default)]
    pub phase: SkillPackPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_name: Option<String>,
    #[serde(default)]
    pub skill_count: u32,
}

impl SkillPack {
    /// Whether runs referencing this pack get a sidecar container.
    pub fn has_sidecar(&self) -> bool {
        self.spec.sidecar.is_some()
    }

    /// Whether the sidecar declares any namespace-scoped rules.
    pub fn has_namespace_rbac(&self) -> bool {
        self.spec.sidecar.as_ref().is_some_and(|s| !s.rbac_rules.is_empty())
    }

    /// Whether the sidecar declares any cluster-scoped rules.
    pub fn has_cluster_rbac(&self) -> bool {
        self.spec.sidecar.as_ref().is_some_and(|s| !s.cluster_rbac_rules.is_empty())
    }
}

#[cfg(test)]
#[path = "skillpack_tests.rs"]
mod tests;
