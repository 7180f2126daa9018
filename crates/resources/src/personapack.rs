// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Templates for mass-stamping identities and schedules.
//!
//! A persona pack owns everything it stamps. The central `enabled` switch
//! tears the whole set down; the exclusion list tears down individual
//! personas.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sympozium.dev",
    version = "v1alpha1",
    kind = "PersonaPack",
    plural = "personapacks",
    shortname = "pp",
    status = "PersonaPackStatus",
    namespaced,
    printcolumn = r#"{"name":"Enabled","type":"boolean","jsonPath":".spec.enabled"}"#,
    printcolumn = r#"{"name":"Personas","type":"integer","jsonPath":".status.personaCount"}"#,
    printcolumn = r#"{"name":"Installed","type":"integer","jsonPath":".status.installedCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PersonaPackSpec {
    /// Central switch; disabling deletes all stamped children.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub personas: Vec<Persona>,
    /// Credential references copied onto every stamped identity.
    #[serde(default)]
    pub credentials: Vec<crate::identity::CredentialRef>,
    /// Personas whose children are deleted (or never created).
    #[serde(default)]
    pub exclude_personas: Vec<String>,
    /// Channel type → credential secret, applied to persona channels.
    #[serde(default)]
    pub channel_secrets: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_ref: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Model override; packs without one inherit nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_gating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<PersonaSchedule>,
    /// Seed content for the identity's `MEMORY.md`, applied on first
    /// creation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_seed: Option<String>,
    /// Channel types this persona is bound to.
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonaSchedule {
    pub cron: String,
    pub task: String,
    #[serde(default)]
    pub include_memory: bool,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum PersonaPackPhase {
    #[default]
    Pending,
    Ready,
    Disabled,
    Error,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPersona {
    pub persona: String,
    pub identity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonaPackStatus {
    #[serde(default)]
    pub phase: PersonaPackPhase,
    #[serde(default)]
    pub persona_count: u32,
    #[serde(default)]
    pub installed_count: u32,
    #[serde(default)]
    pub installed_personas: Vec<InstalledPersona>,
}

impl PersonaPack {
    /// Personas that should currently be stamped.
    pub fn active_personas(&self) -> impl Iterator<Item = &Persona> {
        self.spec
            .personas
            .iter()
            .filter(move |p| !self.spec.exclude_personas.contains(&p.name))
    }

    pub fn is_excluded(&self, persona: &str) -> bool {
        self.spec.exclude_personas.iter().any(|p| p == persona)
    }
}

#[cfg(test)]
#[path = "personapack_tests.rs"]
mod tests;
