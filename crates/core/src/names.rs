// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label keys and object name mangling.
//!
//! Ephemeral cluster-scoped RBAC cannot carry owner references (cross-scope
//! references are rejected by the API server), so grants are discovered by
//! label instead. These keys are the contract between grant creation and
//! the termination sweep.

pub const LABEL_AGENT_RUN: &str = "sympozium.dev/agent-run";
pub const LABEL_INSTANCE: &str = "sympozium.dev/instance";
pub const LABEL_SKILL: &str = "sympozium.dev/skill";
pub const LABEL_CHANNEL: &str = "sympozium.dev/channel";
pub const LABEL_PERSONA_PACK: &str = "sympozium.dev/persona-pack";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "sympozium";

/// Maximum length of a Kubernetes object name.
const MAX_NAME: usize = 253;

/// Name of the ephemeral role/binding pair for a skill pack attached to a run.
pub fn grant_name(pack: &str, run: &str) -> String {
    sanitize_name(&format!("sympozium-skill-{pack}-{run}"))
}

/// Name of the materialized bundle ConfigMap for a skill pack.
pub fn bundle_name(pack: &str) -> String {
    sanitize_name(&format!("skillpack-{pack}"))
}

/// Name of the per-identity memory store ConfigMap.
pub fn memory_store_name(identity: &str) -> String {
    sanitize_name(&format!("{identity}-memory"))
}

/// Name of the per-(identity, channel) gateway deployment.
pub fn gateway_name(identity: &str, channel: &str) -> String {
    sanitize_name(&format!("{identity}-{channel}"))
}

/// Name of an identity or schedule stamped from a persona pack.
pub fn persona_child_name(pack: &str, persona: &str) -> String {
    sanitize_name(&format!("{pack}-{persona}"))
}

/// Coerce a string into a valid RFC 1123 subdomain name: lowercase
/// alphanumerics and dashes, truncated, no leading/trailing dash.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_NAME));
    for ch in raw.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
            out.push(ch);
        } else {
            out.push('-');
        }
        if out.len() == MAX_NAME {
            break;
        }
    }
    out.trim_matches(|c| c == '-' || c == '.').to_string()
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
