// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-driven generator of runs.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sympozium.dev",
    version = "v1alpha1",
    kind = "AgentSchedule",
    plural = "agentschedules",
    shortname = "sched",
    status = "AgentScheduleStatus",
    namespaced,
    printcolumn = r#"{"name":"Identity","type":"string","jsonPath":".spec.identityRef"}"#,
    printcolumn = r#"{"name":"Cron","type":"string","jsonPath":".spec.cron"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Last Run","type":"string","jsonPath":".status.lastRunName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgentScheduleSpec {
    pub identity_ref: String,
    /// Five-field cron expression evaluated in UTC.
    pub cron: String,
    pub task: String,
    /// Free-form classification tag carried onto created runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub suspend: bool,
    #[serde(default)]
    pub concurrency_policy: ConcurrencyPolicy,
    /// Prefix the task with the identity's memory on every firing.
    #[serde(default)]
    pub include_memory: bool,
}

/// What to do when a trigger fires while the previous run is still active.
///
/// Agents are stateful; overlapping runs against the same identity race on
/// memory updates, so the default is Forbid.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ConcurrencyPolicy {
    #[default]
    Forbid,
    Allow,
    Replace,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum SchedulePhase {
    #[default]
    Active,
    Suspended,
    Error,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentScheduleStatus {
    #[serde(default)]
    pub phase: SchedulePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_runs: u32,
}

impl AgentSchedule {
    /// Name for the next run this schedule creates.
    pub fn next_run_name(&self, name: &str) -> String {
        let total = self.status.as_ref().map(|s| s.total_runs).unwrap_or(0);
        format!("{}-{}", name, total + 1)
    }

    pub fn last_run_time(&self) -> Option<DateTime<Utc>> {
        self.status.as_ref().and_then(|s| s.last_run_time)
    }

    pub fn last_run_name(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.last_run_name.as_deref())
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
