// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform topic enumeration.
//!
//! Topics are dot-separated strings. The fixed set below is reserved for
//! platform events; the two run-scoped variants carry the run name as
//! their final segment.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    RunRequested,
    RunStarted,
    RunCompleted,
    RunFailed,
    StreamChunk,
    StatusUpdate,
    SpawnRequest,
    ChannelMessageReceived,
    ChannelMessageSend,
    ChannelHealthUpdate,
    ToolExecRequest,
    ToolExecResult,
    ToolApprovalRequest,
    ToolApprovalResponse,
    ScheduleUpsert,
    /// Follow-up input addressed to one run.
    Followup(String),
    /// Tool execution result addressed to one run.
    ToolExecResultFor(String),
}

impl Topic {
    pub fn as_str(&self) -> String {
        match self {
            Topic::RunRequested => "agent.run.requested".to_string(),
            Topic::RunStarted => "agent.run.started".to_string(),
            Topic::RunCompleted => "agent.run.completed".to_string(),
            Topic::RunFailed => "agent.run.failed".to_string(),
            Topic::StreamChunk => "agent.stream.chunk".to_string(),
            Topic::StatusUpdate => "agent.status.update".to_string(),
            Topic::SpawnRequest => "agent.spawn.request".to_string(),
            Topic::ChannelMessageReceived => "channel.message.received".to_string(),
            Topic::ChannelMessageSend => "channel.message.send".to_string(),
            Topic::ChannelHealthUpdate => "channel.health.update".to_string(),
            Topic::ToolExecRequest => "tool.exec.request".to_string(),
            Topic::ToolExecResult => "tool.exec.result".to_string(),
            Topic::ToolApprovalRequest => "tool.approval.request".to_string(),
            Topic::ToolApprovalResponse => "tool.approval.response".to_string(),
            Topic::ScheduleUpsert => "schedule.upsert".to_string(),
            Topic::Followup(run) => format!("agent.followup.{run}"),
            Topic::ToolExecResultFor(run) => format!("tool.exec.result.{run}"),
        }
    }

    /// Parse a dot-separated topic string back into the enumeration.
    pub fn parse(s: &str) -> Option<Topic> {
        let topic = match s {
            "agent.run.requested" => Topic::RunRequested,
            "agent.run.started" => Topic::RunStarted,
            "agent.run.completed" => Topic::RunCompleted,
            "agent.run.failed" => Topic::RunFailed,
            "agent.stream.chunk" => Topic::StreamChunk,
            "agent.status.update" => Topic::StatusUpdate,
            "agent.spawn.request" => Topic::SpawnRequest,
            "channel.message.received" => Topic::ChannelMessageReceived,
            "channel.message.send" => Topic::ChannelMessageSend,
            "channel.health.update" => Topic::ChannelHealthUpdate,
            "tool.exec.request" => Topic::ToolExecRequest,
            "tool.approval.request" => Topic::ToolApprovalRequest,
            "tool.approval.response" => Topic::ToolApprovalResponse,
            "schedule.upsert" => Topic::ScheduleUpsert,
            other => {
                if let Some(run) = other.strip_prefix("agent.followup.") {
                    Topic::Followup(run.to_string())
                } else if other == "tool.exec.result" {
                    Topic::ToolExecResult
                } else if let Some(run) = other.strip_prefix("tool.exec.result.") {
                    Topic::ToolExecResultFor(run.to_string())
                } else {
                    return None;
                }
            }
        };
        Some(topic)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
