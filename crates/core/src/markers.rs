// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result and memory marker extraction from agent pod logs.
//!
//! The agent container reports its outcome by printing marker-delimited
//! blocks to stdout. Stdout survives in the pod log for as long as the
//! pod exists, so extraction works even after the ephemeral `ipc` volume
//! is gone. Extraction is a pure scan over the fetched log tail and is
//! idempotent: re-running it on the same tail yields the same value.

use serde::{Deserialize, Serialize};

pub const RESULT_START: &str = "__SYMPOZIUM_RESULT__";
pub const RESULT_END: &str = "__SYMPOZIUM_END__";
pub const MEMORY_START: &str = "__SYMPOZIUM_MEMORY__";
pub const MEMORY_END: &str = "__SYMPOZIUM_MEMORY_END__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Payload of a result marker block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: ResultStatus,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

/// Extract the last result block from a log tail.
///
/// Returns `None` when no start marker is present. A block whose payload
/// is not valid JSON is surfaced as a success carrying the raw text, so
/// a partially garbled marker still records something useful.
pub fn extract_result(tail: &str) -> Option<AgentResult> {
    let payload = last_block(tail, RESULT_START, RESULT_END)?;
    match serde_json::from_str::<AgentResult>(payload) {
        Ok(result) => Some(result),
        Err(err) => {
            tracing::debug!(error = %err, "result marker payload is not JSON, keeping raw text");
            Some(AgentResult {
                status: ResultStatus::Success,
                response: payload.trim().to_string(),
                error: None,
                metrics: None,
            })
        }
    }
}

/// Extract the last memory block from a log tail, trimmed.
///
/// Empty or whitespace-only blocks yield `None`.
pub fn extract_memory(tail: &str) -> Option<String> {
    let payload = last_block(tail, MEMORY_START, MEMORY_END)?;
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Locate the payload between the *last* occurrence of `start` and the
/// following `end` marker. A missing end marker swallows the rest of the
/// tail (truncated logs still produce a best-effort payload).
fn last_block<'a>(tail: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let at = tail.rfind(start)?;
    let after = &tail[at + start.len()..];
    match after.find(end) {
        Some(stop) => Some(&after[..stop]),
        None => Some(after),
    }
}

#[cfg(test)]
#[path = "markers_tests.rs"]
mod tests;
