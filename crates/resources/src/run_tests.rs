// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn run_with_status(status: Option<AgentRunStatus>) -> AgentRun {
    let mut run = AgentRun::new(
        "alice-x",
        AgentRunSpec { identity_ref: "alice".into(), task: "hi".into(), ..Default::default() },
    );
    run.status = status;
    run
}

#[test]
fn phase_defaults_to_pending() {
    assert_eq!(run_with_status(None).phase(), RunPhase::Pending);
}

#[parameterized(
    pending = { RunPhase::Pending, false },
    running = { RunPhase::Running, false },
    succeeded = { RunPhase::Succeeded, true },
    failed = { RunPhase::Failed, true },
)]
fn terminal_phases(phase: RunPhase, terminal: bool) {
    assert_eq!(phase.is_terminal(), terminal);
    let run = run_with_status(Some(AgentRunStatus { phase, ..Default::default() }));
    assert_eq!(run.is_active(), !terminal);
}

#[test]
fn effective_timeout_defaults_to_ten_minutes() {
    assert_eq!(run_with_status(None).effective_timeout(), Duration::from_secs(600));
}

#[test]
fn explicit_timeout_wins() {
    let mut run = run_with_status(None);
    run.spec.timeout_seconds = Some(1);
    assert_eq!(run.effective_timeout(), Duration::from_secs(1));
}

#[test]
fn spawn_depth_from_parent() {
    let mut run = run_with_status(None);
    assert_eq!(run.spawn_depth(), 0);
    run.spec.parent = Some(ParentRef { run: "parent".into(), session: String::new(), depth: 3 });
    assert_eq!(run.spawn_depth(), 3);
}

#[test]
fn cleanup_defaults_to_delete() {
    assert_eq!(run_with_status(None).spec.cleanup, CleanupDisposition::Delete);
}
