// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn schedule() -> AgentSchedule {
    AgentSchedule::new(
        "nightly",
        AgentScheduleSpec {
            identity_ref: "alice".into(),
            cron: "0 3 * * *".into(),
            task: "tidy up".into(),
            ..Default::default()
        },
    )
}

#[test]
fn concurrency_defaults_to_forbid() {
    assert_eq!(schedule().spec.concurrency_policy, ConcurrencyPolicy::Forbid);
}

#[test]
fn run_names_count_up_from_total() {
    let mut sched = schedule();
    assert_eq!(sched.next_run_name("nightly"), "nightly-1");
    sched.status = Some(AgentScheduleStatus { total_runs: 41, ..Default::default() });
    assert_eq!(sched.next_run_name("nightly"), "nightly-42");
}

#[test]
fn last_run_accessors_tolerate_missing_status() {
    let sched = schedule();
    assert!(sched.last_run_time().is_none());
    assert!(sched.last_run_name().is_none());
}
