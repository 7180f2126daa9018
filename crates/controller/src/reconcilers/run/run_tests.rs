// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::track::{decide_tracking, TrackDecision, TrackInputs};
use super::*;
use yare::parameterized;

fn inputs() -> TrackInputs {
    TrackInputs { job_exists: true, ..Default::default() }
}

#[test]
fn quiet_job_waits() {
    assert_eq!(decide_tracking(&inputs()), TrackDecision::Wait);
}

#[test]
fn job_success_completes() {
    let mut i = inputs();
    i.job_succeeded = true;
    assert_eq!(decide_tracking(&i), TrackDecision::CompleteViaJob);
}

#[test]
fn job_failure_fails() {
    let mut i = inputs();
    i.job_failed = true;
    assert_eq!(decide_tracking(&i), TrackDecision::FailViaJob);
}

#[parameterized(
    clean_exit = { 0 },
    error_exit = { 7 },
)]
fn lingering_sidecars_reap_on_agent_termination(exit_code: i32) {
    let mut i = inputs();
    i.container_count = 3;
    i.agent_exit = Some(exit_code);
    assert_eq!(decide_tracking(&i), TrackDecision::ReapLingering { exit_code });
}

#[test]
fn two_container_pods_use_the_job_signal() {
    // agent + bridge only: even with the agent terminated, wait for the
    // Job to converge on its own.
    let mut i = inputs();
    i.container_count = 2;
    i.agent_exit = Some(0);
    assert_eq!(decide_tracking(&i), TrackDecision::Wait);
}

#[test]
fn timeout_fires_only_without_job_signal() {
    let mut i = inputs();
    i.timed_out = true;
    assert_eq!(decide_tracking(&i), TrackDecision::Timeout);

    i.job_succeeded = true;
    assert_eq!(decide_tracking(&i), TrackDecision::CompleteViaJob);
}

#[test]
fn missing_job_is_reported() {
    let mut i = inputs();
    i.job_exists = false;
    assert_eq!(decide_tracking(&i), TrackDecision::JobGone);
}

#[test]
fn job_signal_wins_over_lingering_check() {
    let mut i = inputs();
    i.job_succeeded = true;
    i.container_count = 4;
    i.agent_exit = Some(0);
    assert_eq!(decide_tracking(&i), TrackDecision::CompleteViaJob);
}

#[test]
fn elapsed_prefers_start_time() {
    use chrono::{TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let created = Utc.with_ymd_and_hms(2026, 3, 10, 11, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 30).unwrap();
    assert_eq!(elapsed_since(Some(start), Some(created), now), Duration::from_secs(30));
    assert_eq!(elapsed_since(None, Some(created), now), Duration::from_secs(3630));
    assert_eq!(elapsed_since(None, None, now), Duration::from_secs(0));
}
