// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, h, m, s).unwrap()
}

fn every_minute() -> CronSchedule {
    parse_cron("* * * * *").unwrap()
}

#[test]
fn five_field_expressions_parse() {
    assert!(parse_cron("* * * * *").is_ok());
    assert!(parse_cron("0 3 * * *").is_ok());
    assert!(parse_cron("*/5 9-17 * * 1-5").is_ok());
}

#[test]
fn six_field_expressions_pass_through() {
    assert!(parse_cron("30 0 3 * * *").is_ok());
}

#[test]
fn invalid_cron_is_a_validation_error() {
    let err = parse_cron("not a cron").unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("not a cron"));
}

#[test]
fn next_fire_is_strictly_after_reference() {
    let next = next_fire(&every_minute(), at(12, 0, 0)).unwrap();
    assert_eq!(next, at(12, 1, 0));
}

#[test]
fn not_due_waits_until_the_boundary() {
    // Last run at 12:00, now 12:00:30. Due at 12:01, 30s away.
    let decision = decide(
        &every_minute(),
        Some(at(12, 0, 0)),
        at(11, 0, 0),
        at(12, 0, 30),
        ConcurrencyPolicy::Forbid,
        false,
    );
    assert_eq!(decision, Decision::Wait(Duration::from_secs(30)));
}

#[test]
fn wait_is_capped_at_sixty_seconds() {
    let nightly = parse_cron("0 3 * * *").unwrap();
    let decision = decide(
        &nightly,
        Some(at(3, 0, 0)),
        at(0, 0, 0),
        at(4, 0, 0),
        ConcurrencyPolicy::Forbid,
        false,
    );
    assert_eq!(decision, Decision::Wait(Duration::from_secs(60)));
}

#[test]
fn never_run_uses_creation_time_as_reference() {
    // Created 11:59:30, never fired; due at 12:00.
    let decision = decide(
        &every_minute(),
        None,
        at(11, 59, 30),
        at(12, 0, 5),
        ConcurrencyPolicy::Forbid,
        false,
    );
    assert_eq!(decision, Decision::Fire { replace_previous: false });
}

#[parameterized(
    forbid_skips = { ConcurrencyPolicy::Forbid, Decision::SkipConcurrent },
    allow_fires = { ConcurrencyPolicy::Allow, Decision::Fire { replace_previous: false } },
    replace_deletes = { ConcurrencyPolicy::Replace, Decision::Fire { replace_previous: true } },
)]
fn concurrency_policies(policy: ConcurrencyPolicy, expected: Decision) {
    let decision = decide(
        &every_minute(),
        Some(at(12, 0, 0)),
        at(11, 0, 0),
        at(12, 2, 0),
        policy,
        true,
    );
    assert_eq!(decision, expected);
}

#[test]
fn idle_previous_run_fires_regardless_of_policy() {
    let decision = decide(
        &every_minute(),
        Some(at(12, 0, 0)),
        at(11, 0, 0),
        at(12, 2, 0),
        ConcurrencyPolicy::Forbid,
        false,
    );
    assert_eq!(decision, Decision::Fire { replace_previous: false });
}

#[test]
fn task_gets_memory_context_prefix() {
    assert_eq!(
        build_task("tidy up", Some("- remembers the broom")),
        "## Memory Context\n- remembers the broom\n\n## Task\ntidy up"
    );
}

#[test]
fn empty_memory_leaves_task_untouched() {
    assert_eq!(build_task("tidy up", None), "tidy up");
    assert_eq!(build_task("tidy up", Some("   ")), "tidy up");
}
