// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extracts_result_json() {
    let tail = format!(
        "some agent chatter\n{}{{\"status\":\"success\",\"response\":\"done\"}}{}\n",
        RESULT_START, RESULT_END
    );
    let result = extract_result(&tail).unwrap();
    assert_eq!(result.status, ResultStatus::Success);
    assert_eq!(result.response, "done");
    assert!(result.error.is_none());
}

#[test]
fn takes_the_last_result_block() {
    let tail = format!(
        "{s}{{\"status\":\"error\",\"response\":\"first\"}}{e}\n{s}{{\"status\":\"success\",\"response\":\"second\"}}{e}",
        s = RESULT_START,
        e = RESULT_END
    );
    let result = extract_result(&tail).unwrap();
    assert_eq!(result.response, "second");
}

#[test]
fn result_falls_back_to_raw_text() {
    let tail = format!("{}not json at all{}", RESULT_START, RESULT_END);
    let result = extract_result(&tail).unwrap();
    assert_eq!(result.status, ResultStatus::Success);
    assert_eq!(result.response, "not json at all");
}

#[test]
fn missing_markers_yield_none() {
    assert!(extract_result("plain log output").is_none());
    assert!(extract_memory("plain log output").is_none());
}

#[test]
fn truncated_end_marker_keeps_remainder() {
    let tail = format!("{}{{\"status\":\"success\",\"response\":\"cut", RESULT_START);
    let result = extract_result(&tail).unwrap();
    // Not valid JSON once truncated, so the raw text survives.
    assert!(result.response.contains("cut"));
}

#[test]
fn extraction_is_idempotent() {
    let tail = format!(
        "{}{{\"status\":\"success\",\"response\":\"same\"}}{}",
        RESULT_START, RESULT_END
    );
    let first = extract_result(&tail).unwrap();
    let second = extract_result(&tail).unwrap();
    assert_eq!(first.response, second.response);
    assert_eq!(first.status, second.status);
}

#[test]
fn extracts_memory_trimmed() {
    let tail = format!("{}\n# Notes\n\n- learned a thing\n{}", MEMORY_START, MEMORY_END);
    assert_eq!(extract_memory(&tail).unwrap(), "# Notes\n\n- learned a thing");
}

#[test]
fn empty_memory_block_is_none() {
    let tail = format!("{}   \n  {}", MEMORY_START, MEMORY_END);
    assert!(extract_memory(&tail).is_none());
}

#[test]
fn result_error_status_carries_error() {
    let tail = format!(
        "{}{{\"status\":\"error\",\"response\":\"\",\"error\":\"boom\"}}{}",
        RESULT_START, RESULT_END
    );
    let result = extract_result(&tail).unwrap();
    assert_eq!(result.status, ResultStatus::Error);
    assert_eq!(result.error.as_deref(), Some("boom"));
}
