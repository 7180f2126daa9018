// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn depth_exceeded_reason_string() {
    let err = Error::DepthExceeded { depth: 3, max: 2 };
    assert_eq!(err.to_string(), "sub-agent depth 3 exceeds max 2");
    assert!(err.is_validation());
}

#[test]
fn transient_errors_are_not_validation() {
    let err = Error::MissingObjectKey("metadata.name");
    assert!(!err.is_validation());
}

#[test]
fn instance_not_found_names_the_identity() {
    let err = Error::InstanceNotFound("alice".into());
    assert!(err.to_string().contains("alice"));
    assert!(err.is_validation());
}
