// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn request() -> SpawnRequest {
    SpawnRequest {
        instance: "alice".into(),
        namespace: "tenants".into(),
        task: "dig deeper".into(),
        system_prompt: None,
        skills: vec!["ops".into()],
        session: "sess-1".into(),
        depth: 2,
    }
}

#[test]
fn spawned_run_carries_the_parent() {
    let run = build_spawned_run(&request(), "alice-x", "abcd1234");
    assert_eq!(run.metadata.name.as_deref(), Some("alice-spawn-abcd1234"));
    assert_eq!(run.metadata.namespace.as_deref(), Some("tenants"));
    let parent = run.spec.parent.as_ref().unwrap();
    assert_eq!(parent.run, "alice-x");
    assert_eq!(parent.depth, 2);
    assert_eq!(run.spec.identity_ref, "alice");
    assert_eq!(run.spec.skills, vec!["ops".to_string()]);
}

#[test]
fn depth_is_at_least_one() {
    let mut req = request();
    req.depth = 0;
    let run = build_spawned_run(&req, "alice-x", "abcd1234");
    assert_eq!(run.spec.parent.unwrap().depth, 1);
}

#[test]
fn payload_parses_camel_case() {
    let json = serde_json::json!({
        "instance": "alice",
        "namespace": "tenants",
        "task": "go",
        "systemPrompt": "be brief",
        "depth": 1
    });
    let req: SpawnRequest = serde_json::from_value(json).unwrap();
    assert_eq!(req.system_prompt.as_deref(), Some("be brief"));
    assert!(req.skills.is_empty());
}
