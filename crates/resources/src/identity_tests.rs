// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn identity(spec: IdentitySpec) -> Identity {
    Identity::new("alice", spec)
}

#[test]
fn memory_disabled_by_default() {
    let id = identity(IdentitySpec::default());
    assert!(!id.memory_enabled());
}

#[test]
fn memory_enabled_when_configured() {
    let id = identity(IdentitySpec {
        memory: Some(MemoryConfig { enabled: true, ..Default::default() }),
        ..Default::default()
    });
    assert!(id.memory_enabled());
    assert_eq!(id.spec.memory.unwrap().max_size, 64 * 1024);
}

#[test]
fn primary_credential_is_first() {
    let id = identity(IdentitySpec {
        credentials: vec![
            CredentialRef { provider: "anthropic".into(), secret_name: "s1".into() },
            CredentialRef { provider: "openai".into(), secret_name: "s2".into() },
        ],
        ..Default::default()
    });
    assert_eq!(id.primary_credential(), Some("s1"));
}

#[test]
fn spec_round_trips_camel_case() {
    let json = serde_json::json!({
        "channels": [{"type": "telegram", "credentialSecret": "tg-token"}],
        "agent": {"model": "m1", "thinkingLevel": "high"},
        "skills": ["ops"],
        "policyRef": "default",
        "memory": {"enabled": true, "maxSize": 1024}
    });
    let spec: IdentitySpec = serde_json::from_value(json).unwrap();
    assert_eq!(spec.channels[0].r#type, "telegram");
    assert_eq!(spec.agent.thinking_level.as_deref(), Some("high"));
    assert_eq!(spec.memory.unwrap().max_size, 1024);
}
