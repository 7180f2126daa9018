// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn owner() -> OwnerReference {
    OwnerReference {
        api_version: "sympozium.dev/v1alpha1".into(),
        kind: "AgentRun".into(),
        name: "alice-x".into(),
        uid: "uid-1".into(),
        ..Default::default()
    }
}

#[test]
fn permissive_config_builds_nothing() {
    let config = NetworkPolicyConfig::default();
    assert!(build_network_policy("alice-x", "tenants", &config, owner()).is_none());
}

#[test]
fn deny_all_without_holes_blocks_all_egress() {
    let config = NetworkPolicyConfig { deny_all: true, ..Default::default() };
    let policy = build_network_policy("alice-x", "tenants", &config, owner()).unwrap();
    let spec = policy.spec.as_ref().unwrap();
    assert_eq!(spec.policy_types.as_ref().unwrap(), &vec!["Egress".to_string()]);
    assert!(spec.egress.as_ref().unwrap().is_empty());
    assert_eq!(
        spec.pod_selector.match_labels.as_ref().unwrap()[LABEL_AGENT_RUN],
        "alice-x"
    );
}

#[test]
fn dns_and_bus_holes_open_their_ports() {
    let config = NetworkPolicyConfig {
        deny_all: true,
        allow_dns: true,
        allow_bus: true,
        ..Default::default()
    };
    let policy = build_network_policy("alice-x", "tenants", &config, owner()).unwrap();
    let egress = policy.spec.as_ref().unwrap().egress.as_ref().unwrap();
    assert_eq!(egress.len(), 2);
    let dns_ports = egress[0].ports.as_ref().unwrap();
    assert_eq!(dns_ports.len(), 2);
    assert_eq!(dns_ports[0].port, Some(IntOrString::Int(53)));
    let bus_ports = egress[1].ports.as_ref().unwrap();
    assert_eq!(bus_ports[0].port, Some(IntOrString::Int(4222)));
}

#[test]
fn allowed_egress_becomes_ip_blocks() {
    let config = NetworkPolicyConfig {
        deny_all: true,
        allowed_egress: vec!["10.1.0.0/16".into(), "192.168.0.1/32".into()],
        ..Default::default()
    };
    let policy = build_network_policy("alice-x", "tenants", &config, owner()).unwrap();
    let egress = policy.spec.as_ref().unwrap().egress.as_ref().unwrap();
    let peers = egress[0].to.as_ref().unwrap();
    assert_eq!(peers.len(), 2);
    assert_eq!(peers[0].ip_block.as_ref().unwrap().cidr, "10.1.0.0/16");
}

#[test]
fn policy_is_owned_by_the_run() {
    let config = NetworkPolicyConfig { deny_all: true, ..Default::default() };
    let policy = build_network_policy("alice-x", "tenants", &config, owner()).unwrap();
    assert_eq!(policy.metadata.name.as_deref(), Some("sympozium-egress-alice-x"));
    assert_eq!(policy.metadata.owner_references.as_ref().unwrap()[0].name, "alice-x");
}
