// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn pack_with_sidecar(sidecar: Option<SidecarSpec>) -> SkillPack {
    SkillPack::new("ops", SkillPackSpec { sidecar, ..Default::default() })
}

#[test]
fn no_sidecar_means_no_rbac() {
    let pack = pack_with_sidecar(None);
    assert!(!pack.has_sidecar());
    assert!(!pack.has_namespace_rbac());
    assert!(!pack.has_cluster_rbac());
}

#[test]
fn sidecar_rbac_detection() {
    let pack = pack_with_sidecar(Some(SidecarSpec {
        image: "kubectl:latest".into(),
        cluster_rbac_rules: vec![RbacRule {
            api_groups: vec![String::new()],
            resources: vec!["nodes".into()],
            verbs: vec!["get".into(), "list".into()],
            resource_names: None,
        }],
        ..Default::default()
    }));
    assert!(pack.has_sidecar());
    assert!(!pack.has_namespace_rbac());
    assert!(pack.has_cluster_rbac());
}

#[test]
fn rbac_rule_round_trips_camel_case() {
    let json = serde_json::json!({
        "apiGroups": [""],
        "resources": ["pods"],
        "verbs": ["get"],
        "resourceNames": ["one"]
    });
    let rule: RbacRule = serde_json::from_value(json).unwrap();
    assert_eq!(rule.resources, vec!["pods"]);
    assert_eq!(rule.resource_names.unwrap(), vec!["one"]);
}
