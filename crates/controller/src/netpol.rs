// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run NetworkPolicy composition.
//!
//! When the governing policy declares a deny-all network stance, every
//! run gets an egress policy scoped to its pod by the run label. DNS, the
//! event bus, and the declared egress CIDRs are the only holes.

use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use sz_core::{sanitize_name, LABEL_AGENT_RUN};
use sz_resources::NetworkPolicyConfig;

const DNS_PORT: i32 = 53;
const BUS_PORT: i32 = 4222;

/// Name of the per-run egress policy.
pub fn netpol_name(run: &str) -> String {
    sanitize_name(&format!("sympozium-egress-{run}"))
}

/// Build the egress policy for a run, or `None` when the config does not
/// ask for isolation.
pub fn build_network_policy(
    run_name: &str,
    namespace: &str,
    config: &NetworkPolicyConfig,
    owner: OwnerReference,
) -> Option<NetworkPolicy> {
    if !config.deny_all {
        return None;
    }

    let mut egress = Vec::new();
    if config.allow_dns {
        egress.push(NetworkPolicyEgressRule {
            ports: Some(vec![port(DNS_PORT, "UDP"), port(DNS_PORT, "TCP")]),
            to: None,
        });
    }
    if config.allow_bus {
        egress.push(NetworkPolicyEgressRule {
            ports: Some(vec![port(BUS_PORT, "TCP")]),
            to: None,
        });
    }
    if !config.allowed_egress.is_empty() {
        egress.push(NetworkPolicyEgressRule {
            ports: None,
            to: Some(
                config
                    .allowed_egress
                    .iter()
                    .map(|cidr| NetworkPolicyPeer {
                        ip_block: Some(IPBlock { cidr: cidr.clone(), except: None }),
                        ..Default::default()
                    })
                    .collect(),
            ),
        });
    }

    Some(NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(netpol_name(run_name)),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                LABEL_AGENT_RUN.to_string(),
                run_name.to_string(),
            )])),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    LABEL_AGENT_RUN.to_string(),
                    run_name.to_string(),
                )])),
                ..Default::default()
            },
            policy_types: Some(vec!["Egress".to_string()]),
            // An empty egress list with policyTypes=[Egress] denies all.
            egress: if egress.is_empty() { Some(Vec::new()) } else { Some(egress) },
            ..Default::default()
        }),
    })
}

fn port(number: i32, protocol: &str) -> NetworkPolicyPort {
    NetworkPolicyPort {
        port: Some(IntOrString::Int(number)),
        protocol: Some(protocol.to_string()),
        end_port: None,
    }
}

#[cfg(test)]
#[path = "netpol_tests.rs"]
mod tests;
