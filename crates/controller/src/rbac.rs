// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral RBAC grants tied to a run.
//!
//! Namespace-scoped grants ride the ownership cascade: role and binding
//! are owned by the run and disappear with it. Cluster-scoped grants
//! cannot reference a namespaced owner, so they carry discovery labels
//! instead and are swept on run termination. Label discovery (rather than
//! an in-memory set) means controller restarts never leak grants.

use crate::error::Error;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use sz_core::{grant_name, LABEL_AGENT_RUN, LABEL_MANAGED_BY, LABEL_SKILL, MANAGED_BY};
use sz_resources::RbacRule;

/// Service account every agent pod runs under.
pub const SERVICE_ACCOUNT: &str = "sympozium-agent";

/// Grant objects for one (pack, run) pair.
#[derive(Debug, Clone)]
pub struct NamespacedGrant {
    pub role: Role,
    pub binding: RoleBinding,
}

#[derive(Debug, Clone)]
pub struct ClusterGrant {
    pub role: ClusterRole,
    pub binding: ClusterRoleBinding,
}

fn to_policy_rules(rules: &[RbacRule]) -> Vec<PolicyRule> {
    rules
        .iter()
        .map(|r| PolicyRule {
            api_groups: Some(r.api_groups.clone()),
            resources: Some(r.resources.clone()),
            verbs: r.verbs.clone(),
            resource_names: r.resource_names.clone(),
            ..Default::default()
        })
        .collect()
}

fn grant_labels(run: &str, pack: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_AGENT_RUN.to_string(), run.to_string()),
        (LABEL_SKILL.to_string(), pack.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
    ])
}

fn agent_subject(namespace: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: SERVICE_ACCOUNT.to_string(),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Build the namespace-scoped role + binding, both owned by the run.
pub fn namespaced_grant(
    pack: &str,
    run: &str,
    namespace: &str,
    rules: &[RbacRule],
    owner: OwnerReference,
) -> NamespacedGrant {
    let name = grant_name(pack, run);
    let metadata = ObjectMeta {
        name: Some(name.clone()),
        namespace: Some(namespace.to_string()),
        labels: Some(grant_labels(run, pack)),
        owner_references: Some(vec![owner]),
        ..Default::default()
    };
    let role = Role { metadata: metadata.clone(), rules: Some(to_policy_rules(rules)) };
    let binding = RoleBinding {
        metadata,
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: name.clone(),
        },
        subjects: Some(vec![agent_subject(namespace)]),
    };
    NamespacedGrant { role, binding }
}

/// Build the cluster-scoped role + binding, labeled for the sweep.
pub fn cluster_grant(
    pack: &str,
    run: &str,
    run_namespace: &str,
    rules: &[RbacRule],
) -> ClusterGrant {
    let name = grant_name(pack, run);
    let metadata = ObjectMeta {
        name: Some(name.clone()),
        labels: Some(grant_labels(run, pack)),
        ..Default::default()
    };
    let role = ClusterRole {
        metadata: metadata.clone(),
        rules: Some(to_policy_rules(rules)),
        ..Default::default()
    };
    let binding = ClusterRoleBinding {
        metadata,
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: name.clone(),
        },
        subjects: Some(vec![agent_subject(run_namespace)]),
    };
    ClusterGrant { role, binding }
}

/// Label selector matching every cluster grant of one run.
pub fn sweep_selector(run: &str) -> String {
    format!("{LABEL_AGENT_RUN}={run},{LABEL_MANAGED_BY}={MANAGED_BY}")
}

/// Create an object, tolerating `AlreadyExists`.
async fn create_idempotent<K>(api: &Api<K>, obj: &K) -> Result<(), Error>
where
    K: kube::Resource + Clone + serde::Serialize + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Ensure the shared agent service account exists in a namespace.
pub async fn ensure_service_account(client: &Client, namespace: &str) -> Result<(), Error> {
    let api: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    let sa = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(SERVICE_ACCOUNT.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                LABEL_MANAGED_BY.to_string(),
                MANAGED_BY.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    };
    create_idempotent(&api, &sa).await
}

/// Materialize every grant a set of sidecar packs declares.
pub async fn create_grants(
    client: &Client,
    namespace: &str,
    run: &str,
    owner: &OwnerReference,
    packs: &[(String, Vec<RbacRule>, Vec<RbacRule>)],
) -> Result<(), Error> {
    let roles: Api<Role> = Api::namespaced(client.clone(), namespace);
    let bindings: Api<RoleBinding> = Api::namespaced(client.clone(), namespace);
    let cluster_roles: Api<ClusterRole> = Api::all(client.clone());
    let cluster_bindings: Api<ClusterRoleBinding> = Api::all(client.clone());

    for (pack, ns_rules, cluster_rules) in packs {
        if !ns_rules.is_empty() {
            let grant = namespaced_grant(pack, run, namespace, ns_rules, owner.clone());
            create_idempotent(&roles, &grant.role).await?;
            create_idempotent(&bindings, &grant.binding).await?;
            tracing::info!(%run, %pack, "namespaced grant created");
        }
        if !cluster_rules.is_empty() {
            let grant = cluster_grant(pack, run, namespace, cluster_rules);
            create_idempotent(&cluster_roles, &grant.role).await?;
            create_idempotent(&cluster_bindings, &grant.binding).await?;
            tracing::info!(%run, %pack, "cluster grant created");
        }
    }
    Ok(())
}

/// Delete every cluster role and binding labeled for this run.
///
/// Errors are logged and swallowed: the sweep must never block a phase
/// transition or finalizer removal, and it is idempotent on the next
/// reconcile.
pub async fn sweep_cluster_grants(client: &Client, run: &str) {
    let selector = sweep_selector(run);
    let lp = ListParams::default().labels(&selector);
    let dp = DeleteParams::default();

    let cluster_bindings: Api<ClusterRoleBinding> = Api::all(client.clone());
    match cluster_bindings.list(&lp).await {
        Ok(list) => {
            for item in list {
                if let Some(name) = item.metadata.name.as_deref() {
                    if let Err(err) = cluster_bindings.delete(name, &dp).await {
                        tracing::warn!(%run, name, error = %err, "cluster binding sweep failed");
                    }
                }
            }
        }
        Err(err) => tracing::warn!(%run, error = %err, "cluster binding list failed"),
    }

    let cluster_roles: Api<ClusterRole> = Api::all(client.clone());
    match cluster_roles.list(&lp).await {
        Ok(list) => {
            for item in list {
                if let Some(name) = item.metadata.name.as_deref() {
                    if let Err(err) = cluster_roles.delete(name, &dp).await {
                        tracing::warn!(%run, name, error = %err, "cluster role sweep failed");
                    }
                }
            }
        }
        Err(err) => tracing::warn!(%run, error = %err, "cluster role list failed"),
    }
}

#[cfg(test)]
#[path = "rbac_tests.rs"]
mod tests;
