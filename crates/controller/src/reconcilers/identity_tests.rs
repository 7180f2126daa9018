// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sz_resources::IdentitySpec;

fn identity(channels: &[&str]) -> Identity {
    let mut id = Identity::new(
        "alice",
        IdentitySpec {
            channels: channels
                .iter()
                .map(|t| ChannelBinding {
                    r#type: (*t).to_string(),
                    credential_secret: format!("{t}-token"),
                })
                .collect(),
            ..Default::default()
        },
    );
    id.metadata.namespace = Some("tenants".into());
    id.metadata.uid = Some("uid-1".into());
    id
}

fn images() -> ImageConfig {
    ImageConfig { registry: "reg.example.com/sz".into(), tag: "v1".into() }
}

fn gateway_for(id: &Identity, channel: &str) -> Deployment {
    let binding = id.spec.channels.iter().find(|c| c.r#type == channel).unwrap();
    desired_gateway(id, binding, &images(), "nats://nats:4222").unwrap()
}

#[test]
fn gateway_is_named_and_labeled_per_channel() {
    let id = identity(&["telegram"]);
    let gw = gateway_for(&id, "telegram");
    assert_eq!(gw.metadata.name.as_deref(), Some("alice-telegram"));
    let labels = gw.metadata.labels.as_ref().unwrap();
    assert_eq!(labels[LABEL_CHANNEL], "telegram");
    assert_eq!(labels[LABEL_INSTANCE], "alice");
    let owner = &gw.metadata.owner_references.as_ref().unwrap()[0];
    assert_eq!(owner.kind, "Identity");
}

#[test]
fn gateway_image_follows_channel_type() {
    let id = identity(&["slack"]);
    let gw = gateway_for(&id, "slack");
    let container = &gw.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0];
    assert_eq!(container.image.as_deref(), Some("reg.example.com/sz/gateway-slack:v1"));
}

#[test]
fn gateway_projects_the_channel_credential() {
    let id = identity(&["discord"]);
    let gw = gateway_for(&id, "discord");
    let container = &gw.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0];
    let secret = container.env_from.as_ref().unwrap()[0].secret_ref.as_ref().unwrap();
    assert_eq!(secret.name, "discord-token");
}

fn deployment_with_channel(name: &str, channel: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(gateway_labels("alice", channel)),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn removed_channels_are_stale() {
    let id = identity(&["telegram"]);
    let existing = vec![
        deployment_with_channel("alice-telegram", "telegram"),
        deployment_with_channel("alice-slack", "slack"),
    ];
    assert_eq!(stale_gateways(&id, existing.iter()), vec!["alice-slack".to_string()]);
}

#[test]
fn declared_channels_are_kept() {
    let id = identity(&["telegram", "slack"]);
    let existing = vec![
        deployment_with_channel("alice-telegram", "telegram"),
        deployment_with_channel("alice-slack", "slack"),
    ];
    assert!(stale_gateways(&id, existing.iter()).is_empty());
}

#[test]
fn unlabeled_deployments_are_ignored() {
    let id = identity(&[]);
    let bare = Deployment {
        metadata: ObjectMeta { name: Some("other".into()), ..Default::default() },
        ..Default::default()
    };
    assert!(stale_gateways(&id, std::iter::once(&bare)).is_empty());
}
