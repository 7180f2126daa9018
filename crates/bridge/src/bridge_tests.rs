// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use sz_bus::MemoryBus;
use yare::parameterized;

fn config(root: &Path) -> BridgeConfig {
    BridgeConfig {
        root: root.to_path_buf(),
        run_id: "alice-x".into(),
        instance: "alice".into(),
    }
}

#[parameterized(
    result = { "output/result.json", Some(Topic::RunCompleted) },
    status = { "output/status.json", Some(Topic::StatusUpdate) },
    stream = { "output/stream-0001", Some(Topic::StreamChunk) },
    other_output = { "output/notes.txt", None },
    spawn = { "spawn/child.json", Some(Topic::SpawnRequest) },
    exec_request = { "tools/exec-request-1.json", Some(Topic::ToolExecRequest) },
    exec_result_is_ours = { "tools/exec-result-1.json", None },
    message = { "messages/out.json", Some(Topic::ChannelMessageSend) },
    input_is_ours = { "input/followup-1.json", None },
    outside_root = { "../escape.json", None },
)]
fn classification(rel: &str, expected: Option<Topic>) {
    let root = Path::new("/ipc");
    let classified = classify(root, &root.join(rel));
    match expected {
        Some(topic) => assert_eq!(classified, Classified::Publish(topic)),
        None => assert_eq!(classified, Classified::Ignore),
    }
}

async fn start_bridge(
    dir: &tempfile::TempDir,
) -> (MemoryBus, CancellationToken, tokio::task::JoinHandle<()>) {
    let bus = MemoryBus::new();
    let bridge = Bridge::new(config(dir.path()), bus.clone());
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        let _ = bridge.run(token).await;
    });
    // Wait for the subdirectories to exist, then a beat more so the
    // watch registration that follows them is in place.
    for _ in 0..50 {
        if dir.path().join("messages").is_dir() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    (bus, cancel, handle)
}

#[tokio::test]
async fn result_drop_publishes_completed_with_verbatim_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, cancel, handle) = start_bridge(&dir).await;
    let mut completed = bus.subscribe(&Topic::RunCompleted).await.unwrap();

    let body = br#"{"status":"success","response":"done"}"#;
    std::fs::write(dir.path().join("output/result.json"), body).unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), completed.recv())
        .await
        .expect("timed out")
        .expect("bus closed");
    assert_eq!(msg.payload, body);
    assert_eq!(msg.meta(META_AGENT_RUN_ID), Some("alice-x"));
    assert_eq!(msg.meta(META_INSTANCE_NAME), Some("alice"));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn followup_message_becomes_an_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, cancel, handle) = start_bridge(&dir).await;

    let topic = Topic::Followup("alice-x".into());
    bus.publish(BusMessage::new(&topic, b"{\"text\":\"continue\"}".to_vec())).await.unwrap();

    let input = dir.path().join("input");
    let mut found = None;
    for _ in 0..100 {
        let entries: Vec<_> = std::fs::read_dir(&input)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        if let Some(path) = entries.first() {
            found = Some(path.clone());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let path = found.expect("no input file written");
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("followup-") && name.ends_with(".json"));
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"text\":\"continue\"}");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn tool_result_lands_under_tools() {
    let dir = tempfile::tempdir().unwrap();
    let (bus, cancel, handle) = start_bridge(&dir).await;

    let topic = Topic::ToolExecResultFor("alice-x".into());
    bus.publish(BusMessage::new(&topic, b"ok".to_vec())).await.unwrap();

    let tools = dir.path().join("tools");
    let mut found = false;
    for _ in 0..100 {
        let any = std::fs::read_dir(&tools).unwrap().filter_map(|e| e.ok()).any(|e| {
            e.file_name().to_str().is_some_and(|n| n.starts_with("exec-result-"))
        });
        if any {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(found, "no exec-result file written");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_the_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let (_bus, cancel, handle) = start_bridge(&dir).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await.expect("bridge hung").unwrap();
}
