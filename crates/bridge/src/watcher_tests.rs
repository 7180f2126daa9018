// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

/// Wait for an event on `path`, tolerating unrelated events in between.
async fn wait_for_path(rx: &mut mpsc::Receiver<FileEvent>, path: &Path) -> FileEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for file event")
            .expect("watcher channel closed");
        if event.path == path {
            return event;
        }
    }
}

#[tokio::test]
async fn surfaces_file_creation() {
    let dir = tempfile::tempdir().unwrap();
    let (_watcher, mut rx) = DirWatcher::watch(dir.path()).unwrap();

    let target = dir.path().join("result.json");
    std::fs::write(&target, b"{}").unwrap();

    let event = wait_for_path(&mut rx, &target).await;
    assert!(matches!(event.op, FileOp::Create | FileOp::Write));
}

#[tokio::test]
async fn surfaces_writes_to_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("status.json");
    std::fs::write(&target, b"a").unwrap();

    let (_watcher, mut rx) = DirWatcher::watch(dir.path()).unwrap();
    std::fs::write(&target, b"ab").unwrap();

    let event = wait_for_path(&mut rx, &target).await;
    assert!(matches!(event.op, FileOp::Create | FileOp::Write));
}

#[tokio::test]
async fn dropping_the_watcher_closes_the_channel() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) = DirWatcher::watch(dir.path()).unwrap();
    drop(watcher);
    // Drain anything in flight; the channel must end rather than hang.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[test]
fn remove_events_are_not_surfaced() {
    assert_eq!(map_kind(&EventKind::Remove(notify::event::RemoveKind::File)), None);
    assert_eq!(
        map_kind(&EventKind::Modify(ModifyKind::Name(notify::event::RenameMode::Any))),
        None
    );
}

#[test]
fn create_and_data_writes_are_surfaced() {
    assert_eq!(map_kind(&EventKind::Create(CreateKind::File)), Some(FileOp::Create));
    assert_eq!(
        map_kind(&EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content))),
        Some(FileOp::Write)
    );
}
