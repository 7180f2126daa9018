// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push-based directory watcher over OS file notifications.
//!
//! Only create and write events are surfaced; removes and renames are
//! dropped. The subscriber channel is bounded: on overflow, events are
//! dropped with a warning and the subscriber is expected to reconcile by
//! re-reading the directory.

use notify::event::{CreateKind, EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Create,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub op: FileOp,
}

/// Owns the OS watch registration. Dropping it terminates the event
/// channel.
pub struct DirWatcher {
    _watcher: RecommendedWatcher,
}

impl DirWatcher {
    /// Watch a directory tree. Returns the watcher guard and the event
    /// channel.
    pub fn watch(root: &Path) -> Result<(Self, mpsc::Receiver<FileEvent>), notify::Error> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watch backend error");
                        return;
                    }
                };
                let Some(op) = map_kind(&event.kind) else { return };
                for path in event.paths {
                    match tx.try_send(FileEvent { path: path.clone(), op }) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!(
                                path = %path.display(),
                                "watch channel full, dropping event"
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                }
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Map a notify event kind onto the surfaced operations. Anything that is
/// not a create or a data write (removes, renames, metadata) is `None`.
fn map_kind(kind: &EventKind) -> Option<FileOp> {
    match kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => Some(FileOp::Create),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Some(FileOp::Write),
        _ => None,
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
