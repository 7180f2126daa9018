// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("watcher failed: {0}")]
    Watcher(#[from] notify::Error),
    #[error(transparent)]
    Bus(#[from] sz_bus::BusError),
    #[error("watcher channel closed")]
    WatcherClosed,
}

impl BridgeError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }
}
