// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sz-bridge: the per-pod sidecar that mediates between the sealed-off
//! agent container and the event bus.
//!
//! The agent container has no network beyond its model endpoint; it talks
//! to the platform by dropping files into well-known subdirectories of a
//! shared `ipc` volume. The bridge watches those directories and
//! translates drops into bus messages, and bus messages back into file
//! drops.

mod bridge;
mod error;
mod watcher;

pub use bridge::{classify, Bridge, BridgeConfig, Classified};
pub use error::BridgeError;
pub use watcher::{DirWatcher, FileEvent, FileOp};
