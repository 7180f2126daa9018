// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    #[error("failed to connect to bus: {0}")]
    Connect(String),
    #[error("failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("bus connection closed")]
    Closed,
}
