// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane error taxonomy.
//!
//! Validation variants flip a run to terminal Failed with their display
//! string as the recorded reason; everything else is transient and
//! requeues with backoff.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kube api error: {0}")]
    Kube(#[from] kube::Error),
    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
    #[error(transparent)]
    Bus(#[from] sz_bus::BusError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("object is missing {0}")]
    MissingObjectKey(&'static str),

    // Validation errors: terminal, never retried.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),
    #[error("policy not found: {0}")]
    PolicyNotFound(String),
    #[error("sub-agent depth {depth} exceeds max {max}")]
    DepthExceeded { depth: u32, max: u32 },
    #[error("identity has {active} active runs, max {max}")]
    ConcurrencyExceeded { active: u32, max: u32 },
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("{0}")]
    PolicyViolation(String),
}

impl Error {
    /// Whether this error is a validation failure that should mark the
    /// run terminally Failed rather than be retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InstanceNotFound(_)
                | Error::PolicyNotFound(_)
                | Error::DepthExceeded { .. }
                | Error::ConcurrencyExceeded { .. }
                | Error::InvalidCron { .. }
                | Error::PolicyViolation(_)
        )
    }
}

impl From<kube::runtime::finalizer::Error<Error>> for Error {
    fn from(err: kube::runtime::finalizer::Error<Error>) -> Self {
        Error::Finalizer(Box::new(err))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
