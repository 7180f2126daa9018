// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconcilers, one per resource kind.
//!
//! Each module exposes a `run(ctx)` that drives a `kube` controller until
//! process shutdown, plus the pure decision/build functions the
//! controller shell calls into.

pub mod identity;
pub mod personapack;
pub mod run;
pub mod schedule;
pub mod skillpack;

use crate::context::Context;
use crate::error::Error;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

/// Shared error policy: validation errors wait for a spec change, the
/// rest retry with a flat backoff.
pub(crate) fn error_policy<K>(_obj: Arc<K>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_validation() {
        Action::await_change()
    } else {
        tracing::warn!(error = %error, "reconcile failed, requeueing");
        Action::requeue(Duration::from_secs(15))
    }
}
