// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sz-core: domain primitives shared by the Sympozium control plane,
//! bridge sidecar, and bus adapter.

pub mod clock;
pub mod markers;
pub mod names;

pub use clock::{Clock, FixedClock, SystemClock};
pub use markers::{extract_memory, extract_result, AgentResult, ResultStatus};
pub use names::{
    bundle_name, gateway_name, grant_name, memory_store_name, persona_child_name, sanitize_name,
    LABEL_AGENT_RUN, LABEL_CHANNEL, LABEL_COMPONENT, LABEL_INSTANCE, LABEL_MANAGED_BY,
    LABEL_PERSONA_PACK, LABEL_SKILL, MANAGED_BY,
};
