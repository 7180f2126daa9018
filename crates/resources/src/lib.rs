// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sz-resources: the Sympozium custom resource kinds.
//!
//! All kinds live in the `sympozium.dev/v1alpha1` API group, are
//! namespaced, and carry a status subresource. The structs here are the
//! single source of truth for the CRD schemas (`crdgen` renders them to
//! YAML) and for every reconciler's view of desired and observed state.

pub mod identity;
pub mod personapack;
pub mod policy;
pub mod run;
pub mod schedule;
pub mod skillpack;

pub use identity::{
    AgentConfig, ChannelBinding, CredentialRef, Identity, IdentityPhase, IdentitySpec,
    IdentityStatus, MemoryConfig, SandboxPrefs, SubAgentLimits,
};
pub use personapack::{
    Persona, PersonaPack, PersonaPackPhase, PersonaPackSpec, PersonaPackStatus, PersonaSchedule,
    InstalledPersona,
};
pub use policy::{
    AgentPolicy, AgentPolicySpec, NetworkPolicyConfig, SandboxPolicy, SubAgentPolicy, ToolAction,
    ToolGating, ToolRule,
};
pub use run::{
    AgentRun, AgentRunSpec, AgentRunStatus, CleanupDisposition, ModelSpec, ParentRef, RunMetrics,
    RunPhase, SandboxSpec,
};
pub use schedule::{
    AgentSchedule, AgentScheduleSpec, AgentScheduleStatus, ConcurrencyPolicy, SchedulePhase,
};
pub use skillpack::{
    RbacRule, Skill, SkillPack, SkillPackPhase, SkillPackSpec, SkillPackStatus, SidecarResources,
    SidecarSpec,
};

/// API group shared by every Sympozium kind.
pub const GROUP: &str = "sympozium.dev";
/// API version shared by every Sympozium kind.
pub const VERSION: &str = "v1alpha1";
