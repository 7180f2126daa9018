// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Print every Sympozium CRD as YAML, ready for `kubectl apply -f -`.

use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [
        serde_yaml::to_string(&sz_resources::Identity::crd())?,
        serde_yaml::to_string(&sz_resources::AgentRun::crd())?,
        serde_yaml::to_string(&sz_resources::AgentSchedule::crd())?,
        serde_yaml::to_string(&sz_resources::SkillPack::crd())?,
        serde_yaml::to_string(&sz_resources::PersonaPack::crd())?,
        serde_yaml::to_string(&sz_resources::AgentPolicy::crd())?,
    ];
    println!("{}", crds.join("---\n"));
    Ok(())
}
