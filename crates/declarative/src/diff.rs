//! Diff computation for plan previews
//!
//! Guards are side-effect-free, so a preview evaluates every step in
//! parallel. The preview reflects the system as it is now: a step whose
//! drift would be fixed by an earlier step still shows up.

use crate::guard::{self, GuardDecision, SystemProbe};
use crate::planner::{Run, Step};
use crate::types::{FailurePolicy, ResourceKind, ResourceState};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A pending change of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    pub kind: ResourceKind,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
    /// Failure will not abort the run
    pub ignore_failure: bool,
    /// Custom guard error, if the step runs only because its guard failed open
    pub guard_error: Option<String>,
    /// Detailed change preview (e.g. unified diff of file content)
    pub preview: Option<String>,
    /// Resources notified if this one changes
    pub notifies: Vec<String>,
}

impl ResourceDiff {
    /// Create a diff from a step, returning None if its guards say skip
    pub fn from_step(run: &Run, step: &Step, probe: &dyn SystemProbe) -> Option<Self> {
        let resource = step.resource.as_ref();
        let guard_error = match guard::should_run(resource, &step.guards, probe) {
            GuardDecision::Skip { .. } => return None,
            GuardDecision::Run { guard_error } => guard_error,
        };

        let id = resource.id();
        Some(Self {
            current: resource.current_state().unwrap_or(ResourceState::Unknown),
            desired: resource.desired_state(),
            kind: resource.kind(),
            description: resource.description(),
            ignore_failure: step.on_failure == FailurePolicy::Ignore,
            guard_error,
            preview: resource.preview(),
            notifies: run
                .edges()
                .iter()
                .filter(|e| e.from == id)
                .map(|e| format!("{} {}", e.action, e.to))
                .collect(),
            resource_id: id,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }
}

/// Compute diffs for every step of a run, in declaration order
pub fn compute_diffs(run: &Run, probe: &dyn SystemProbe) -> Vec<ResourceDiff> {
    run.steps()
        .par_iter()
        .filter_map(|step| ResourceDiff::from_step(run, step, probe))
        .collect()
}

/// Targets that would be notified if every diff were applied
pub fn pending_notifications(run: &Run, diffs: &[ResourceDiff]) -> Vec<String> {
    let changing: HashSet<&str> = diffs.iter().map(|d| d.resource_id.as_str()).collect();
    let mut seen = HashSet::new();
    run.edges()
        .iter()
        .filter(|e| changing.contains(e.from.as_str()))
        .filter(|e| seen.insert(e.to.clone()))
        .map(|e| e.to.clone())
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify (or run)
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource kind
pub fn group_by_kind(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.kind.to_string())
            .or_default()
            .push(diff);
    }
    groups
}
