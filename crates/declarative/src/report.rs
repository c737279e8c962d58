//! Run report - per-resource outcomes and their summary

use crate::error::RunError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final status of one resource in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing needed doing (or the run was a dry run / aborted)
    Skipped,
    /// The action ran and changed the system
    Applied,
    /// The action failed
    Failed,
}

/// Which pass of the run produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Declaration-order pass over all resources
    Primary,
    /// Batched notifications after the primary pass
    Notification,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Notification => f.write_str("notifications"),
        }
    }
}

/// Outcome of one resource in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub resource_id: String,
    pub status: Status,
    pub phase: Phase,
    /// Why the resource was skipped, or a note about how it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    /// The failure did not count against the run
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Outcome {
    pub fn skipped(id: impl Into<String>, phase: Phase, reason: impl Into<String>) -> Self {
        Self {
            resource_id: id.into(),
            status: Status::Skipped,
            phase,
            reason: Some(reason.into()),
            error: None,
            ignored: false,
            duration_ms: 0,
        }
    }

    pub fn applied(id: impl Into<String>, phase: Phase) -> Self {
        Self {
            resource_id: id.into(),
            status: Status::Applied,
            phase,
            reason: None,
            error: None,
            ignored: false,
            duration_ms: 0,
        }
    }

    pub fn failed(id: impl Into<String>, phase: Phase, error: RunError, ignored: bool) -> Self {
        Self {
            resource_id: id.into(),
            status: Status::Failed,
            phase,
            reason: None,
            error: Some(error),
            ignored,
            duration_ms: 0,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Failed and counted against the run
    pub fn is_fatal(&self) -> bool {
        self.status == Status::Failed && !self.ignored
    }
}

/// Aggregated counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub ignored_failures: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed
    }
}

/// Ordered record of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// Resource whose non-ignorable failure stopped the run
    pub aborted_by: Option<String>,
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            aborted_by: None,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for o in &self.outcomes {
            match o.status {
                Status::Applied => summary.applied += 1,
                Status::Skipped => summary.skipped += 1,
                Status::Failed => {
                    summary.failed += 1;
                    if o.ignored {
                        summary.ignored_failures += 1;
                    }
                }
            }
        }
        summary
    }

    /// No failure other than ignored ones
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(Outcome::is_fatal)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted_by.is_some()
    }

    /// Outcome of a resource in the given phase
    pub fn outcome(&self, id: &str, phase: Phase) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.resource_id == id && o.phase == phase)
    }

    /// Ids of resources that changed, in order
    pub fn changed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == Status::Applied)
            .map(|o| o.resource_id.as_str())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.status == Status::Failed)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_ignored_failure_keeps_success() {
        let mut report = RunReport::new(false);
        report.push(Outcome::failed(
            "apt-get-update-periodic",
            Phase::Primary,
            RunError::new(ErrorKind::ActionFailed, "exit status 100"),
            true,
        ));
        report.push(Outcome::applied("install-nginx", Phase::Primary));

        assert!(report.is_success());
        let summary = report.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.ignored_failures, 1);
        assert_eq!(summary.applied, 1);
    }

    #[test]
    fn test_fatal_failure_fails_run() {
        let mut report = RunReport::new(false);
        report.push(Outcome::failed(
            "install-nginx",
            Phase::Primary,
            RunError::new(ErrorKind::ActionFailed, "unable to locate package"),
            false,
        ));
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_outcome_lookup_by_phase() {
        let mut report = RunReport::new(false);
        report.push(Outcome::skipped("nginx", Phase::Primary, "already in desired state"));
        report.push(Outcome::applied("nginx", Phase::Notification));

        assert_eq!(
            report.outcome("nginx", Phase::Notification).map(|o| o.status),
            Some(Status::Applied)
        );
        assert_eq!(report.changed_ids(), vec!["nginx"]);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::new(true);
        report.push(Outcome::skipped("a", Phase::Primary, "dry run: would apply"));
        report.finish();

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"skipped\""));
        assert!(json.contains("\"phase\":\"primary\""));
        assert!(report.duration_ms().is_some());
    }
}
