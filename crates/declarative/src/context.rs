//! Apply context and progress callbacks
//!
//! These let the declarative crate report progress without depending
//! on a specific terminal UI.

use crate::report::{Outcome, Phase, RunReport};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when a phase (primary pass or notifications) starts
    fn on_batch_start(&mut self, count: usize, phase: Phase);

    /// Called when starting to process a single resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a resource has an outcome
    fn on_resource_complete(&mut self, outcome: &Outcome);

    /// Called when a phase completes
    fn on_batch_complete(&mut self, phase: Phase);

    /// Called once the whole run is done
    fn on_run_complete(&mut self, _report: &RunReport) {}
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize, _phase: Phase) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _outcome: &Outcome) {}
    fn on_batch_complete(&mut self, _phase: Phase) {}
}

/// Progress callback that writes every outcome to the `log` facade
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_batch_start(&mut self, count: usize, phase: Phase) {
        log::info!("{phase}: {count} resources");
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        log::debug!("[{id}] {description}");
    }

    fn on_resource_complete(&mut self, outcome: &Outcome) {
        match &outcome.error {
            Some(err) => log::warn!("[{}] {:?}: {}", outcome.resource_id, outcome.status, err),
            None => log::info!("[{}] {:?}", outcome.resource_id, outcome.status),
        }
    }

    fn on_batch_complete(&mut self, _phase: Phase) {}
}

/// Context passed to resource apply operations
pub struct ApplyContext<'a> {
    /// Whether to output verbose information
    pub verbose: bool,
    /// Ids of the resources whose change triggered this call, if any
    pub triggered_by: &'a [String],
}

impl<'a> ApplyContext<'a> {
    /// Context for the primary pass
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            triggered_by: &[],
        }
    }

    /// Context for a notification fired by the given resources
    pub fn notified(verbose: bool, triggered_by: &'a [String]) -> Self {
        Self {
            verbose,
            triggered_by,
        }
    }
}
