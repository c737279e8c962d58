//! Execution engine - applies steps in declaration order, then fires
//! batched notifications

use crate::context::{ApplyContext, NoProgress, ProgressCallback};
use crate::error::{ErrorKind, RunError};
use crate::guard::{self, GuardDecision, HostProbe, SystemProbe};
use crate::notify::{NotificationQueue, QueuedNotification, Router};
use crate::planner::{Run, Step};
use crate::report::{Outcome, Phase, RunReport};
use crate::types::{ApplyResult, ExecuteOptions};
use std::time::Instant;

const DRY_RUN_REASON: &str = "dry run: would apply";

/// Execute a run
///
/// Steps are processed strictly one at a time in declaration order:
/// 1. Guards decide whether the step runs (failing open on guard errors)
/// 2. The action is applied; a change queues the step's notifications
/// 3. A non-ignorable failure aborts the remaining steps
///
/// After the primary pass the notification queue is drained, each target
/// firing once. Notifications are dropped when the run was aborted.
///
/// # Arguments
/// * `run` - The steps and edges to execute
/// * `opts` - Execution options (dry_run, verbose)
/// * `probe` - System view for custom guards
/// * `progress` - Progress callback
///
/// # Returns
/// Report with one primary outcome per step, plus one per fired notification
pub fn execute<P: ProgressCallback>(
    run: Run,
    opts: &ExecuteOptions,
    probe: &dyn SystemProbe,
    progress: &mut P,
) -> RunReport {
    let (steps, edges) = run.into_parts();
    let router = Router::new(&edges);
    let mut queue = NotificationQueue::new();
    let mut report = RunReport::new(opts.dry_run);

    progress.on_batch_start(steps.len(), Phase::Primary);
    for step in &steps {
        let id = step.id();
        progress.on_resource_start(&id, &step.resource.description());

        let outcome = if let Some(by) = &report.aborted_by {
            Outcome::skipped(&id, Phase::Primary, format!("run aborted by {by}"))
        } else {
            let (outcome, changed) = run_step(step, opts, probe);
            if changed {
                router.on_changed(&id, &mut queue);
            }
            if outcome.is_fatal() {
                log::error!("[{id}] failed, aborting run");
                report.aborted_by = Some(id.clone());
            }
            outcome
        };

        progress.on_resource_complete(&outcome);
        report.push(outcome);
    }
    progress.on_batch_complete(Phase::Primary);

    if report.is_aborted() {
        if !queue.is_empty() {
            log::warn!("dropping {} queued notifications after abort", queue.len());
        }
    } else if !queue.is_empty() {
        fire_notifications(&steps, queue.drain(), opts, &mut report, progress);
    }

    report.finish();
    progress.on_run_complete(&report);
    report
}

/// Simple execution against the host, without progress reporting
pub fn execute_simple(run: Run, opts: &ExecuteOptions) -> RunReport {
    execute(run, opts, &HostProbe, &mut NoProgress)
}

/// Guard, then apply a single step; the flag reports whether it changed
/// (or would change, in a dry run)
fn run_step(step: &Step, opts: &ExecuteOptions, probe: &dyn SystemProbe) -> (Outcome, bool) {
    let id = step.id();
    let started = Instant::now();

    let guard_error = match guard::should_run(step.resource.as_ref(), &step.guards, probe) {
        GuardDecision::Skip { reason } => {
            return (Outcome::skipped(id, Phase::Primary, reason), false);
        }
        GuardDecision::Run { guard_error } => guard_error,
    };

    if opts.dry_run {
        let mut outcome = Outcome::skipped(&id, Phase::Primary, DRY_RUN_REASON);
        outcome.error = guard_error.map(|e| RunError::new(ErrorKind::GuardEvaluation, e));
        return (outcome, true);
    }

    let mut ctx = ApplyContext::new(opts.verbose);
    let mut advice = None;
    let result = match step.resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => {
            let run_error = RunError::from_anyhow(ErrorKind::ActionFailed, &e);
            advice = run_error.advice;
            ApplyResult::Failed {
                error: run_error.message,
            }
        }
    };

    let (mut outcome, changed) = match result {
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
            (Outcome::applied(&id, Phase::Primary), true)
        }
        ApplyResult::NoChange => (
            Outcome::skipped(&id, Phase::Primary, "already in desired state"),
            false,
        ),
        ApplyResult::Skipped { reason } => (Outcome::skipped(&id, Phase::Primary, reason), false),
        ApplyResult::Failed { error } => {
            let ignored = step.on_failure.is_ignorable();
            if ignored {
                log::warn!("[{id}] failed (ignored): {error}");
            }
            (
                Outcome::failed(
                    &id,
                    Phase::Primary,
                    RunError::new(ErrorKind::ActionFailed, error).with_advice(advice),
                    ignored,
                ),
                false,
            )
        }
    };

    if let Some(e) = guard_error
        && outcome.error.is_none()
    {
        outcome.error = Some(RunError::new(ErrorKind::GuardEvaluation, e));
    }
    outcome.duration_ms = elapsed_ms(started);
    (outcome, changed)
}

fn fire_notifications<P: ProgressCallback>(
    steps: &[Step],
    pending: Vec<QueuedNotification>,
    opts: &ExecuteOptions,
    report: &mut RunReport,
    progress: &mut P,
) {
    progress.on_batch_start(pending.len(), Phase::Notification);

    for (i, notification) in pending.iter().enumerate() {
        // Run::notify guarantees the target exists
        let Some(step) = steps.iter().find(|s| s.id() == notification.target) else {
            continue;
        };
        progress.on_resource_start(&notification.target, &step.resource.description());

        let outcome = fire(step, notification, opts);
        let fatal = outcome.is_fatal();
        progress.on_resource_complete(&outcome);
        report.push(outcome);

        if fatal {
            let remaining = pending.len() - i - 1;
            log::error!(
                "[{}] notification failed, dropping {remaining} remaining",
                notification.target
            );
            report.aborted_by = Some(notification.target.clone());
            break;
        }
    }

    progress.on_batch_complete(Phase::Notification);
}

fn fire(step: &Step, notification: &QueuedNotification, opts: &ExecuteOptions) -> Outcome {
    let target = &notification.target;
    let reason = format!(
        "{} triggered by {}",
        notification.action,
        notification.triggered_by.join(", ")
    );

    if opts.dry_run {
        return Outcome::skipped(target, Phase::Notification, format!("dry run: would {reason}"));
    }

    let started = Instant::now();
    let mut ctx = ApplyContext::notified(opts.verbose, &notification.triggered_by);
    let mut advice = None;
    let result = match step.resource.notify(notification.action, &mut ctx) {
        Ok(result) => result,
        Err(e) => {
            let run_error = RunError::from_anyhow(ErrorKind::NotificationFailed, &e);
            advice = run_error.advice;
            ApplyResult::Failed {
                error: run_error.message,
            }
        }
    };

    let mut outcome = match result {
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
            Outcome::applied(target, Phase::Notification).with_reason(reason)
        }
        ApplyResult::NoChange => Outcome::skipped(target, Phase::Notification, reason),
        ApplyResult::Skipped { reason } => Outcome::skipped(target, Phase::Notification, reason),
        ApplyResult::Failed { error } => Outcome::failed(
            target,
            Phase::Notification,
            RunError::new(ErrorKind::NotificationFailed, error).with_advice(advice),
            step.on_failure.is_ignorable(),
        )
        .with_reason(reason),
    };
    outcome.duration_ms = elapsed_ms(started);
    outcome
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
