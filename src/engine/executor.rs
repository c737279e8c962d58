//! Execution engine - runs a recipe with terminal UI integration

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use indicatif::ProgressBar;
use std::fs;
use std::path::Path;

use crate::progress;
use crate::ui;
use declarative::{
    Outcome, Phase, ProgressCallback, Run, RunReport, Status, SystemProbe, compute_diffs,
    pending_notifications,
};

use super::differ::display_plan;

/// Options for an interactive apply (adds confirmation and display flags)
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Show skipped resources and their reasons
    pub verbose: bool,
    /// Hide the plan and progress bar
    pub quiet: bool,
    /// Show content previews in the plan
    pub show_diff: bool,
}

/// Progress callback drawing one bar per phase
pub struct RunProgress {
    pb: Option<ProgressBar>,
    verbose: bool,
    quiet: bool,
}

impl RunProgress {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            pb: None,
            verbose,
            quiet,
        }
    }

    fn println(&self, line: String) {
        match &self.pb {
            Some(pb) => pb.println(line),
            None if !self.quiet => println!("{line}"),
            None => {}
        }
    }
}

impl ProgressCallback for RunProgress {
    fn on_batch_start(&mut self, count: usize, phase: Phase) {
        if count == 0 {
            return;
        }
        let prefix = match phase {
            Phase::Primary => "Applying",
            Phase::Notification => "Notifying",
        };
        self.pb = Some(progress::bar(count as u64, prefix, self.quiet));
    }

    fn on_resource_start(&mut self, id: &str, _description: &str) {
        if let Some(pb) = &self.pb {
            pb.set_message(ui::truncate_path(id, 40));
        }
    }

    fn on_resource_complete(&mut self, outcome: &Outcome) {
        if let Some(line) = outcome_line(outcome, self.verbose) {
            self.println(line);
        }
        if let Some(pb) = &self.pb {
            pb.inc(1);
        }
    }

    fn on_batch_complete(&mut self, _phase: Phase) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// One display line per outcome; skips are shown only when verbose
fn outcome_line(outcome: &Outcome, verbose: bool) -> Option<String> {
    let id = &outcome.resource_id;
    match outcome.status {
        Status::Applied => Some(match &outcome.reason {
            Some(reason) => format!("  {} {id} {}", "✓".green(), format!("({reason})").dimmed()),
            None => format!("  {} {id}", "✓".green()),
        }),
        Status::Failed => {
            let message = outcome
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            Some(if outcome.ignored {
                format!("  {} {id}: {message} {}", "⚠".yellow(), "(ignored)".dimmed())
            } else {
                format!("  {} {id}: {}", "✗".red(), message.red())
            })
        }
        Status::Skipped if verbose => Some(format!(
            "  {} {id} {}",
            "○".dimmed(),
            outcome
                .reason
                .as_deref()
                .map(|r| format!("({r})"))
                .unwrap_or_default()
                .dimmed()
        )),
        Status::Skipped => None,
    }
}

/// Show the plan, confirm, then execute the run
///
/// Returns `None` when the user declines at the prompt.
pub fn apply(run: Run, opts: &ApplyOptions, probe: &dyn SystemProbe) -> Result<Option<RunReport>> {
    let diffs = compute_diffs(&run, probe);
    let notifications = pending_notifications(&run, &diffs);

    if !opts.quiet {
        display_plan(&diffs, &notifications, opts.show_diff);
    }

    if !diffs.is_empty() && !opts.yes && !opts.dry_run && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(None);
    }

    if !opts.quiet {
        println!();
        if opts.dry_run {
            println!("  {} Dry run - no changes will be made", "ℹ".blue());
        }
        println!("  {} Converging {} resources...", "→".cyan(), run.len());
    }

    let exec_opts = declarative::ExecuteOptions {
        dry_run: opts.dry_run,
        verbose: opts.verbose,
    };
    let mut progress = RunProgress::new(opts.verbose, opts.quiet);
    let report = declarative::execute(run, &exec_opts, probe, &mut progress);

    print_summary(&report);
    Ok(Some(report))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    if !console::Term::stdout().is_term() {
        bail!("Refusing to apply without confirmation; pass --yes in non-interactive mode");
    }

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print the run summary
pub fn print_summary(report: &RunReport) {
    let summary = report.summary();

    println!();
    let status = if report.is_success() {
        "✓".green()
    } else {
        "✗".red()
    };
    let duration = report
        .duration_ms()
        .map(|ms| format!(" in {}", ui::format_duration(ms)))
        .unwrap_or_default();
    if report.dry_run {
        let would = report
            .outcomes
            .iter()
            .filter(|o| o.reason.as_deref().is_some_and(|r| r.starts_with("dry run:")))
            .count();
        println!(
            "  {} {} would change, {} unchanged, {} failed{}",
            status,
            would.to_string().yellow(),
            summary.skipped - would,
            summary.failed.to_string().red(),
            duration.dimmed()
        );
    } else {
        println!(
            "  {} {} applied, {} unchanged, {} failed{}",
            status,
            summary.applied.to_string().green(),
            summary.skipped,
            summary.failed.to_string().red(),
            duration.dimmed()
        );
    }

    if summary.ignored_failures > 0 {
        println!(
            "  {} {} failures ignored",
            "⚠".yellow(),
            summary.ignored_failures
        );
    }

    if let Some(by) = &report.aborted_by {
        println!(
            "  {} Run aborted by {}; remaining resources skipped",
            "✗".red(),
            by.bold()
        );
    }

    for outcome in report.failures().filter(|o| !o.ignored) {
        if let Some(line) = failure_line(outcome) {
            ui::error(&line);
        }
        if let Some(advice) = outcome.error.as_ref().and_then(|e| e.advice.as_deref()) {
            println!("    {} {}", "→".cyan(), advice);
        }
    }
}

fn failure_line(outcome: &Outcome) -> Option<String> {
    let err = outcome.error.as_ref()?;
    Some(format!("{}: {}", outcome.resource_id, err))
}

/// Write the run report as JSON
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    log::info!("Wrote run report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ErrorKind, RunError};

    fn sample_report() -> RunReport {
        let mut report = RunReport::new(false);
        report.push(Outcome::applied("nginx", Phase::Primary));
        report.push(Outcome::skipped("/etc/motd", Phase::Primary, "already converged"));
        report.push(Outcome::failed(
            "warm-cache",
            Phase::Primary,
            RunError::new(ErrorKind::ActionFailed, "command exited with 1"),
            true,
        ));
        report.finish();
        report
    }

    #[test]
    fn test_outcome_line_hides_skips_unless_verbose() {
        let skipped = Outcome::skipped("/etc/motd", Phase::Primary, "already converged");
        assert!(outcome_line(&skipped, false).is_none());
        let line = outcome_line(&skipped, true).unwrap();
        assert!(line.contains("/etc/motd"));
        assert!(line.contains("already converged"));
    }

    #[test]
    fn test_outcome_line_marks_ignored_failures() {
        let report = sample_report();
        let failed = report.outcome("warm-cache", Phase::Primary).unwrap();
        let line = outcome_line(failed, false).unwrap();
        assert!(line.contains("command exited with 1"));
        assert!(line.contains("(ignored)"));
    }

    #[test]
    fn test_failure_advice_in_report() {
        let mut report = RunReport::new(false);
        report.push(Outcome::failed(
            "install-nginx",
            Phase::Primary,
            RunError::new(ErrorKind::ActionFailed, "package database locked")
                .with_advice(Some("Wait for the other apt/dpkg process to finish".into())),
            false,
        ));
        report.finish();

        let failed = report.failures().next().unwrap();
        assert_eq!(
            failure_line(failed).unwrap(),
            "install-nginx: action failed: package database locked"
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json["outcomes"][0]["error"]["advice"],
            "Wait for the other apt/dpkg process to finish"
        );
        print_summary(&report);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");

        write_report(&sample_report(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let outcomes = value["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0]["resource_id"], "nginx");
        assert_eq!(outcomes[0]["status"], "applied");
        assert_eq!(outcomes[2]["ignored"], true);
        assert_eq!(value["dry_run"], false);
    }

    #[test]
    fn test_quiet_progress_counts_outcomes() {
        let mut progress = RunProgress::new(false, true);
        progress.on_batch_start(2, Phase::Primary);
        progress.on_resource_start("nginx", "Install package nginx");
        progress.on_resource_complete(&Outcome::applied("nginx", Phase::Primary));
        assert_eq!(progress.pb.as_ref().map(ProgressBar::position), Some(1));
        progress.on_batch_complete(Phase::Primary);
        assert!(progress.pb.is_none());
    }
}
