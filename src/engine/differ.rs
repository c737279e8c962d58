//! Plan display

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceKind, ResourceState, group_by_kind};

fn kind_heading(kind: &str) -> &str {
    match ResourceKind::parse(kind) {
        Some(ResourceKind::Package) => "Packages",
        Some(ResourceKind::File) => "Files",
        Some(ResourceKind::Directory) => "Directories",
        Some(ResourceKind::Service) => "Services",
        Some(ResourceKind::Exec) => "Commands",
        None => kind,
    }
}

fn symbol(diff: &ResourceDiff) -> colored::ColoredString {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { .. }) => "+".green(),
        (ResourceState::Present { .. }, ResourceState::Absent) => "-".red(),
        (ResourceState::Modified { .. }, _) => "~".yellow(),
        _ => "!".cyan(),
    }
}

fn state_desc(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => format!(
            "(absent){}",
            details
                .as_ref()
                .map(|d| format!(" → {d}"))
                .unwrap_or_default()
        ),
        (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
        (ResourceState::Present { .. }, ResourceState::Absent) => "(will remove)".to_string(),
        (ResourceState::Unknown, _) => "(will run)".to_string(),
        _ => String::new(),
    }
}

/// Display pending changes grouped by kind
pub fn display_plan(diffs: &[ResourceDiff], notifications: &[String], show_content: bool) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Convergence Plan".bold()
    );
    println!("│");

    for (kind, kind_diffs) in group_by_kind(diffs) {
        println!("│ {}", kind_heading(&kind).bold());

        for diff in kind_diffs {
            let mut flags = String::new();
            if diff.ignore_failure {
                flags.push_str(&" [ignore failure]".dimmed().to_string());
            }
            if diff.guard_error.is_some() {
                flags.push_str(&" [guard error]".yellow().to_string());
            }
            println!(
                "│   {} {:<30} {}{}",
                symbol(diff),
                diff.resource_id,
                state_desc(diff).dimmed(),
                flags
            );
            if let Some(err) = &diff.guard_error {
                println!("│       {}", err.yellow());
            }
            for target in &diff.notifies {
                println!("│       {} {}", "↳".cyan(), target.dimmed());
            }
            if show_content && let Some(preview) = &diff.preview {
                for line in preview.lines() {
                    let styled = if line.starts_with('+') && !line.starts_with("+++") {
                        line.green()
                    } else if line.starts_with('-') && !line.starts_with("---") {
                        line.red()
                    } else {
                        line.dimmed()
                    };
                    println!("│       {styled}");
                }
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to add, {} to change)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow()
    );
    if !notifications.is_empty() {
        println!("│ Notifies: {}", notifications.join(", ").cyan());
    }
    println!("└─────────────────────────────────────────────────────┘");
}
