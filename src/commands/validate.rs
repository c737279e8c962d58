//! `converge validate` - check a recipe without touching the system

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::ui;

/// Parse the recipe, render its templates and resolve every notification
/// edge. Nothing is probed or applied.
pub fn run(ctx: &Context, recipe: &std::path::Path) -> Result<()> {
    let loaded = super::load_run(ctx, recipe, None)?;
    let run = &loaded.run;

    if ctx.quiet {
        return Ok(());
    }

    ui::header(&format!("Recipe {}", loaded.recipe.display_name()));
    ui::kv("file", &recipe.display().to_string());
    ui::kv("resources", &run.len().to_string());
    ui::kv("notifications", &run.edges().len().to_string());
    ui::kv("variables", &loaded.variables.len().to_string());

    if ctx.verbose > 0 {
        println!();
        for step in run.steps() {
            let mut notes = Vec::new();
            if !step.guards.is_empty() {
                notes.push(format!("{} guards", step.guards.len()));
            }
            if step.on_failure.is_ignorable() {
                notes.push("ignore failure".to_string());
            }
            let notes = if notes.is_empty() {
                String::new()
            } else {
                format!("({})", notes.join(", "))
            };
            println!(
                "  {:<10} {:<36} {}",
                step.resource.kind().to_string().cyan(),
                step.id(),
                notes.dimmed()
            );
        }
        for edge in run.edges() {
            println!(
                "  {} {} {} {}",
                edge.from,
                "→".cyan(),
                edge.action,
                edge.to
            );
        }
    }

    println!();
    ui::success("Recipe is valid");
    Ok(())
}
