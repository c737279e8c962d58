//! `converge plan` - preview what apply would change

use anyhow::Result;
use declarative::{HostProbe, compute_diffs, pending_notifications};

use crate::Context;
use crate::cli::PlanArgs;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let loaded = super::load_run(ctx, &args.recipe, args.target.as_deref())?;

    if !ctx.quiet {
        ui::header(&format!("Plan for {}", loaded.recipe.display_name()));
        ui::kv("resources", &loaded.run.len().to_string());
    }

    let diffs = compute_diffs(&loaded.run, &HostProbe);
    let notifications = pending_notifications(&loaded.run, &diffs);
    engine::display_plan(&diffs, &notifications, args.diff);

    log::debug!("{} of {} resources would change", diffs.len(), loaded.run.len());
    Ok(())
}
