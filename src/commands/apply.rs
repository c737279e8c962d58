//! `converge apply` - converge the machine to a recipe

use anyhow::{Result, bail};
use declarative::HostProbe;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{self, ApplyOptions};
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let loaded = super::load_run(ctx, &args.recipe, args.target.as_deref())?;

    if !ctx.quiet {
        ui::header(&format!("Applying {}", loaded.recipe.display_name()));
        if let Some(desc) = &loaded.recipe.description {
            ui::dim(desc);
        }
    }

    if loaded.run.is_empty() {
        ui::warn("No resources to converge");
        return Ok(());
    }

    let opts = ApplyOptions {
        dry_run: args.dry_run,
        yes: args.yes,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
        show_diff: args.diff,
    };

    let Some(report) = engine::apply(loaded.run, &opts, &HostProbe)? else {
        return Ok(());
    };

    if let Some(path) = &args.report {
        engine::write_report(&report, path)?;
    }

    if !report.is_success() {
        let failed = report.failures().filter(|o| !o.ignored).count();
        bail!("Run failed: {failed} resources did not converge");
    }
    Ok(())
}
