//! Command implementations
//!
//! Each command loads settings, then the recipe, and builds a run against
//! the detected host.

pub mod apply;
pub mod plan;
pub mod render;
pub mod validate;

use anyhow::Result;
use declarative::{Run, Variables};
use std::path::Path;

use crate::Context;
use crate::config::Settings;
use crate::recipe::Recipe;
use crate::resource::Host;

/// Settings from `--config` (or the default location), with CLI overrides
pub fn load_settings(ctx: &Context) -> Result<Settings> {
    let mut settings = match &ctx.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(manager) = ctx.service_manager {
        settings.service_manager = manager;
    }
    Ok(settings)
}

/// A recipe built into a run, narrowed to `target`
pub struct Loaded {
    pub recipe: Recipe,
    pub variables: Variables,
    pub run: Run,
}

pub fn load_run(ctx: &Context, path: &Path, target: Option<&str>) -> Result<Loaded> {
    let settings = load_settings(ctx)?;
    let recipe = Recipe::load(path)?;
    let variables = recipe.variables(&settings.variables, &Variables::new());
    let host = Host::detect(&settings);

    let run = recipe.build(&host, &variables)?;
    let total = run.len();
    let run = run.filter_by_target(target);
    if let Some(t) = target {
        log::info!("Target '{t}' selects {} of {total} resources", run.len());
    }

    Ok(Loaded {
        recipe,
        variables,
        run,
    })
}
