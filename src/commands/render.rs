//! `converge render` - render a template to stdout

use anyhow::{Context as AnyhowContext, Result};
use declarative::{Template, Variables};
use std::fs;

use crate::Context;
use crate::cli::RenderArgs;
use crate::recipe::Recipe;

pub fn run(ctx: &Context, args: RenderArgs) -> Result<()> {
    let settings = super::load_settings(ctx)?;
    let recipe = match &args.recipe {
        Some(path) => Recipe::load(path)?,
        None => Recipe::default(),
    };
    let overrides: Variables = args.vars.into_iter().collect();
    let vars = recipe.variables(&settings.variables, &overrides);

    let source = fs::read_to_string(&args.template)
        .with_context(|| format!("Could not read template {}", args.template.display()))?;
    let template = Template::parse(&source)
        .with_context(|| format!("Invalid template {}", args.template.display()))?;
    log::debug!("Template uses {:?}", template.variables());

    let rendered = template
        .render(&vars)
        .with_context(|| format!("Could not render {}", args.template.display()))?;
    print!("{rendered}");
    Ok(())
}
