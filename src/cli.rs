use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use svckit::ServiceManager;

use crate::recipe::parse_var;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Idempotent declarative provisioning: guard, apply, notify", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/converge/config.toml)
    #[arg(long, env = "CONVERGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Service manager to drive (auto, systemd, sysv)
    #[arg(long, env = "CONVERGE_SERVICE_MANAGER", global = true)]
    pub service_manager: Option<ServiceManager>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge this machine to a recipe
    Apply(ApplyArgs),

    /// Show what apply would change
    Plan(PlanArgs),

    /// Check a recipe: ids, notification targets, templates
    Validate {
        /// Recipe file (TOML or JSON)
        recipe: PathBuf,
    },

    /// Render a template with recipe and command-line variables
    Render(RenderArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Recipe file (TOML or JSON)
    pub recipe: PathBuf,

    /// Evaluate guards and show what would happen without changing anything
    #[arg(short = 'n', long, env = "CONVERGE_DRY_RUN")]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Only converge resources matching `kind` or `kind.name`
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show content diffs in the plan
    #[arg(long)]
    pub diff: bool,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Recipe file (TOML or JSON)
    pub recipe: PathBuf,

    /// Only plan resources matching `kind` or `kind.name`
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show content diffs
    #[arg(long)]
    pub diff: bool,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Template file
    pub template: PathBuf,

    /// Variable as key=value (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Take variables from this recipe
    #[arg(long)]
    pub recipe: Option<PathBuf>,
}
