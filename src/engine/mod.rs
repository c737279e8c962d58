//! Execution engine for converge
//!
//! The engine wraps the declarative crate with terminal UI:
//! 1. Diffing - show what each resource would change
//! 2. Confirming - prompt unless `--yes` or a dry run
//! 3. Executing - converge with a progress bar and print the summary

pub mod differ;
pub mod executor;

pub use differ::display_plan;
pub use executor::{ApplyOptions, apply, print_summary, write_report};
