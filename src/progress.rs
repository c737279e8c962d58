//! Progress indicators for the converge CLI.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar for a batch of `len` items; hidden when `quiet`
pub fn bar(len: u64, prefix: &str, quiet: bool) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if quiet {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"));
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}
