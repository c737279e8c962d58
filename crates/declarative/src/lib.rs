//! # Declarative
//!
//! A convergence engine for declarative provisioning.
//!
//! A run is an ordered list of steps. Each step wraps a resource (package,
//! file, directory, service, command) with optional guards and a failure
//! policy. Executing the run walks the steps in declaration order:
//!
//! 1. **Guard** - custom guards, or the resource's own drift check, decide
//!    whether anything needs doing
//! 2. **Apply** - the resource converges the system and reports whether it
//!    changed anything
//! 3. **Notify** - changed resources queue actions (restart, reload) on
//!    other resources; the queue is drained once after the primary pass,
//!    each target firing at most once
//!
//! Every step yields an [`Outcome`] in the [`RunReport`].
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, NotifyAction, Run, Step, execute_simple};
//!
//! let mut run = Run::new();
//! run.add(Step::new(Box::new(nginx_package)))?;
//! run.add(Step::new(Box::new(site_config)))?;
//! run.add(Step::new(Box::new(nginx_service)))?;
//! run.notify("/etc/nginx/sites-available/default", "nginx", NotifyAction::Restart)?;
//!
//! let report = execute_simple(run, &ExecuteOptions::default());
//! assert!(report.is_success());
//! ```
//!
//! ## Seams
//!
//! - [`Resource`]: implemented by each concrete resource kind
//! - [`SystemProbe`]: read-only system view for custom guards
//! - [`ProgressCallback`]: receives progress updates
//!
//! This allows the crate to be used without hard dependencies on a package
//! manager, a service manager or a terminal UI.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod guard;
pub mod notify;
pub mod planner;
pub mod report;
pub mod resource;
pub mod template;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{ApplyContext, LogProgress, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_kind, pending_notifications};
pub use error::{Error, ErrorKind, Hint, Result, RunError};
pub use executor::{execute, execute_simple};
pub use guard::{Condition, Guard, GuardDecision, HostProbe, SystemProbe, should_run};
pub use notify::{NotificationEdge, NotificationQueue, NotifyAction, QueuedNotification, Router};
pub use planner::{Run, Step};
pub use report::{Outcome, Phase, RunReport, Status, Summary};
pub use resource::{BoxedResource, Resource};
pub use template::{Template, Variables, render_str};
pub use types::{ApplyResult, ExecuteOptions, FailurePolicy, ResourceKind, ResourceState};
