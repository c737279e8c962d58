//! The `Resource` trait: one declared unit of desired system state

use crate::context::ApplyContext;
use crate::notify::NotifyAction;
use crate::types::{ApplyResult, ResourceKind, ResourceState};
use anyhow::{Result, bail};
use std::fmt;

/// A declared unit of desired state
///
/// Implementors provide identity (id, description, kind), a read-only
/// state check that doubles as the default guard, the converging action,
/// and optionally reactions to notifications (restart, reload, run).
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Resource, ResourceKind, ResourceState};
///
/// #[derive(Debug)]
/// struct Motd(String);
///
/// impl Resource for Motd {
///     fn id(&self) -> String {
///         "motd".into()
///     }
///     fn description(&self) -> String {
///         "Write /etc/motd".into()
///     }
///     fn kind(&self) -> ResourceKind {
///         ResourceKind::File
///     }
///     fn current_state(&self) -> anyhow::Result<ResourceState> {
///         Ok(match std::fs::read_to_string("/etc/motd") {
///             Ok(have) if have == self.0 => ResourceState::Present { details: None },
///             Ok(_) => ResourceState::Modified { from: "old".into(), to: "new".into() },
///             Err(_) => ResourceState::Absent,
///         })
///     }
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         std::fs::write("/etc/motd", &self.0)?;
///         Ok(ApplyResult::Modified)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier for this resource within a run
    ///
    /// Examples:
    /// - "install-nginx" for a package
    /// - "/etc/nginx/sites-available/default" for a file
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource kind
    fn kind(&self) -> ResourceKind;

    /// Detect the current state of this resource
    ///
    /// Must not change the system.
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Default guard: does the resource need changes to reach desired state?
    ///
    /// Default implementation compares current and desired states.
    /// Must be side-effect-free.
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// Must be safe to call when the resource is already converged
    /// (return `NoChange` in that case), even if the guard was bypassed.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// Whether this resource can react to the given notification
    fn supports(&self, _action: NotifyAction) -> bool {
        false
    }

    /// React to a notification from a changed resource
    fn notify(&self, action: NotifyAction, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        bail!("{} does not support {}", self.id(), action)
    }

    /// Detailed preview of the pending change, e.g. a unified diff
    fn preview(&self) -> Option<String> {
        None
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
