//! Guard evaluation - decides whether a resource's action must run
//!
//! Without custom guards, a resource runs when its default guard
//! ([`Resource::needs_apply`]) reports drift. Custom guards replace the
//! default guard entirely. Guards only read system state through a
//! [`SystemProbe`], so evaluating them twice gives the same answer.
//!
//! A guard that errors fails open: the action runs and the error is
//! carried into the outcome.

use crate::resource::Resource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Read-only view of system state that guards are evaluated against
pub trait SystemProbe: Send + Sync {
    /// Whether the path exists
    fn exists(&self, path: &Path) -> bool;

    /// Last modification time of the path
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Current time
    fn now(&self) -> SystemTime;
}

/// Probe backed by the real filesystem and clock
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl SystemProbe for HostProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Declarative condition over system state
///
/// In TOML:
///
/// ```toml
/// only_if = { older_than = { path = "/var/lib/apt/periodic/update-success-stamp", seconds = 86400 } }
/// not_if = { exists = { path = "/opt/node/bin/node" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The path exists
    Exists { path: PathBuf },
    /// The path does not exist
    Missing { path: PathBuf },
    /// The path exists and was last modified more than `seconds` ago
    OlderThan { path: PathBuf, seconds: u64 },
    /// Every condition holds
    All(Vec<Condition>),
    /// At least one condition holds
    Any(Vec<Condition>),
    /// The condition does not hold
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluate the condition against a probe
    pub fn evaluate(&self, probe: &dyn SystemProbe) -> Result<bool> {
        match self {
            Self::Exists { path } => Ok(probe.exists(path)),
            Self::Missing { path } => Ok(!probe.exists(path)),
            Self::OlderThan { path, seconds } => {
                if !probe.exists(path) {
                    return Ok(false);
                }
                let mtime = probe
                    .modified(path)
                    .with_context(|| format!("Could not read mtime of {}", path.display()))?;
                // An mtime in the future is not "older"
                Ok(probe
                    .now()
                    .duration_since(mtime)
                    .is_ok_and(|age| age > Duration::from_secs(*seconds)))
            }
            Self::All(conditions) => {
                for c in conditions {
                    if !c.evaluate(probe)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any(conditions) => {
                for c in conditions {
                    if c.evaluate(probe)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(inner) => Ok(!inner.evaluate(probe)?),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, name: &str, cs: &[Condition]| {
            write!(f, "{name}(")?;
            for (i, c) in cs.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str(")")
        };
        match self {
            Self::Exists { path } => write!(f, "exists({})", path.display()),
            Self::Missing { path } => write!(f, "missing({})", path.display()),
            Self::OlderThan { path, seconds } => {
                write!(f, "older_than({}, {seconds}s)", path.display())
            }
            Self::All(cs) => join(f, "all", cs),
            Self::Any(cs) => join(f, "any", cs),
            Self::Not(c) => write!(f, "not({c})"),
        }
    }
}

/// Predicate signature for programmatic guards
pub type Predicate = dyn Fn(&dyn SystemProbe) -> Result<bool> + Send + Sync;

/// A custom guard attached to a step
#[derive(Clone)]
pub enum Guard {
    /// Run only when the condition holds
    OnlyIf(Condition),
    /// Run only when the condition does not hold
    NotIf(Condition),
    /// Run only when the predicate returns true
    Custom { name: String, predicate: Arc<Predicate> },
}

impl Guard {
    /// Build a programmatic guard
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn SystemProbe) -> Result<bool> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Whether this guard lets the action run
    pub fn permits(&self, probe: &dyn SystemProbe) -> Result<bool> {
        match self {
            Self::OnlyIf(c) => c.evaluate(probe),
            Self::NotIf(c) => Ok(!c.evaluate(probe)?),
            Self::Custom { predicate, .. } => predicate(probe),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnlyIf(c) => write!(f, "only_if {c}"),
            Self::NotIf(c) => write!(f, "not_if {c}"),
            Self::Custom { name, .. } => write!(f, "custom {name}"),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guard({self})")
    }
}

/// Result of evaluating the guards of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The action must run; `guard_error` is set when a guard failed open
    Run { guard_error: Option<String> },
    /// The action must not run
    Skip { reason: String },
}

impl GuardDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, Self::Run { .. })
    }
}

/// Decide whether a resource's action must run
pub fn should_run(
    resource: &dyn Resource,
    guards: &[Guard],
    probe: &dyn SystemProbe,
) -> GuardDecision {
    if guards.is_empty() {
        return match resource.needs_apply() {
            Ok(true) => GuardDecision::Run { guard_error: None },
            Ok(false) => GuardDecision::Skip {
                reason: "already in desired state".to_string(),
            },
            Err(e) => fail_open(&resource.id(), &e),
        };
    }

    for guard in guards {
        match guard.permits(probe) {
            Ok(true) => {}
            Ok(false) => {
                return GuardDecision::Skip {
                    reason: format!("{guard} not satisfied"),
                };
            }
            Err(e) => return fail_open(&resource.id(), &e),
        }
    }

    GuardDecision::Run { guard_error: None }
}

fn fail_open(id: &str, error: &anyhow::Error) -> GuardDecision {
    log::warn!("[{id}] guard evaluation failed, running anyway: {error:#}");
    GuardDecision::Run {
        guard_error: Some(format!("{error:#}")),
    }
}
