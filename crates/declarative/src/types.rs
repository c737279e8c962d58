//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a declared resource
///
/// The kind is fixed by the concrete resource type and never changes
/// after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A package installed through the system package manager
    Package,
    /// A file with given content, owner, group and mode
    File,
    /// A directory with given owner, group and mode
    Directory,
    /// A system service in a running/enabled state
    Service,
    /// A shell command
    Exec,
}

impl ResourceKind {
    /// Lowercase name, as used in recipes and `--target` filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::File => "file",
            Self::Directory => "directory",
            Self::Service => "service",
            Self::Exec => "exec",
        }
    }

    /// Parse a kind name, accepting plural forms
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "package" | "packages" => Some(Self::Package),
            "file" | "files" | "template" | "templates" => Some(Self::File),
            "directory" | "directories" | "dir" => Some(Self::Directory),
            "service" | "services" => Some(Self::Service),
            "exec" | "execute" | "command" | "commands" => Some(Self::Exec),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

/// What a failed step does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop processing the remaining resources
    #[default]
    Abort,
    /// Record the failure and keep going
    Ignore,
}

impl FailurePolicy {
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Evaluate guards and route notifications, but change nothing
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}
