//! Error types for building and running declarations.
//!
//! [`Error`] covers problems found while assembling a run (before anything
//! touches the system). [`ErrorKind`] classifies failures recorded in
//! outcomes while the run is in progress.

use crate::notify::NotifyAction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while assembling a run or rendering templates
#[derive(Debug, Error)]
pub enum Error {
    /// Two resources in one run share an id
    #[error("duplicate resource id: {0}")]
    DuplicateId(String),

    /// A notification edge names a resource that is not in the run
    #[error("notification references unknown resource: {0}")]
    UnknownResource(String),

    /// A notification edge asks a resource for an action it cannot perform
    #[error("resource {id} does not support the {action} action")]
    UnsupportedAction { id: String, action: NotifyAction },

    /// A template referenced a variable missing from the context
    #[error("template variable not bound: {name} (line {line})")]
    UnboundVariable { name: String, line: usize },

    /// A template placeholder was opened but never closed
    #[error("unterminated placeholder at line {line}")]
    UnterminatedPlaceholder { line: usize },
}

/// Result type for declaration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failure recorded in an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The guard itself failed; the action ran anyway
    GuardEvaluation,
    /// The side-effecting action failed
    ActionFailed,
    /// A triggered notification action failed
    NotificationFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GuardEvaluation => "guard evaluation error",
            Self::ActionFailed => "action failed",
            Self::NotificationFailed => "notification failed",
        };
        f.write_str(s)
    }
}

/// A failure attached to an outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
    /// What the user can do about it, when the failure was classified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl RunError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            advice: None,
        }
    }

    pub fn with_advice(mut self, advice: Option<String>) -> Self {
        self.advice = advice;
        self
    }

    /// Build from a resource error, picking up any [`Hint`] in its chain
    pub fn from_anyhow(kind: ErrorKind, error: &anyhow::Error) -> Self {
        let advice = error.downcast_ref::<Hint>().map(|h| h.advice.clone());
        Self::new(kind, format!("{error:#}")).with_advice(advice)
    }
}

/// Error context that also tells the user how to fix the failure
///
/// Resources attach it with `anyhow::Context::context`; it displays as
/// `message`, and the executor copies `advice` into the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub message: String,
    pub advice: String,
}

impl Hint {
    pub fn new(message: impl Into<String>, advice: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            advice: advice.into(),
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_hint_is_found_under_outer_context() {
        let err = Err::<(), _>(std::io::Error::other("E: Unable to locate package ngnix"))
            .context(Hint::new("Failed to install ngnix", "Verify the package name"))
            .context("Invalid resource 'web'")
            .unwrap_err();

        let run_error = RunError::from_anyhow(ErrorKind::ActionFailed, &err);
        assert_eq!(run_error.advice.as_deref(), Some("Verify the package name"));
        assert!(run_error.message.contains("Failed to install ngnix"));
        assert!(run_error.message.contains("Unable to locate package"));
    }

    #[test]
    fn test_plain_error_has_no_advice() {
        let err = anyhow::anyhow!("command exited with 1");
        let run_error = RunError::from_anyhow(ErrorKind::ActionFailed, &err);
        assert_eq!(run_error.advice, None);
        assert_eq!(run_error.message, "command exited with 1");
    }
}
