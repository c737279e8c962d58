//! Error types for service manager operations.

use thiserror::Error;

/// Categories of service errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The unit or init script does not exist
    NotFound,
    /// Permission denied (needs root)
    Permission,
    /// The service started but failed or exited
    Failed,
    /// No supported service manager found
    ManagerNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the service name; the package providing it may not be installed",
            Self::Permission => "Run as root",
            Self::Failed => "Inspect the service logs (journalctl -u <name> or /var/log)",
            Self::ManagerNotFound => "Neither systemctl nor service is available on this host",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while controlling services.
#[derive(Debug, Error)]
pub enum Error {
    /// Unit or init script not found
    #[error("service not found: {name}")]
    NotFound {
        /// Service name
        name: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// The service failed to reach the requested state
    #[error("{name} failed to {action}: {message}")]
    Failed {
        /// Service name
        name: String,
        /// Action that was attempted
        action: String,
        /// Output of the service manager
        message: String,
    },

    /// No supported service manager on this host
    #[error("no supported service manager found (systemctl or service)")]
    ManagerNotFound,

    /// Unknown service manager name
    #[error("unknown service manager: {0} (expected auto, systemd or sysv)")]
    UnknownManager(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Failed { .. } => ErrorCategory::Failed,
            Error::ManagerNotFound => ErrorCategory::ManagerNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Create an error from service manager output.
    pub fn from_output(stderr: &str, name: &str, action: &str) -> Self {
        let lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if lower.contains("not found")
            || lower.contains("not loaded")
            || lower.contains("unrecognized service")
            || lower.contains("does not exist")
            || lower.contains("no such file")
        {
            return Error::NotFound {
                name: name.to_string(),
            };
        }

        if lower.contains("access denied")
            || lower.contains("permission denied")
            || lower.contains("interactive authentication required")
            || lower.contains("must be root")
        {
            return Error::Permission { message };
        }

        Error::Failed {
            name: name.to_string(),
            action: action.to_string(),
            message,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_output_systemd_not_found() {
        let err = Error::from_output(
            "Failed to restart nginx.service: Unit nginx.service not found.",
            "nginx",
            "restart",
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_output_sysv_unrecognized() {
        let err = Error::from_output("elasticsearch: unrecognized service", "elasticsearch", "start");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_output_permission() {
        let err = Error::from_output(
            "Failed to start nginx.service: Access denied",
            "nginx",
            "start",
        );
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_from_output_failed() {
        let err = Error::from_output(
            "Job for nginx.service failed because the control process exited with error code.",
            "nginx",
            "restart",
        );
        assert_eq!(err.category(), ErrorCategory::Failed);
        assert!(err.to_string().starts_with("nginx failed to restart"));
    }
}
