//! Error types for apt operations.
//!
//! Errors are categorized to enable smart retry logic and appropriate
//! user feedback. `apt-get` reports nearly everything on stderr with a
//! non-zero exit, so the category is recovered from the message text.

use thiserror::Error;

/// Categories of apt errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable)
    Network,
    /// Package not found in any configured source
    NotFound,
    /// The dpkg/apt lock is held by another process (transient, retryable)
    Locked,
    /// Permission denied (needs root)
    Permission,
    /// No space left on device
    DiskFull,
    /// apt-get or dpkg-query not found
    AptNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Locked)
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and apt sources, then try again",
            Self::NotFound => "Verify the package name or run an apt-get update first",
            Self::Locked => "Wait for the other apt/dpkg process to finish",
            Self::Permission => "Run as root",
            Self::DiskFull => "Free disk space (apt-get clean) and try again",
            Self::AptNotFound => "This host is not Debian-based; apt-get is required",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during apt operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error (unreachable mirror, DNS, timeout)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from apt
        message: String,
    },

    /// Package not found in any configured source
    #[error("package not found: {name}")]
    NotFound {
        /// Name of the package that could not be found
        name: String,
    },

    /// Another process holds the dpkg lock
    #[error("package database locked: {message}")]
    Locked {
        /// Lock message from apt
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// No space left on device
    #[error("disk full: {message}")]
    DiskFull {
        /// Details from apt
        message: String,
    },

    /// apt-get is not installed or not in PATH
    #[error("apt-get not found; a Debian-based system is required")]
    AptNotFound,

    /// Command execution failed
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::DiskFull { .. } => ErrorCategory::DiskFull,
            Error::AptNotFound => ErrorCategory::AptNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from apt-get/dpkg output.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_apt_output(stderr: &str, package_name: Option<&str>) -> Self {
        let lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if lower.contains("are you root")
            || lower.contains("permission denied")
            || lower.contains("operation not permitted")
        {
            return Error::Permission { message };
        }

        // Unprivileged runs also fail to acquire the lock; those are caught above
        if lower.contains("could not get lock")
            || lower.contains("unable to acquire the dpkg frontend lock")
            || lower.contains("is another process using it")
        {
            return Error::Locked { message };
        }

        if lower.contains("temporary failure resolving")
            || lower.contains("could not resolve")
            || lower.contains("failed to fetch")
            || lower.contains("connection timed out")
            || lower.contains("connection refused")
            || lower.contains("unable to connect")
            || lower.contains("network is unreachable")
            || lower.contains("hash sum mismatch")
        {
            return Error::Network { message };
        }

        if lower.contains("unable to locate package")
            || lower.contains("has no installation candidate")
            || (lower.contains("version") && lower.contains("was not found"))
        {
            return Error::NotFound {
                name: package_name.unwrap_or("unknown").to_string(),
            };
        }

        if lower.contains("no space left on device")
            || lower.contains("you don't have enough free space")
        {
            return Error::DiskFull { message };
        }

        Error::CommandFailed {
            message: format!(
                "apt-get failed{}",
                package_name
                    .map(|n| format!(" for {n}"))
                    .unwrap_or_default()
            ),
            stderr: message,
        }
    }
}

/// Result type for apt operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Locked.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Permission.is_retryable());
    }

    #[test]
    fn test_from_apt_output_network() {
        let err = Error::from_apt_output(
            "E: Failed to fetch http://deb.debian.org/debian/pool/main/n/nginx/nginx_1.22.deb  \
             Temporary failure resolving 'deb.debian.org'",
            Some("nginx"),
        );
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_apt_output_not_found() {
        let err = Error::from_apt_output("E: Unable to locate package nginxx", Some("nginxx"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(matches!(err, Error::NotFound { ref name } if name == "nginxx"));
    }

    #[test]
    fn test_from_apt_output_version_not_found() {
        let err = Error::from_apt_output(
            "E: Version '9.9' for 'nginx' was not found",
            Some("nginx"),
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_apt_output_locked() {
        let err = Error::from_apt_output(
            "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 4242 (apt-get)\n\
             E: Unable to acquire the dpkg frontend lock (/var/lib/dpkg/lock-frontend), is another process using it?",
            Some("git"),
        );
        assert_eq!(err.category(), ErrorCategory::Locked);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_apt_output_permission() {
        let err = Error::from_apt_output(
            "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)\n\
             E: Unable to acquire the dpkg frontend lock, are you root?",
            None,
        );
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_apt_output_disk_full() {
        let err = Error::from_apt_output(
            "E: You don't have enough free space in /var/cache/apt/archives/.",
            Some("openjdk-8-jdk"),
        );
        assert_eq!(err.category(), ErrorCategory::DiskFull);
    }

    #[test]
    fn test_from_apt_output_fallback() {
        let err = Error::from_apt_output("E: Sub-process /usr/bin/dpkg returned an error code (1)", Some("foo"));
        assert_eq!(err.category(), ErrorCategory::Other);
        assert!(err.to_string().contains("apt-get failed for foo"));
    }
}
