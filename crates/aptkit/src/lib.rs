//! # aptkit
//!
//! Pure Rust library for apt/dpkg package management.
//!
//! This crate provides functionality for:
//! - Querying installed package versions through `dpkg-query`
//! - Installing packages (optionally pinned to a version) with smart retry
//!
//! ## Example
//!
//! ```no_run
//! use aptkit::{Client, Package};
//!
//! let client = Client::new().expect("apt not available");
//! let nginx = Package::new("nginx");
//! if !client.is_installed(&nginx).expect("query failed") {
//!     client.install(&nginx).expect("install failed");
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Network errors and dpkg lock contention are retried with exponential
//! backoff. Configure retry behavior with [`RetryConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use backend::Backend;
pub use error::{Error, ErrorCategory, Result};
pub use types::{InstalledPackage, Package, RetryConfig};

use backend::apt::AptBackend;

/// High-level client for package operations.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a new Client with the apt backend and default retry policy.
    ///
    /// Returns an error if apt-get is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self::with_backend(Box::new(AptBackend::new()?)))
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy used by [`Client::install`].
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check if the package manager is available.
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Installed version of a package.
    pub fn installed_version(&self, name: &str) -> Result<Option<String>> {
        self.backend.installed_version(name)
    }

    /// Check if a package is installed at the requested version.
    pub fn is_installed(&self, package: &Package) -> Result<bool> {
        self.backend.is_installed(package)
    }

    /// Install a package, retrying transient failures.
    pub fn install(&self, package: &Package) -> Result<()> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), || {
            self.backend.install(package)
        })
    }

}
