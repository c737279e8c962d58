//! Backend abstraction for apt operations.
//!
//! The [`Backend`] trait defines the interface for interacting with the
//! package manager, allowing for different implementations (real CLI,
//! in-memory fakes for testing).

pub mod apt;

use crate::error::Result;
use crate::types::Package;

/// Backend trait for package operations.
pub trait Backend: Send + Sync {
    /// Check if the package manager is available.
    fn is_available(&self) -> bool;

    /// Installed version of a package, or `None` when not installed.
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// Check if a package is installed at the requested version.
    fn is_installed(&self, package: &Package) -> Result<bool> {
        Ok(package.is_satisfied_by(self.installed_version(&package.name)?.as_deref()))
    }

    /// Install a package.
    fn install(&self, package: &Package) -> Result<()>;
}

/// Get the default backend (real apt CLI).
pub fn default_backend() -> Result<apt::AptBackend> {
    apt::AptBackend::new()
}
