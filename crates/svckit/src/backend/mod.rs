//! Backend abstraction for service managers.

pub mod systemd;
pub mod sysv;

use crate::error::Result;
use crate::types::{Action, ServiceStatus};

/// Backend trait for service operations.
pub trait Backend: Send + Sync {
    /// Name of the service manager (for logs).
    fn name(&self) -> &'static str;

    /// Whether the service is currently running.
    fn is_active(&self, service: &str) -> Result<bool>;

    /// Whether the service starts at boot.
    fn is_enabled(&self, service: &str) -> Result<bool>;

    /// Perform an action on the service.
    fn control(&self, service: &str, action: Action) -> Result<()>;

    /// Current running and boot state.
    fn status(&self, service: &str) -> Result<ServiceStatus> {
        Ok(ServiceStatus {
            active: self.is_active(service)?,
            enabled: self.is_enabled(service)?,
        })
    }

    /// Start the service.
    fn start(&self, service: &str) -> Result<()> {
        self.control(service, Action::Start)
    }

    /// Stop the service.
    fn stop(&self, service: &str) -> Result<()> {
        self.control(service, Action::Stop)
    }

    /// Restart the service.
    fn restart(&self, service: &str) -> Result<()> {
        self.control(service, Action::Restart)
    }

    /// Reload the service configuration.
    fn reload(&self, service: &str) -> Result<()> {
        self.control(service, Action::Reload)
    }

    /// Enable the service at boot.
    fn enable(&self, service: &str) -> Result<()> {
        self.control(service, Action::Enable)
    }

    /// Disable the service at boot.
    fn disable(&self, service: &str) -> Result<()> {
        self.control(service, Action::Disable)
    }
}
