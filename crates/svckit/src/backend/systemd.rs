//! systemd backend using `systemctl`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::Action;
use std::process::Command;

/// Backend that drives units through `systemctl`.
#[derive(Debug, Default)]
pub struct SystemdBackend;

impl SystemdBackend {
    /// Create a new systemd backend.
    pub fn new() -> Self {
        Self
    }

    fn is_active_unit(&self, service: &str) -> Result<bool> {
        let output = Command::new("systemctl")
            .args(["--quiet", "is-active", service])
            .output()?;
        Ok(output.status.success())
    }

    fn enablement(&self, service: &str) -> Result<bool> {
        let output = Command::new("systemctl")
            .args(["is-enabled", service])
            .output()?;
        Ok(parse_enabled(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Whether an `is-enabled` state word means the unit starts at boot by itself.
///
/// `systemctl is-enabled` exits 0 for `static`, `indirect` and `alias`
/// too, so the exit status alone cannot be trusted.
pub fn parse_enabled(stdout: &str) -> bool {
    matches!(
        stdout.lines().next().map(str::trim),
        Some("enabled" | "enabled-runtime" | "linked" | "linked-runtime")
    )
}

/// `systemctl` arguments for an action.
pub fn systemctl_args(service: &str, action: Action) -> Vec<String> {
    vec![action.as_str().to_string(), service.to_string()]
}

impl Backend for SystemdBackend {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        self.is_active_unit(service)
    }

    fn is_enabled(&self, service: &str) -> Result<bool> {
        self.enablement(service)
    }

    fn control(&self, service: &str, action: Action) -> Result<()> {
        log::debug!("systemctl {action} {service}");
        let output = Command::new("systemctl")
            .args(systemctl_args(service, action))
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_output(&stderr, service, action.as_str()));
        }
        Ok(())
    }
}
