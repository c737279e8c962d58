//! Core types for service management.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which service manager to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceManager {
    /// Detect from the running system
    #[default]
    Auto,
    /// systemd via `systemctl`
    Systemd,
    /// SysV init scripts via `service` and `update-rc.d`
    Sysv,
}

impl FromStr for ServiceManager {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "systemd" | "systemctl" => Ok(Self::Systemd),
            "sysv" | "sysvinit" | "init.d" => Ok(Self::Sysv),
            _ => Err(Error::UnknownManager(s.to_string())),
        }
    }
}

impl fmt::Display for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Systemd => "systemd",
            Self::Sysv => "sysv",
        })
    }
}

/// An action on a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Stop then start
    Restart,
    /// Re-read configuration without stopping
    Reload,
    /// Start at boot
    Enable,
    /// Do not start at boot
    Disable,
}

impl Action {
    /// Verb as understood by both `systemctl` and `service`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Currently running
    pub active: bool,
    /// Starts at boot
    pub enabled: bool,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}",
            if self.active { "running" } else { "stopped" },
            if self.enabled { "enabled" } else { "disabled" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_from_str() {
        assert_eq!("systemd".parse::<ServiceManager>().unwrap(), ServiceManager::Systemd);
        assert_eq!("SysV".parse::<ServiceManager>().unwrap(), ServiceManager::Sysv);
        assert_eq!("auto".parse::<ServiceManager>().unwrap(), ServiceManager::Auto);
        assert!("upstart".parse::<ServiceManager>().is_err());
    }

    #[test]
    fn test_status_display() {
        let status = ServiceStatus {
            active: true,
            enabled: false,
        };
        assert_eq!(status.to_string(), "running, disabled");
    }
}
