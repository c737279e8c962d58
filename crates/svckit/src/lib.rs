//! # svckit
//!
//! Pure Rust library for controlling system services.
//!
//! Two backends are provided: systemd (`systemctl`) and SysV init
//! (`service` / `update-rc.d`). [`detect`] picks the one the running
//! system uses.
//!
//! ```no_run
//! use svckit::{Client, ServiceManager};
//!
//! let client = Client::for_manager(ServiceManager::Auto).expect("no service manager");
//! if !client.status("nginx").expect("status").active {
//!     client.backend().start("nginx").expect("start");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::Backend;
pub use error::{Error, ErrorCategory, Result};
pub use types::{Action, ServiceManager, ServiceStatus};

use backend::{systemd::SystemdBackend, sysv::SysvBackend};
use std::path::Path;

/// Detect the service manager of the system mounted at `root`.
///
/// systemd is in charge when `/run/systemd/system` exists; otherwise SysV
/// is used when `/etc/init.d` exists.
pub fn detect(root: &Path) -> Result<ServiceManager> {
    if root.join("run/systemd/system").is_dir() {
        Ok(ServiceManager::Systemd)
    } else if root.join("etc/init.d").is_dir() {
        Ok(ServiceManager::Sysv)
    } else {
        Err(Error::ManagerNotFound)
    }
}

/// High-level client for service operations.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client for the given manager, detecting it when `Auto`.
    pub fn for_manager(manager: ServiceManager) -> Result<Self> {
        let resolved = match manager {
            ServiceManager::Auto => detect(Path::new("/"))?,
            other => other,
        };
        log::debug!("using {resolved} service manager");
        let backend: Box<dyn Backend> = match resolved {
            ServiceManager::Sysv => Box::new(SysvBackend::new()),
            ServiceManager::Systemd | ServiceManager::Auto => Box::new(SystemdBackend::new()),
        };
        Ok(Self { backend })
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Current running and boot state.
    pub fn status(&self, service: &str) -> Result<ServiceStatus> {
        self.backend.status(service)
    }

    /// Bring the service to the desired running and boot state.
    ///
    /// Returns the actions performed, empty when nothing needed doing.
    pub fn converge(&self, service: &str, desired: ServiceStatus) -> Result<Vec<Action>> {
        let current = self.status(service)?;
        let mut actions = Vec::new();
        if current.enabled != desired.enabled {
            actions.push(if desired.enabled {
                Action::Enable
            } else {
                Action::Disable
            });
        }
        if current.active != desired.active {
            actions.push(if desired.active {
                Action::Start
            } else {
                Action::Stop
            });
        }
        for action in &actions {
            self.backend.control(service, *action)?;
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeInit {
        services: Mutex<HashMap<String, ServiceStatus>>,
        calls: Mutex<Vec<(String, Action)>>,
    }

    impl Backend for FakeInit {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_active(&self, service: &str) -> Result<bool> {
            Ok(self
                .services
                .lock()
                .unwrap()
                .get(service)
                .is_some_and(|s| s.active))
        }

        fn is_enabled(&self, service: &str) -> Result<bool> {
            Ok(self
                .services
                .lock()
                .unwrap()
                .get(service)
                .is_some_and(|s| s.enabled))
        }

        fn control(&self, service: &str, action: Action) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((service.to_string(), action));
            let mut services = self.services.lock().unwrap();
            let entry = services.entry(service.to_string()).or_default();
            match action {
                Action::Start | Action::Restart | Action::Reload => entry.active = true,
                Action::Stop => entry.active = false,
                Action::Enable => entry.enabled = true,
                Action::Disable => entry.enabled = false,
            }
            Ok(())
        }
    }

    const RUNNING: ServiceStatus = ServiceStatus {
        active: true,
        enabled: true,
    };

    #[test]
    fn test_converge_starts_and_enables() {
        let client = Client::with_backend(Box::new(FakeInit::default()));
        let actions = client.converge("nginx", RUNNING).unwrap();
        assert_eq!(actions, vec![Action::Enable, Action::Start]);
        assert_eq!(client.status("nginx").unwrap(), RUNNING);
    }

    #[test]
    fn test_converge_is_idempotent() {
        let client = Client::with_backend(Box::new(FakeInit::default()));
        client.converge("nginx", RUNNING).unwrap();
        assert!(client.converge("nginx", RUNNING).unwrap().is_empty());
    }

    #[test]
    fn test_converge_stops() {
        let fake = FakeInit::default();
        fake.services
            .lock()
            .unwrap()
            .insert("apache2".to_string(), RUNNING);
        let client = Client::with_backend(Box::new(fake));
        let actions = client
            .converge(
                "apache2",
                ServiceStatus {
                    active: false,
                    enabled: false,
                },
            )
            .unwrap();
        assert_eq!(actions, vec![Action::Disable, Action::Stop]);
    }

    #[test]
    fn test_detect() {
        let root = TempDir::new().unwrap();
        assert!(matches!(detect(root.path()), Err(Error::ManagerNotFound)));

        fs::create_dir_all(root.path().join("etc/init.d")).unwrap();
        assert_eq!(detect(root.path()).unwrap(), ServiceManager::Sysv);

        fs::create_dir_all(root.path().join("run/systemd/system")).unwrap();
        assert_eq!(detect(root.path()).unwrap(), ServiceManager::Systemd);
    }
}
