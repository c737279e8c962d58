//! Concrete resources and the collaborators they drive
//!
//! Every resource implements [`declarative::Resource`]:
//! - State detection (current vs desired), used as the default guard
//! - Apply function (converge current → desired), safe to re-run
//! - Notification handling for services (restart/reload) and commands (run)

pub mod directory;
pub mod exec;
pub mod file;
pub mod ownership;
pub mod package;
pub mod service;

pub use declarative::{
    ApplyContext, ApplyResult, NotifyAction, Resource, ResourceKind, ResourceState,
};

use crate::config::Settings;
use std::sync::Arc;

/// Package and service managers shared by all resources of a run
#[derive(Clone)]
pub struct Host {
    pub packages: Arc<aptkit::Client>,
    pub services: Arc<svckit::Client>,
}

impl Host {
    /// Connect to the package and service managers of this machine.
    ///
    /// A missing manager is not an error here: recipes can still be
    /// validated and planned, and resources needing it fail when queried.
    pub fn detect(settings: &Settings) -> Self {
        let packages = match aptkit::Client::new() {
            Ok(client) => client.with_retry(settings.retry.to_config()),
            Err(e) => {
                log::debug!("package manager unavailable: {e}");
                aptkit::Client::with_backend(Box::new(Unavailable))
            }
        };
        let services = match svckit::Client::for_manager(settings.service_manager) {
            Ok(client) => client,
            Err(e) => {
                log::debug!("service manager unavailable: {e}");
                svckit::Client::with_backend(Box::new(Unavailable))
            }
        };
        Self {
            packages: Arc::new(packages),
            services: Arc::new(services),
        }
    }
}

/// Stand-in for a manager this host does not have
struct Unavailable;

impl aptkit::Backend for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    fn installed_version(&self, _name: &str) -> aptkit::Result<Option<String>> {
        Err(aptkit::Error::AptNotFound)
    }

    fn install(&self, _package: &aptkit::Package) -> aptkit::Result<()> {
        Err(aptkit::Error::AptNotFound)
    }
}

impl svckit::Backend for Unavailable {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_active(&self, _service: &str) -> svckit::Result<bool> {
        Err(svckit::Error::ManagerNotFound)
    }

    fn is_enabled(&self, _service: &str) -> svckit::Result<bool> {
        Err(svckit::Error::ManagerNotFound)
    }

    fn control(&self, _service: &str, _action: svckit::Action) -> svckit::Result<()> {
        Err(svckit::Error::ManagerNotFound)
    }
}
