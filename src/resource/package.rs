//! Package resource - installed through apt

use anyhow::Result;
use aptkit::Client;
use declarative::Hint;
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Resource, ResourceKind, ResourceState};

#[derive(Clone)]
pub struct Package {
    pub id: String,
    pub package: aptkit::Package,
    client: Arc<Client>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.id)
            .field("package", &self.package)
            .finish_non_exhaustive()
    }
}

impl Package {
    pub fn new(id: impl Into<String>, package: aptkit::Package, client: Arc<Client>) -> Self {
        Self {
            id: id.into(),
            package,
            client,
        }
    }

    fn installed_version(&self) -> Result<Option<String>> {
        self.client
            .installed_version(&self.package.name)
            .map_err(|e| with_hint(e, format!("Could not query {}", self.package.name)))
    }
}

/// Wrap an apt error with advice for its category
fn with_hint(error: aptkit::Error, message: String) -> anyhow::Error {
    let advice = error.category().advice();
    anyhow::Error::new(error).context(Hint::new(message, advice))
}

impl Resource for Package {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Install package {}", self.package)
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Package
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(match (self.installed_version()?, &self.package.version) {
            (None, _) => ResourceState::Absent,
            (Some(have), Some(want)) if &have != want => ResourceState::Modified {
                from: have,
                to: want.clone(),
            },
            (Some(have), _) => ResourceState::Present {
                details: Some(have),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: self.package.version.clone(),
        }
    }

    fn needs_apply(&self) -> Result<bool> {
        let installed = self.installed_version()?;
        Ok(!self.package.is_satisfied_by(installed.as_deref()))
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let installed = self.installed_version()?;
        if self.package.is_satisfied_by(installed.as_deref()) {
            return Ok(ApplyResult::NoChange);
        }

        self.client
            .install(&self.package)
            .map_err(|e| with_hint(e, format!("Failed to install {}", self.package)))?;

        Ok(if installed.is_some() {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}
