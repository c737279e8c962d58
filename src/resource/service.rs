//! Service resource - running and boot state, restart/reload on notification

use anyhow::{Result, bail};
use declarative::Hint;
use std::sync::Arc;
use svckit::{Client, ServiceStatus};

use super::{ApplyContext, ApplyResult, NotifyAction, Resource, ResourceKind, ResourceState};

#[derive(Clone)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Desired running state; `None` leaves it alone
    pub running: Option<bool>,
    /// Desired boot state; `None` leaves it alone
    pub enabled: Option<bool>,
    client: Arc<Client>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("running", &self.running)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Service {
    pub fn new(id: impl Into<String>, name: impl Into<String>, client: Arc<Client>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            running: None,
            enabled: None,
            client,
        }
    }

    pub fn running(mut self, running: Option<bool>) -> Self {
        self.running = running;
        self
    }

    pub fn enabled(mut self, enabled: Option<bool>) -> Self {
        self.enabled = enabled;
        self
    }

    fn status(&self) -> Result<ServiceStatus> {
        self.client
            .status(&self.name)
            .map_err(|e| with_hint(e, format!("Could not query service {}", self.name)))
    }

    /// Desired status, with unmanaged fields taken from `current`
    fn target(&self, current: ServiceStatus) -> ServiceStatus {
        ServiceStatus {
            active: self.running.unwrap_or(current.active),
            enabled: self.enabled.unwrap_or(current.enabled),
        }
    }

    fn wanted(&self) -> String {
        let mut parts = Vec::new();
        if let Some(running) = self.running {
            parts.push(if running { "running" } else { "stopped" });
        }
        if let Some(enabled) = self.enabled {
            parts.push(if enabled { "enabled" } else { "disabled" });
        }
        if parts.is_empty() {
            "unmanaged".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Wrap a service manager error with advice for its category
fn with_hint(error: svckit::Error, message: String) -> anyhow::Error {
    let advice = error.category().advice();
    anyhow::Error::new(error).context(Hint::new(message, advice))
}

impl Resource for Service {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Service {} ({})", self.name, self.wanted())
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Service
    }

    fn current_state(&self) -> Result<ResourceState> {
        let current = self.status()?;
        if self.target(current) == current {
            Ok(ResourceState::Present {
                details: Some(self.wanted()),
            })
        } else {
            Ok(ResourceState::Modified {
                from: current.to_string(),
                to: self.wanted(),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.wanted()),
        }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let current = self.status()?;
        let actions = self
            .client
            .converge(&self.name, self.target(current))
            .map_err(|e| with_hint(e, format!("Could not converge service {}", self.name)))?;
        if actions.is_empty() {
            return Ok(ApplyResult::NoChange);
        }
        log::info!(
            "{}: {}",
            self.name,
            actions.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        Ok(ApplyResult::Modified)
    }

    fn supports(&self, action: NotifyAction) -> bool {
        matches!(action, NotifyAction::Restart | NotifyAction::Reload)
    }

    fn notify(&self, action: NotifyAction, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let backend = self.client.backend();
        let result = match action {
            NotifyAction::Restart => backend.restart(&self.name),
            NotifyAction::Reload => backend.reload(&self.name),
            NotifyAction::Run => bail!("service {} cannot be run", self.name),
        };
        result.map_err(|e| with_hint(e, format!("Could not {action} {}", self.name)))?;

        if ctx.verbose {
            log::info!(
                "{action} {} (triggered by {})",
                self.name,
                ctx.triggered_by.join(", ")
            );
        }
        Ok(ApplyResult::Modified)
    }
}
