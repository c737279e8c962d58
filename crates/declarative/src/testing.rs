//! In-memory resources shared by the unit tests of this crate

use crate::context::ApplyContext;
use crate::notify::NotifyAction;
use crate::resource::Resource;
use crate::types::{ApplyResult, ResourceKind, ResourceState};
use anyhow::{Result, bail};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Fake system: which resources are converged, and what was called
#[derive(Debug, Default)]
pub struct MockWorld {
    converged: Mutex<HashSet<String>>,
    applies: Mutex<Vec<String>>,
    notifications: Mutex<Vec<(String, NotifyAction)>>,
}

impl MockWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn converge(&self, id: &str) {
        self.converged.lock().unwrap().insert(id.to_string());
    }

    pub fn is_converged(&self, id: &str) -> bool {
        self.converged.lock().unwrap().contains(id)
    }

    pub fn apply_count(&self, id: &str) -> usize {
        self.applies.lock().unwrap().iter().filter(|a| *a == id).count()
    }

    pub fn total_applies(&self) -> usize {
        self.applies.lock().unwrap().len()
    }

    pub fn notifications(&self) -> Vec<(String, NotifyAction)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct MockResource {
    id: String,
    kind: ResourceKind,
    world: Arc<MockWorld>,
    fail: Option<String>,
    guard_error: bool,
    notify_fail: bool,
}

impl MockResource {
    pub fn new(id: &str, kind: ResourceKind, world: &Arc<MockWorld>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            world: Arc::clone(world),
            fail: None,
            guard_error: false,
            notify_fail: false,
        }
    }

    /// File-like resource that needs changes, in its own world
    pub fn drifted(id: &str) -> Self {
        Self::new(id, ResourceKind::File, &MockWorld::new())
    }

    /// File-like resource already in desired state, in its own world
    pub fn converged(id: &str) -> Self {
        let world = MockWorld::new();
        world.converge(id);
        Self::new(id, ResourceKind::File, &world)
    }

    /// Converged service that accepts restart/reload
    pub fn service(id: &str) -> Self {
        let world = MockWorld::new();
        world.converge(id);
        Self::new(id, ResourceKind::Service, &world)
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail = Some(message.to_string());
        self
    }

    pub fn with_guard_error(mut self) -> Self {
        self.guard_error = true;
        self
    }

    pub fn failing_notify(mut self) -> Self {
        self.notify_fail = true;
        self
    }
}

impl Resource for MockResource {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Mock {} {}", self.kind, self.id)
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.guard_error {
            bail!("probe failed for {}", self.id);
        }
        if self.world.is_converged(&self.id) {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.world.applies.lock().unwrap().push(self.id.clone());
        if let Some(msg) = &self.fail {
            bail!("{msg}");
        }
        if self.world.is_converged(&self.id) {
            return Ok(ApplyResult::NoChange);
        }
        self.world.converge(&self.id);
        Ok(ApplyResult::Created)
    }

    fn supports(&self, action: NotifyAction) -> bool {
        match self.kind {
            ResourceKind::Service => matches!(action, NotifyAction::Restart | NotifyAction::Reload),
            ResourceKind::Exec => action == NotifyAction::Run,
            _ => false,
        }
    }

    fn notify(&self, action: NotifyAction, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.world
            .notifications
            .lock()
            .unwrap()
            .push((self.id.clone(), action));
        if self.notify_fail {
            bail!("{} {action} failed", self.id);
        }
        Ok(ApplyResult::Modified)
    }
}
