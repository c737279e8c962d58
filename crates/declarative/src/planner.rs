//! Run planner - ordered steps and the notification edges between them

use crate::error::{Error, Result};
use crate::guard::Guard;
use crate::notify::{NotificationEdge, NotifyAction};
use crate::resource::{BoxedResource, Resource};
use crate::types::{FailurePolicy, ResourceKind};
use std::collections::HashSet;

/// A resource with its guards and failure policy
#[derive(Debug)]
pub struct Step {
    pub resource: BoxedResource,
    /// Custom guards; when non-empty they replace the default guard
    pub guards: Vec<Guard>,
    pub on_failure: FailurePolicy,
}

impl Step {
    pub fn new(resource: BoxedResource) -> Self {
        Self {
            resource,
            guards: Vec::new(),
            on_failure: FailurePolicy::Abort,
        }
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Failures of this step are recorded but do not stop the run
    pub fn ignore_failure(mut self) -> Self {
        self.on_failure = FailurePolicy::Ignore;
        self
    }

    pub fn id(&self) -> String {
        self.resource.id()
    }
}

/// An ordered run of steps
///
/// Declaration order is execution order. Ids are unique within a run.
#[derive(Debug, Default)]
pub struct Run {
    steps: Vec<Step>,
    edges: Vec<NotificationEdge>,
    ids: HashSet<String>,
}

impl Run {
    /// Create a new empty run
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn add(&mut self, step: Step) -> Result<()> {
        let id = step.id();
        if !self.ids.insert(id.clone()) {
            return Err(Error::DuplicateId(id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Append a resource with no custom guard that aborts on failure
    pub fn add_resource(&mut self, resource: BoxedResource) -> Result<()> {
        self.add(Step::new(resource))
    }

    /// Declare that `to` performs `action` when `from` changes
    ///
    /// Both resources must already be in the run. Adding the same edge
    /// twice is a no-op.
    pub fn notify(&mut self, from: &str, to: &str, action: NotifyAction) -> Result<()> {
        if !self.ids.contains(from) {
            return Err(Error::UnknownResource(from.to_string()));
        }
        let target = self
            .step(to)
            .ok_or_else(|| Error::UnknownResource(to.to_string()))?;
        if !target.resource.supports(action) {
            return Err(Error::UnsupportedAction {
                id: to.to_string(),
                action,
            });
        }

        let edge = NotificationEdge::new(from, to, action);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn edges(&self) -> &[NotificationEdge] {
        &self.edges
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id() == id)
    }

    /// Consume the run into its parts
    pub fn into_parts(self) -> (Vec<Step>, Vec<NotificationEdge>) {
        (self.steps, self.edges)
    }

    /// Keep only steps matching a predicate, dropping edges that lose an end
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        let steps: Vec<Step> = self
            .steps
            .into_iter()
            .filter(|s| predicate(s.resource.as_ref()))
            .collect();
        let ids: HashSet<String> = steps.iter().map(Step::id).collect();
        let edges = self
            .edges
            .into_iter()
            .filter(|e| ids.contains(&e.from) && ids.contains(&e.to))
            .collect();
        Self { steps, edges, ids }
    }

    /// Filter run to only include resources matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|r| matches_filter(r, kind.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if run is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Parse a target string like "kind.name" into (kind, name)
///
/// Only the first dot splits, so ids like "nginx.conf" survive.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => match ResourceKind::parse(target) {
            Some(_) => (Some(target.to_string()), None),
            None => (None, Some(target.to_string())),
        },
        Some((kind, name)) if ResourceKind::parse(kind).is_some() => {
            (Some(kind.to_string()), Some(name.to_string()))
        }
        Some(_) => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, kind: Option<&str>, name: Option<&str>) -> bool {
    if let Some(k) = kind
        && ResourceKind::parse(k) != Some(resource.kind())
    {
        return false;
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockResource;

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("package"), (Some("package".to_string()), None));
        assert_eq!(
            parse_target("service.nginx"),
            (Some("service".to_string()), Some("nginx".to_string()))
        );
        assert_eq!(
            parse_target("nginx.conf"),
            (None, Some("nginx.conf".to_string()))
        );
        assert_eq!(parse_target("nginx"), (None, Some("nginx".to_string())));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut run = Run::new();
        run.add_resource(Box::new(MockResource::converged("nginx"))).unwrap();
        let err = run
            .add_resource(Box::new(MockResource::converged("nginx")))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "nginx"));
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn test_notify_validates_endpoints() {
        let mut run = Run::new();
        run.add_resource(Box::new(MockResource::drifted("write-config")))
            .unwrap();
        run.add_resource(Box::new(MockResource::service("nginx")))
            .unwrap();

        assert!(matches!(
            run.notify("write-config", "missing", NotifyAction::Restart),
            Err(Error::UnknownResource(_))
        ));
        assert!(matches!(
            run.notify("missing", "nginx", NotifyAction::Restart),
            Err(Error::UnknownResource(_))
        ));
        assert!(matches!(
            run.notify("nginx", "write-config", NotifyAction::Restart),
            Err(Error::UnsupportedAction { .. })
        ));

        run.notify("write-config", "nginx", NotifyAction::Restart)
            .unwrap();
        run.notify("write-config", "nginx", NotifyAction::Restart)
            .unwrap();
        assert_eq!(run.edges().len(), 1);
    }

    #[test]
    fn test_filter_drops_dangling_edges() {
        let mut run = Run::new();
        run.add_resource(Box::new(MockResource::drifted("write-config")))
            .unwrap();
        run.add_resource(Box::new(MockResource::service("nginx")))
            .unwrap();
        run.notify("write-config", "nginx", NotifyAction::Restart)
            .unwrap();

        let run = run.filter_by_target(Some("service"));
        assert_eq!(run.len(), 1);
        assert!(run.edges().is_empty());
    }
}
