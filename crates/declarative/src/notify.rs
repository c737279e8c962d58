//! Notification routing
//!
//! When a resource changes during the primary pass, its outgoing edges are
//! looked up and the target actions queued. The queue is drained after the
//! primary pass; each target fires at most once per run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Action a notified resource performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    /// Restart a service
    Restart,
    /// Reload a service's configuration
    Reload,
    /// Re-run a command
    Run,
}

impl fmt::Display for NotifyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Run => "run",
        };
        f.write_str(s)
    }
}

/// Directed edge: when `from` changes, `to` performs `action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEdge {
    pub from: String,
    pub to: String,
    pub action: NotifyAction,
}

impl NotificationEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, action: NotifyAction) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            action,
        }
    }
}

/// A deduplicated notification waiting for the end of the primary pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNotification {
    pub target: String,
    pub action: NotifyAction,
    /// Changed resources that asked for this notification, in order
    pub triggered_by: Vec<String>,
}

/// Batched, deduplicated queue of notifications
///
/// One entry per target. When a target is asked for both `reload` and
/// `restart`, the restart wins; otherwise the first queued action stays.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Vec<QueuedNotification>,
    index: HashMap<String, usize>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action for `target`; returns false when it collapsed into
    /// an existing entry
    pub fn enqueue(&mut self, target: &str, action: NotifyAction, source: &str) -> bool {
        if let Some(&i) = self.index.get(target) {
            let entry = &mut self.pending[i];
            if action == NotifyAction::Restart && entry.action == NotifyAction::Reload {
                entry.action = NotifyAction::Restart;
            }
            if !entry.triggered_by.iter().any(|s| s == source) {
                entry.triggered_by.push(source.to_string());
            }
            return false;
        }

        self.index.insert(target.to_string(), self.pending.len());
        self.pending.push(QueuedNotification {
            target: target.to_string(),
            action,
            triggered_by: vec![source.to_string()],
        });
        true
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Consume the queue in first-queued order
    pub fn drain(self) -> Vec<QueuedNotification> {
        self.pending
    }
}

/// Looks up outgoing edges of changed resources
#[derive(Debug, Default)]
pub struct Router {
    by_source: HashMap<String, Vec<NotificationEdge>>,
}

impl Router {
    pub fn new(edges: &[NotificationEdge]) -> Self {
        let mut by_source: HashMap<String, Vec<NotificationEdge>> = HashMap::new();
        for edge in edges {
            by_source
                .entry(edge.from.clone())
                .or_default()
                .push(edge.clone());
        }
        Self { by_source }
    }

    /// Queue the notifications of a resource that changed; returns how many
    /// edges fired
    pub fn on_changed(&self, id: &str, queue: &mut NotificationQueue) -> usize {
        let Some(edges) = self.by_source.get(id) else {
            return 0;
        };
        for edge in edges {
            if queue.enqueue(&edge.to, edge.action, id) {
                log::debug!("[{id}] queued {} of {}", edge.action, edge.to);
            } else {
                log::debug!("[{id}] {} of {} already queued", edge.action, edge.to);
            }
        }
        edges.len()
    }
}
