//! Directory resource

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use super::ownership::Ownership;
use super::{ApplyContext, ApplyResult, Resource, ResourceKind, ResourceState};

#[derive(Debug, Clone)]
pub struct Directory {
    pub id: String,
    pub path: PathBuf,
    /// Create missing parents
    pub recursive: bool,
    pub ownership: Ownership,
}

impl Directory {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            recursive: false,
            ownership: Ownership::default(),
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }
}

impl Resource for Directory {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Create directory {}", self.path.display())
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Directory
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.exists() {
            return Ok(ResourceState::Absent);
        }
        if !self.path.is_dir() {
            return Ok(ResourceState::Modified {
                from: "not a directory".to_string(),
                to: "directory".to_string(),
            });
        }
        let drift = self.ownership.drift(&self.path)?;
        if drift.is_empty() {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: drift.join(", "),
                to: self.ownership.to_string(),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.path.exists() && !self.path.is_dir() {
            bail!("{} exists and is not a directory", self.path.display());
        }

        let created = !self.path.exists();
        if created {
            let result = if self.recursive {
                fs::create_dir_all(&self.path)
            } else {
                fs::create_dir(&self.path)
            };
            result.with_context(|| format!("Could not create {}", self.path.display()))?;
        }

        let changed = self.ownership.apply(&self.path)?;
        Ok(match (created, changed) {
            (true, _) => ApplyResult::Created,
            (false, true) => ApplyResult::Modified,
            (false, false) => ApplyResult::NoChange,
        })
    }
}
