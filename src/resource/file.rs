//! File resource - rendered content with owner, group and mode

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use super::ownership::{Ownership, lookup_gid, lookup_uid};
use super::{ApplyContext, ApplyResult, Resource, ResourceKind, ResourceState};

/// Mode of new files when none is requested
const DEFAULT_MODE: u32 = 0o644;

/// A file with fully rendered content
#[derive(Debug, Clone)]
pub struct File {
    pub id: String,
    pub path: PathBuf,
    pub content: String,
    pub ownership: Ownership,
}

impl File {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            content: content.into(),
            ownership: Ownership::default(),
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    fn current_content(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Could not read {}", self.path.display())),
        }
    }

    fn content_matches(&self) -> Result<bool> {
        Ok(self
            .current_content()?
            .is_some_and(|bytes| bytes == self.content.as_bytes()))
    }

    /// Write content through a temp file in the same directory, then rename
    ///
    /// The temp file gets its final owner, group and mode before the rename:
    /// the requested ones, else those of the file being replaced.
    fn write_atomic(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = self
            .path
            .file_name()
            .with_context(|| format!("Not a file path: {}", self.path.display()))?;
        let tmp = dir.join(format!(".{}.converge-tmp", name.to_string_lossy()));

        let result = self.fill_temp(&tmp).and_then(|()| {
            fs::rename(&tmp, &self.path)
                .with_context(|| format!("Could not replace {}", self.path.display()))
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn fill_temp(&self, tmp: &Path) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(tmp)
            .with_context(|| format!("Could not create {}", tmp.display()))?;
        file.write_all(self.content.as_bytes())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("Could not write {}", tmp.display()))?;
        drop(file);

        let existing = fs::metadata(&self.path).ok();
        let uid = match &self.ownership.owner {
            Some(owner) => Some(lookup_uid(owner)?),
            None => existing.as_ref().map(MetadataExt::uid),
        };
        let gid = match &self.ownership.group {
            Some(group) => Some(lookup_gid(group)?),
            None => existing.as_ref().map(MetadataExt::gid),
        };

        let tmp_meta =
            fs::metadata(tmp).with_context(|| format!("Could not stat {}", tmp.display()))?;
        let uid = uid.filter(|&u| u != tmp_meta.uid());
        let gid = gid.filter(|&g| g != tmp_meta.gid());
        if uid.is_some() || gid.is_some() {
            let requested = self.ownership.owner.is_some() || self.ownership.group.is_some();
            match std::os::unix::fs::chown(tmp, uid, gid) {
                Ok(()) => {}
                Err(e) if requested => {
                    return Err(e).with_context(|| format!("Could not chown {}", tmp.display()));
                }
                Err(e) => log::warn!(
                    "could not keep the owner of {}: {e}",
                    self.path.display()
                ),
            }
        }

        let mode = self
            .ownership
            .mode
            .or_else(|| existing.as_ref().map(|m| m.mode() & 0o7777))
            .unwrap_or(DEFAULT_MODE);
        fs::set_permissions(tmp, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Could not chmod {}", tmp.display()))?;
        Ok(())
    }
}

/// Short blake3 digest used to show content identity in plans
pub fn digest(bytes: &[u8]) -> String {
    let hex = blake3::hash(bytes).to_hex();
    format!("blake3:{}", &hex.as_str()[..12])
}

impl Resource for File {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        if self.ownership.is_empty() {
            format!("Write {}", self.path.display())
        } else {
            format!("Write {} ({})", self.path.display(), self.ownership)
        }
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::File
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(bytes) = self.current_content()? else {
            return Ok(ResourceState::Absent);
        };

        let current = digest(&bytes);
        let desired = digest(self.content.as_bytes());
        if current != desired {
            return Ok(ResourceState::Modified {
                from: current,
                to: desired,
            });
        }

        let drift = self.ownership.drift(&self.path)?;
        if !drift.is_empty() {
            return Ok(ResourceState::Modified {
                from: drift.join(", "),
                to: self.ownership.to_string(),
            });
        }

        Ok(ResourceState::Present {
            details: Some(current),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(digest(self.content.as_bytes())),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.path.exists();
        let mut changed = false;

        if !self.content_matches()? {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create {}", parent.display()))?;
            }
            self.write_atomic()?;
            if ctx.verbose {
                log::info!("wrote {} ({} bytes)", self.path.display(), self.content.len());
            }
            changed = true;
        }

        changed |= self.ownership.apply(&self.path)?;

        Ok(match (changed, existed) {
            (false, _) => ApplyResult::NoChange,
            (true, false) => ApplyResult::Created,
            (true, true) => ApplyResult::Modified,
        })
    }

    fn preview(&self) -> Option<String> {
        let current = self.current_content().ok()?.unwrap_or_default();
        let current = String::from_utf8_lossy(&current);
        if current == self.content {
            return None;
        }
        let path = self.path.display().to_string();
        Some(
            similar::TextDiff::from_lines(current.as_ref(), self.content.as_str())
                .unified_diff()
                .context_radius(3)
                .header(&path, &path)
                .to_string(),
        )
    }
}
