//! Exec resource - shell commands with an optional `creates` guard

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use super::ownership::{lookup_gid, lookup_uid, primary_gid};
use super::{ApplyContext, ApplyResult, NotifyAction, Resource, ResourceKind, ResourceState};

const SHELL: &str = "/bin/sh";

#[derive(Debug, Clone)]
pub struct Exec {
    pub id: String,
    pub command: String,
    pub cwd: Option<PathBuf>,
    /// Run as this user (and their primary group unless `group` is set)
    pub user: Option<String>,
    pub group: Option<String>,
    pub environment: BTreeMap<String, String>,
    /// Skip when this path exists
    pub creates: Option<PathBuf>,
}

impl Exec {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            cwd: None,
            user: None,
            group: None,
            environment: BTreeMap::new(),
            creates: None,
        }
    }

    fn is_done(&self) -> bool {
        self.creates.as_ref().is_some_and(|p| p.exists())
    }

    fn build_command(&self) -> Result<Command> {
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(&self.command).envs(&self.environment);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(user) = &self.user {
            let uid = lookup_uid(user)?;
            let gid = match &self.group {
                Some(group) => lookup_gid(group)?,
                None => primary_gid(user)?,
            };
            // group first: setgid is no longer permitted once uid is dropped
            cmd.gid(gid).uid(uid);
        } else if let Some(group) = &self.group {
            cmd.gid(lookup_gid(group)?);
        }
        Ok(cmd)
    }

    fn run(&self, verbose: bool) -> Result<()> {
        let output = self
            .build_command()?
            .output()
            .with_context(|| format!("Failed to spawn {SHELL} for {}", self.id))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if verbose && !stdout.trim().is_empty() {
            log::info!("{}: {}", self.id, stdout.trim_end());
        } else {
            log::debug!("{}: {}", self.id, stdout.trim_end());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            bail!("command exited with {code}: {}", last_lines(&stderr, 5));
        }
        Ok(())
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

impl Resource for Exec {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        let first = self.command.lines().next().unwrap_or_default();
        if self.command.lines().nth(1).is_some() {
            format!("Run {first} …")
        } else {
            format!("Run {first}")
        }
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Exec
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(match &self.creates {
            Some(path) if path.exists() => ResourceState::Present {
                details: Some(path.display().to_string()),
            },
            Some(_) => ResourceState::Absent,
            None => ResourceState::Unknown,
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: self.creates.as_ref().map(|p| p.display().to_string()),
        }
    }

    fn needs_apply(&self) -> Result<bool> {
        Ok(!self.is_done())
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.is_done() {
            return Ok(ApplyResult::NoChange);
        }
        self.run(ctx.verbose)?;
        Ok(ApplyResult::Modified)
    }

    fn supports(&self, action: NotifyAction) -> bool {
        action == NotifyAction::Run
    }

    fn notify(&self, action: NotifyAction, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if action != NotifyAction::Run {
            bail!("{} cannot {action}", self.id);
        }
        self.run(ctx.verbose)?;
        Ok(ApplyResult::Modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_runs_in_cwd_with_env() {
        let tmp = TempDir::new().unwrap();
        let mut exec = Exec::new("write-marker", "printf '%s' \"$GREETING\" > marker");
        exec.cwd = Some(tmp.path().to_path_buf());
        exec.environment.insert("GREETING".into(), "hola".into());

        assert_eq!(
            exec.apply(&mut ApplyContext::new(false)).unwrap(),
            ApplyResult::Modified
        );
        assert_eq!(fs::read_to_string(tmp.path().join("marker")).unwrap(), "hola");
    }

    #[test]
    fn test_creates_guard() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("installed");
        let mut exec = Exec::new("install", format!("touch {}", target.display()));
        exec.creates = Some(target.clone());

        assert!(exec.needs_apply().unwrap());
        assert_eq!(exec.current_state().unwrap(), ResourceState::Absent);
        exec.apply(&mut ApplyContext::new(false)).unwrap();
        assert!(target.exists());
        assert!(!exec.needs_apply().unwrap());
        assert_eq!(
            exec.apply(&mut ApplyContext::new(false)).unwrap(),
            ApplyResult::NoChange
        );
    }

    #[test]
    fn test_without_creates_always_runs() {
        let exec = Exec::new("noop", "true");
        assert!(exec.needs_apply().unwrap());
        assert_eq!(exec.current_state().unwrap(), ResourceState::Unknown);
    }

    #[test]
    fn test_failure_reports_stderr() {
        let exec = Exec::new("bad", "echo 'E: boom' >&2; exit 3");
        let err = exec.apply(&mut ApplyContext::new(false)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exited with 3"));
        assert!(msg.contains("E: boom"));
    }

    #[test]
    fn test_notify_run_ignores_creates() {
        let tmp = TempDir::new().unwrap();
        let counter = tmp.path().join("count");
        let mut exec = Exec::new("reindex", format!("echo x >> {}", counter.display()));
        exec.creates = Some(tmp.path().to_path_buf());

        assert!(exec.supports(NotifyAction::Run));
        assert!(!exec.supports(NotifyAction::Restart));
        exec.notify(NotifyAction::Run, &mut ApplyContext::new(false))
            .unwrap();
        assert_eq!(fs::read_to_string(&counter).unwrap(), "x\n");
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(last_lines("only", 5), "only");
    }

    #[test]
    fn test_description_multiline() {
        let exec = Exec::new("build", "cd /tmp\nmake");
        assert_eq!(exec.description(), "Run cd /tmp …");
    }
}
