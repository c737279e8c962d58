//! SysV init backend using `service` and `update-rc.d`.
//!
//! Boot state is read from the `/etc/rc?.d` start links rather than from a
//! command, since `update-rc.d` has no query mode.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::Action;
use std::path::{Path, PathBuf};
use std::process::Command;

const RUNLEVELS: [char; 4] = ['2', '3', '4', '5'];

/// Backend that drives `/etc/init.d` scripts.
#[derive(Debug)]
pub struct SysvBackend {
    root: PathBuf,
}

impl Default for SysvBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SysvBackend {
    /// Create a backend for the running system.
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Create a backend that reads rc links below `root` (useful for testing).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run(&self, program: &str, args: &[String], service: &str, action: Action) -> Result<()> {
        log::debug!("{program} {}", args.join(" "));
        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // init scripts often report on stdout
            let text = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(Error::from_output(&text, service, action.as_str()));
        }
        Ok(())
    }
}

/// Commands implementing an action, as (program, args) pairs.
pub fn sysv_commands(service: &str, action: Action) -> Vec<(&'static str, Vec<String>)> {
    let s = service.to_string();
    match action {
        Action::Start | Action::Stop | Action::Restart | Action::Reload => {
            vec![("service", vec![s, action.as_str().to_string()])]
        }
        // `defaults` installs the links if missing; `enable` flips existing K links to S
        Action::Enable => vec![
            ("update-rc.d", vec![s.clone(), "defaults".to_string()]),
            ("update-rc.d", vec![s, "enable".to_string()]),
        ],
        Action::Disable => vec![("update-rc.d", vec![s, "disable".to_string()])],
    }
}

/// Whether any multi-user runlevel has a start link for the service.
pub fn has_start_link(root: &Path, service: &str) -> Result<bool> {
    for level in RUNLEVELS {
        let dir = root.join(format!("etc/rc{level}.d"));
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix('S')
                && rest.trim_start_matches(|c: char| c.is_ascii_digit()) == service
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `service` arguments for a status query.
pub fn status_args(service: &str) -> [&str; 2] {
    [service, "status"]
}

impl Backend for SysvBackend {
    fn name(&self) -> &'static str {
        "sysv"
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        let output = Command::new("service").args(status_args(service)).output()?;
        Ok(output.status.success())
    }

    fn is_enabled(&self, service: &str) -> Result<bool> {
        has_start_link(&self.root, service)
    }

    fn control(&self, service: &str, action: Action) -> Result<()> {
        for (program, args) in sysv_commands(service, action) {
            self.run(program, &args, service, action)?;
        }
        Ok(())
    }
}
