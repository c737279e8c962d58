//! User settings (`~/.config/converge/config.toml`)
//!
//! ```toml
//! service_manager = "systemd"   # auto | systemd | sysv
//!
//! [retry]
//! max_attempts = 5
//! base_delay_secs = 10
//! backoff_factor = 2.0
//!
//! [variables]
//! node_hostname = "raco-web"
//! ```
//!
//! A missing file yields the defaults. CLI flags override settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use svckit::ServiceManager;

use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Service manager to drive
    pub service_manager: ServiceManager,
    /// Retry policy for package installs
    pub retry: RetrySettings,
    /// Variables available to every recipe; recipe variables win
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub backoff_factor: f64,
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = aptkit::RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_secs: defaults.base_delay.as_secs(),
            backoff_factor: defaults.backoff_factor,
            max_delay_secs: defaults.max_delay.as_secs(),
        }
    }
}

impl RetrySettings {
    pub fn to_config(&self) -> aptkit::RetryConfig {
        aptkit::RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs(self.base_delay_secs),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

impl Settings {
    /// Load from the default location, or defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load from an explicit path, or defaults when absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.service_manager, ServiceManager::Auto);
    }

    #[test]
    fn test_parse_full() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
service_manager = "sysv"

[retry]
max_attempts = 2
base_delay_secs = 1

[variables]
node_hostname = "raco-web"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.service_manager, ServiceManager::Sysv);
        assert_eq!(settings.retry.max_attempts, 2);
        assert_eq!(settings.retry.to_config().base_delay, Duration::from_secs(1));
        assert_eq!(settings.variables["node_hostname"], "raco-web");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "servce_manager = \"sysv\"\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid settings"));
    }
}
