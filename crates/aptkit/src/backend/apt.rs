//! Real apt backend using `apt-get` and `dpkg-query`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{InstalledPackage, Package};
use std::path::Path;
use std::process::{Command, Output};

const APT_GET: &str = "apt-get";
const DPKG_QUERY: &str = "dpkg-query";

/// Backend that executes real `apt-get` commands.
pub struct AptBackend {
    apt_get: String,
    dpkg_query: String,
}

impl AptBackend {
    /// Create a new AptBackend.
    ///
    /// Returns an error if apt-get is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            apt_get: find_tool(APT_GET).ok_or(Error::AptNotFound)?,
            dpkg_query: find_tool(DPKG_QUERY).ok_or(Error::AptNotFound)?,
        })
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        log::debug!("running {program} {}", args.join(" "));
        Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .map_err(|e| Error::CommandFailed {
                message: format!("failed to execute {program}: {e}"),
                stderr: String::new(),
            })
    }

    fn run_apt_checked(&self, args: &[&str], package_name: Option<&str>) -> Result<String> {
        let output = self.run(&self.apt_get, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_apt_output(&stderr, package_name));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Backend for AptBackend {
    fn is_available(&self) -> bool {
        self.run(&self.apt_get, &["--version"])
            .is_ok_and(|o| o.status.success())
    }

    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = self.run(
            &self.dpkg_query,
            &["-W", "-f=${Package}\t${Status}\t${Version}\n", name],
        )?;
        // dpkg-query exits 1 for unknown packages
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_dpkg_query(&stdout)
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.version))
    }

    fn install(&self, package: &Package) -> Result<()> {
        let args = install_args(package);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_apt_checked(&args, Some(&package.name))?;
        Ok(())
    }
}

/// `apt-get` arguments installing `package`.
///
/// A pinned version may be older than the installed one, so pins allow
/// downgrades.
pub fn install_args(package: &Package) -> Vec<String> {
    let mut args: Vec<String> = ["install", "-y", "-q"].map(String::from).into();
    if package.version.is_some() {
        args.push("--allow-downgrades".to_string());
    }
    args.extend(package.options.iter().cloned());
    args.push(package.install_spec());
    args
}

/// Parse `dpkg-query -W -f='${Package}\t${Status}\t${Version}\n'` output.
///
/// Only packages whose status is `install ok installed` are returned;
/// removed-but-not-purged packages still appear in dpkg's database.
pub fn parse_dpkg_query(output: &str) -> Vec<InstalledPackage> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next()?.trim();
            let status = fields.next()?.trim();
            let version = fields.next()?.trim();
            if name.is_empty() || !status.ends_with(" installed") || version.is_empty() {
                return None;
            }
            Some(InstalledPackage {
                name: name.to_string(),
                version: version.to_string(),
            })
        })
        .collect()
}

fn find_tool(name: &str) -> Option<String> {
    ["/usr/bin", "/bin", "/usr/sbin", "/sbin"]
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|p| p.exists())
        .map(|p| p.to_string_lossy().to_string())
        .or_else(|| {
            Command::new(name)
                .arg("--version")
                .output()
                .ok()
                .filter(|o| o.status.success())
                .map(|_| name.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_args() {
        let pkg = Package::new("nginx").with_options(vec!["--no-install-recommends".to_string()]);
        assert_eq!(
            install_args(&pkg),
            vec!["install", "-y", "-q", "--no-install-recommends", "nginx"]
        );
    }

    #[test]
    fn test_pinned_install_allows_downgrade() {
        let pkg = Package::new("nginx").with_version("1.18.0-6");
        assert_eq!(
            install_args(&pkg),
            vec!["install", "-y", "-q", "--allow-downgrades", "nginx=1.18.0-6"]
        );
    }

    #[test]
    fn test_parse_dpkg_query_installed() {
        let out = "nginx\tinstall ok installed\t1.22.1-9\n";
        let pkgs = parse_dpkg_query(out);
        assert_eq!(
            pkgs,
            vec![InstalledPackage {
                name: "nginx".to_string(),
                version: "1.22.1-9".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_dpkg_query_skips_removed() {
        let out = "apache2\tdeinstall ok config-files\t2.4.57-2\n\
                   git\tinstall ok installed\t1:2.39.2-1.1\n";
        let pkgs = parse_dpkg_query(out);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "git");
        assert_eq!(pkgs[0].version, "1:2.39.2-1.1");
    }

    #[test]
    fn test_parse_dpkg_query_not_installed_state() {
        let out = "unzip\tunknown ok not-installed\t\n";
        assert!(parse_dpkg_query(out).is_empty());
    }

    #[test]
    fn test_parse_dpkg_query_garbage() {
        assert!(parse_dpkg_query("").is_empty());
        assert!(parse_dpkg_query("no tabs here\n").is_empty());
    }
}
