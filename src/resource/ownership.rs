//! Owner, group and mode of files and directories
//!
//! Names are resolved to ids through the system user and group databases
//! with the reentrant `getpwnam_r` / `getgrnam_r`, since plan previews
//! resolve them from several threads. Numeric values are taken as ids.

use anyhow::{Context, Result, bail};
use std::ffi::CString;
use std::fmt;
use std::fs;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use std::ptr;

const MODE_BITS: u32 = 0o7777;

/// Requested ownership; `None` fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
}

impl Ownership {
    pub fn new(owner: Option<String>, group: Option<String>, mode: Option<&str>) -> Result<Self> {
        Ok(Self {
            owner,
            group,
            mode: mode.map(parse_mode).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.group.is_none() && self.mode.is_none()
    }

    /// Differences between `path` and the requested ownership
    pub fn drift(&self, path: &Path) -> Result<Vec<String>> {
        let meta = fs::metadata(path).with_context(|| format!("Could not stat {}", path.display()))?;
        let mut drift = Vec::new();

        if let Some(owner) = &self.owner {
            let uid = lookup_uid(owner)?;
            if meta.uid() != uid {
                drift.push(format!("owner {} → {owner}", meta.uid()));
            }
        }
        if let Some(group) = &self.group {
            let gid = lookup_gid(group)?;
            if meta.gid() != gid {
                drift.push(format!("group {} → {group}", meta.gid()));
            }
        }
        if let Some(mode) = self.mode {
            let current = meta.mode() & MODE_BITS;
            if current != mode {
                drift.push(format!("mode {current:04o} → {mode:04o}"));
            }
        }
        Ok(drift)
    }

    /// Set owner, group and mode on `path`; returns whether anything changed
    pub fn apply(&self, path: &Path) -> Result<bool> {
        if self.drift(path)?.is_empty() {
            return Ok(false);
        }

        let uid = self.owner.as_deref().map(lookup_uid).transpose()?;
        let gid = self.group.as_deref().map(lookup_gid).transpose()?;
        if uid.is_some() || gid.is_some() {
            std::os::unix::fs::chown(path, uid, gid)
                .with_context(|| format!("Could not chown {}", path.display()))?;
        }
        if let Some(mode) = self.mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .with_context(|| format!("Could not chmod {}", path.display()))?;
        }
        Ok(true)
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(owner) = &self.owner {
            parts.push(format!("owner={owner}"));
        }
        if let Some(group) = &self.group {
            parts.push(format!("group={group}"));
        }
        if let Some(mode) = self.mode {
            parts.push(format!("mode={mode:04o}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Parse an octal mode string ("644", "0644", "00644")
pub fn parse_mode(mode: &str) -> Result<u32> {
    let digits = mode.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(8)) {
        bail!("Invalid mode '{mode}': expected octal digits like 0644");
    }
    let value = u32::from_str_radix(digits, 8).with_context(|| format!("Invalid mode '{mode}'"))?;
    if value > MODE_BITS {
        bail!("Invalid mode '{mode}': out of range");
    }
    Ok(value)
}

/// Initial buffer for the reentrant lookups; grown on ERANGE
const LOOKUP_BUF: usize = 1024;
const LOOKUP_BUF_MAX: usize = 1 << 20;

/// Resolve a user name (or numeric id) to a uid
pub fn lookup_uid(name: &str) -> Result<u32> {
    if let Ok(id) = name.parse() {
        return Ok(id);
    }
    passwd_entry(name)?
        .map(|(uid, _)| uid)
        .with_context(|| format!("Unknown user '{name}'"))
}

/// Primary group of a user (or of a numeric uid without a passwd entry)
pub fn primary_gid(user: &str) -> Result<u32> {
    match passwd_entry(user)? {
        Some((_, gid)) => Ok(gid),
        None if user.parse::<u32>().is_ok() => lookup_gid(user),
        None => bail!("Unknown user '{user}'"),
    }
}

/// Resolve a group name (or numeric id) to a gid
pub fn lookup_gid(name: &str) -> Result<u32> {
    if let Ok(id) = name.parse() {
        return Ok(id);
    }
    let c_name = CString::new(name).context("Invalid group name")?;
    let mut buf: Vec<libc::c_char> = vec![0; LOOKUP_BUF];
    loop {
        let mut group = MaybeUninit::<libc::group>::uninit();
        let mut found: *mut libc::group = ptr::null_mut();
        // SAFETY: every pointer refers to storage owned by this frame and
        // buf.len() is the real buffer size
        let rc = unsafe {
            libc::getgrnam_r(
                c_name.as_ptr(),
                group.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut found,
            )
        };
        if rc == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc))
                .with_context(|| format!("Could not look up group '{name}'"));
        }
        if found.is_null() {
            bail!("Unknown group '{name}'");
        }
        // SAFETY: non-null `found` points at `group`, filled in by getgrnam_r
        return Ok(unsafe { (*found).gr_gid });
    }
}

/// uid and primary gid of a named user, if it exists
fn passwd_entry(name: &str) -> Result<Option<(u32, u32)>> {
    let c_name = CString::new(name).context("Invalid user name")?;
    let mut buf: Vec<libc::c_char> = vec![0; LOOKUP_BUF];
    loop {
        let mut pwd = MaybeUninit::<libc::passwd>::uninit();
        let mut found: *mut libc::passwd = ptr::null_mut();
        // SAFETY: every pointer refers to storage owned by this frame and
        // buf.len() is the real buffer size
        let rc = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                pwd.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &raw mut found,
            )
        };
        if rc == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc))
                .with_context(|| format!("Could not look up user '{name}'"));
        }
        if found.is_null() {
            return Ok(None);
        }
        // SAFETY: non-null `found` points at `pwd`, filled in by getpwnam_r
        let entry = unsafe { ((*found).pw_uid, (*found).pw_gid) };
        return Ok(Some(entry));
    }
}
