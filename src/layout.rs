//! Filesystem layout.
//!
//! Every path the installer reads or writes is written as its absolute host
//! path and resolved through `Layout`, which re-roots it (default `/`). Tests
//! and staging runs point the root at a scratch directory via `LEMP_ROOT`.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::StepError;

pub const ROOT_ENV: &str = "LEMP_ROOT";

pub const RUN_LOCK: &str = "/var/run/lemp-install.lock";
pub const RECOVERY_FILE: &str = "/root/lemp-install-config.txt";
pub const RECOVERY_FALLBACK: &str = "/tmp/lemp-install-config.txt";
pub const WEB_ROOT: &str = "/var/www";
pub const PERMISSION_HELPER: &str = "/usr/local/bin/laravel-permissions";
pub const COMPOSER_BIN: &str = "/usr/local/bin/composer";
pub const OS_RELEASE: &str = "/etc/os-release";
pub const PASSWD: &str = "/etc/passwd";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `LEMP_ROOT`, falling back to `/`
    pub fn from_env() -> Self {
        std::env::var_os(ROOT_ENV)
            .filter(|v| !v.is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an absolute host path under the root
    pub fn path(&self, host_path: impl AsRef<Path>) -> PathBuf {
        let host_path = host_path.as_ref();
        self.root
            .join(host_path.strip_prefix("/").unwrap_or(host_path))
    }

    pub fn exists(&self, host_path: impl AsRef<Path>) -> bool {
        self.path(host_path).exists()
    }

    pub fn read(&self, host_path: impl AsRef<Path>) -> io::Result<String> {
        fs::read_to_string(self.path(host_path))
    }

    /// Replace the file's contents entirely, creating parent directories
    pub fn write(&self, host_path: impl AsRef<Path>, contents: &str, mode: u32) -> Result<(), StepError> {
        let path = self.path(host_path);
        let write = || -> io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
            fs::set_permissions(&path, fs::Permissions::from_mode(mode))
        };
        write().map_err(|e| StepError::file(&path, e))
    }

    pub fn create_dir(&self, host_path: impl AsRef<Path>) -> Result<(), StepError> {
        let path = self.path(host_path);
        fs::create_dir_all(&path).map_err(|e| StepError::file(&path, e))
    }

    /// Copy `host_path` to `<host_path>.bak` unless a backup already exists
    pub fn backup_once(&self, host_path: impl AsRef<Path>) -> Result<bool, StepError> {
        let path = self.path(&host_path);
        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        let backup = PathBuf::from(backup);
        if backup.exists() || !path.exists() {
            return Ok(false);
        }
        fs::copy(&path, &backup).map_err(|e| StepError::file(&backup, e))?;
        Ok(true)
    }

    /// Point `link` at `target`, replacing whatever is at `link`
    pub fn symlink(&self, target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<(), StepError> {
        let link = self.path(link);
        let target = self.path(target);
        let replace = || -> io::Result<()> {
            if let Some(parent) = link.parent() {
                fs::create_dir_all(parent)?;
            }
            if link.symlink_metadata().is_ok() {
                fs::remove_file(&link)?;
            }
            std::os::unix::fs::symlink(&target, &link)
        };
        replace().map_err(|e| StepError::file(&link, e))
    }

    /// Remove a file or symlink if present
    pub fn remove_file(&self, host_path: impl AsRef<Path>) -> Result<bool, StepError> {
        let path = self.path(host_path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StepError::file(&path, e)),
        }
    }

    /// Remove a directory tree (or a lone file) if present
    pub fn remove_tree(&self, host_path: impl AsRef<Path>) -> Result<bool, StepError> {
        let path = self.path(host_path);
        let result = match path.symlink_metadata() {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => Err(e),
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
        };
        result.map(|()| true).map_err(|e| StepError::file(&path, e))
    }

    /// File names directly under a directory, sorted; empty when absent
    pub fn list_dir(&self, host_path: impl AsRef<Path>) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path(host_path))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}
