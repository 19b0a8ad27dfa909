//! Single-instance run lock.
//!
//! The lock is a file holding the owner's PID. Its presence means another run
//! is active; it is created exclusively and removed when the guard drops, so
//! every exit path that unwinds releases it. The interrupt handler releases
//! it explicitly on the signal path, where `Drop` never runs. A lock whose
//! owner PID no longer exists is stale and is taken over.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("another installation appears to be running (lock {path} held by PID {owner}); remove the file if it is stale")]
    Held { path: PathBuf, owner: String },

    #[error("cannot create lock {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    /// Create the lock file, failing if a live process already holds it
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let create_err = |source| LockError::Create {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(create_err)?;
        }

        let mut file = match create_exclusive(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let owner = read_owner(path);
                if !is_stale(&owner) {
                    return Err(LockError::Held {
                        path: path.to_path_buf(),
                        owner,
                    });
                }
                tracing::warn!(path = %path.display(), owner = %owner, "taking over stale run lock");
                release_path(path);
                create_exclusive(path).map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => LockError::Held {
                        path: path.to_path_buf(),
                        owner: read_owner(path),
                    },
                    _ => create_err(e),
                })?
            }
            Err(e) => return Err(create_err(e)),
        };

        writeln!(file, "{}", std::process::id()).map_err(create_err)?;
        tracing::debug!(path = %path.display(), "run lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file now
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        release_path(&self.path);
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn create_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn read_owner(path: &Path) -> String {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Only a parseable PID that no longer exists makes a lock stale
fn is_stale(owner: &str) -> bool {
    let Ok(pid) = owner.parse::<i32>() else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // EPERM: the process exists but belongs to someone else
    matches!(signal::kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

/// Remove the lock only if this process wrote it
pub fn release_owned(path: &Path) {
    if read_owner(path) == std::process::id().to_string() {
        release_path(path);
    }
}

/// Remove a lock file by path; used where the guard is out of reach
pub fn release_path(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "run lock released"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove run lock"),
    }
}
