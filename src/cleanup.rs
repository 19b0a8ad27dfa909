//! Best-effort remediation after an aborted run.
//!
//! Stops the services the installer touches, clears package-manager locks
//! left by interrupted `apt-get`/`dpkg` children and releases the run lock.
//! Every action swallows its own failure. This is not a rollback: whatever
//! the completed steps installed stays installed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::console;
use crate::layout::Layout;
use crate::lock;
use crate::process_guard::Interrupt;
use crate::system::{CommandSpec, SystemRunner};
use crate::types::PhpVersion;

/// Package-manager lock files removed after killing stray apt/dpkg processes
pub const PACKAGE_LOCKS: &[&str] = &[
    "/var/lib/dpkg/lock",
    "/var/lib/dpkg/lock-frontend",
    "/var/lib/apt/lists/lock",
    "/var/cache/apt/archives/lock",
];

pub struct CleanupHandler {
    runner: Arc<dyn SystemRunner>,
    layout: Layout,
    services: Vec<String>,
    lock_path: PathBuf,
    /// Held for the whole sequence; `true` once it has run
    done: Mutex<bool>,
    runs: AtomicUsize,
}

impl CleanupHandler {
    pub fn new(runner: Arc<dyn SystemRunner>, layout: Layout, php: PhpVersion) -> Self {
        let lock_path = layout.path(crate::layout::RUN_LOCK);
        Self {
            runner,
            layout,
            services: known_services(php),
            lock_path,
            done: Mutex::new(false),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// How many times cleanup actually executed (0 or 1)
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Run the cleanup sequence. Only the first call does anything; a
    /// concurrent caller blocks until that call has finished. Returns whether
    /// this call was the one that ran.
    pub fn run(&self, reason: &str) -> bool {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        if *done {
            tracing::debug!(reason, "cleanup already ran");
            return false;
        }
        *done = true;
        self.runs.fetch_add(1, Ordering::SeqCst);
        console::warn(&format!("Running cleanup after failure: {reason}"));

        for service in &self.services {
            let out = self.runner.run(&CommandSpec::systemctl("stop", service));
            tracing::debug!(service, ok = out.map(|o| o.success()).unwrap_or(false), "stop");
        }

        for process in ["apt-get", "dpkg"] {
            let _ = self.runner.run(&CommandSpec::new("pkill").args(["-9", "-x", process]));
        }
        for lock_file in PACKAGE_LOCKS {
            if let Err(e) = self.layout.remove_file(lock_file) {
                tracing::debug!(lock_file, error = %e, "cannot remove package lock");
            }
        }
        let _ = self.runner.run(&CommandSpec::new("dpkg").args(["--configure", "-a"]));

        lock::release_path(&self.lock_path);
        console::info("Cleanup finished. Partially installed components may remain.");
        true
    }

    /// Guard that runs cleanup when dropped while still armed
    pub fn guard(self: &Arc<Self>) -> CleanupGuard {
        CleanupGuard {
            handler: Arc::clone(self),
            armed: true,
        }
    }
}

/// Signal-thread side of an interrupted run.
///
/// Before the executor starts there is nothing to undo, so an interrupt only
/// releases the run lock. Once armed it runs the full cleanup sequence.
pub struct InterruptHandler {
    interrupt: Interrupt,
    lock_path: PathBuf,
    cleanup: Mutex<Option<Arc<CleanupHandler>>>,
}

impl InterruptHandler {
    pub fn new(lock_path: PathBuf) -> Self {
        Self {
            interrupt: Interrupt::new(),
            lock_path,
            cleanup: Mutex::new(None),
        }
    }

    /// Flag shared with the signal thread and the executor
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn arm(&self, cleanup: Arc<CleanupHandler>) {
        *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner) = Some(cleanup);
    }

    /// After a finished run an interrupt must not stop healthy services
    pub fn disarm(&self) {
        *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn handle(&self, signal: &'static str) {
        self.interrupt.trigger(signal);
        let cleanup = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match cleanup {
            Some(cleanup) => {
                cleanup.run(&format!("interrupted by {signal}"));
            }
            None => console::warn(&format!("Interrupted by {signal}; releasing the run lock")),
        }
        lock::release_owned(&self.lock_path);
    }
}

/// Services the installer starts, in stop order
pub fn known_services(php: PhpVersion) -> Vec<String> {
    vec![
        "supervisor".to_string(),
        "nginx".to_string(),
        php.fpm_service(),
        "redis-server".to_string(),
        "mariadb".to_string(),
    ]
}

/// Scoped cleanup. Drop while armed (early return, panic unwind) triggers
/// the handler; `disarm` after a clean finish.
pub struct CleanupGuard {
    handler: Arc<CleanupHandler>,
    armed: bool,
}

impl CleanupGuard {
    /// Trigger now and disarm
    pub fn trigger(&mut self, reason: &str) {
        self.armed = false;
        self.handler.run(reason);
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            let reason = if std::thread::panicking() {
                "panic"
            } else {
                "early exit"
            };
            self.handler.run(reason);
        }
    }
}
