//! Bounded readiness polling for services started during provisioning.
//!
//! Every probe has a fixed attempt budget and interval; a probe that never
//! succeeds ends with `ProbeError::Exhausted` instead of blocking the run.

use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::layout::Layout;
use crate::system::{CommandSpec, SystemRunner};
use crate::types::PhpVersion;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{service} not ready after {attempts} attempts: {detail}")]
    Exhausted {
        service: String,
        attempts: u32,
        detail: String,
    },
}

/// What "ready" means for a service
#[derive(Debug, Clone)]
pub enum Readiness {
    /// A socket (or any file) exists at this host path
    SocketFile(String),
    /// The command succeeds, and its stdout contains `expect` when given
    Command {
        spec: CommandSpec,
        expect: Option<String>,
    },
    /// `systemctl is-active` reports the unit active
    ServiceActive(String),
}

#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub readiness: Readiness,
    pub max_attempts: u32,
    pub interval: Duration,
}

impl ServiceDescriptor {
    /// PHP-FPM socket: 15 tries, one second apart
    pub fn php_fpm(php: PhpVersion) -> Self {
        Self {
            name: php.fpm_service(),
            readiness: Readiness::SocketFile(php.fpm_socket()),
            max_attempts: 15,
            interval: Duration::from_secs(1),
        }
    }

    /// MariaDB ping over the local socket: 30 tries, two seconds apart
    pub fn mariadb() -> Self {
        Self {
            name: "mariadb".to_string(),
            readiness: Readiness::Command {
                spec: CommandSpec::new("mysqladmin").arg("ping"),
                expect: Some("alive".to_string()),
            },
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }

    /// Authenticated Redis PING: 15 tries, one second apart
    pub fn redis(password: &str) -> Self {
        Self {
            name: "redis-server".to_string(),
            readiness: Readiness::Command {
                spec: redis_cli(password, &["ping"]),
                expect: Some("PONG".to_string()),
            },
            max_attempts: 15,
            interval: Duration::from_secs(1),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// `redis-cli` authenticated with `password`. The password travels in
/// `REDISCLI_AUTH` so it never shows up in the process list.
pub fn redis_cli(password: &str, args: &[&str]) -> CommandSpec {
    CommandSpec::new("redis-cli")
        .args(args.iter().copied())
        .env("REDISCLI_AUTH", password)
        .sensitive()
}

/// Poll until ready. Returns the attempt number that succeeded.
pub fn wait_ready(
    runner: &dyn SystemRunner,
    layout: &Layout,
    desc: &ServiceDescriptor,
) -> Result<u32, ProbeError> {
    let attempts = desc.max_attempts.max(1);
    let mut detail = String::from("no response");

    for attempt in 1..=attempts {
        match check(runner, layout, &desc.readiness) {
            Ok(()) => {
                tracing::debug!(service = %desc.name, attempt, "service ready");
                return Ok(attempt);
            }
            Err(reason) => {
                tracing::debug!(service = %desc.name, attempt, %reason, "not ready yet");
                detail = reason;
            }
        }
        if attempt < attempts && !desc.interval.is_zero() {
            thread::sleep(desc.interval);
        }
    }

    Err(ProbeError::Exhausted {
        service: desc.name.clone(),
        attempts,
        detail,
    })
}

fn check(runner: &dyn SystemRunner, layout: &Layout, readiness: &Readiness) -> Result<(), String> {
    match readiness {
        Readiness::SocketFile(path) => {
            if layout.exists(path) {
                Ok(())
            } else {
                Err(format!("{path} does not exist"))
            }
        }
        Readiness::Command { spec, expect } => {
            let output = runner.run_checked(spec).map_err(|e| e.to_string())?;
            match expect {
                Some(needle) if !output.stdout.contains(needle.as_str()) => Err(format!(
                    "expected '{needle}', got '{}'",
                    output.stdout.trim()
                )),
                _ => Ok(()),
            }
        }
        Readiness::ServiceActive(unit) => {
            if runner.service_active(unit) {
                Ok(())
            } else {
                Err(format!("{unit} is not active"))
            }
        }
    }
}
