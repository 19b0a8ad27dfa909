use clap::Parser;
use clap::error::ErrorKind;

use crate::error::LempError;
use crate::types::{PhpVersion, QueueDriver};
use crate::validate::{self, Verdict};
use crate::wizard::Presets;

pub const PROJECT_ENV: &str = "LEMP_PROJECT_NAME";
pub const DOMAIN_ENV: &str = "LEMP_DOMAIN";
pub const EMAIL_ENV: &str = "LEMP_SSL_EMAIL";
pub const WORKERS_ENV: &str = "LEMP_WORKERS";

/// Install an Nginx + PHP-FPM + MariaDB + Redis stack tuned for Laravel
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "lemp-install")]
#[command(about = "Provision a Laravel-ready LEMP stack on Ubuntu")]
#[command(version)]
pub struct InstallCli {
    /// Use defaults (and LEMP_* environment overrides) instead of prompting
    #[arg(short = 'n', long)]
    pub non_interactive: bool,

    /// PHP version to install
    #[arg(long, value_name = "VERSION", value_parser = parse_php_version)]
    pub php_version: Option<PhpVersion>,

    /// Queue backend for the Laravel workers
    #[arg(long, value_name = "DRIVER", value_parser = parse_queue_driver)]
    pub queue_driver: Option<QueueDriver>,
}

/// Remove the stack installed by lemp-install
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "lemp-remove")]
#[command(about = "Remove the Laravel LEMP stack (asks for confirmation twice)")]
#[command(version)]
pub struct RemoveCli {}

fn parse_php_version(raw: &str) -> Result<PhpVersion, String> {
    raw.parse()
        .map_err(|_| format!("expected one of: {}", PhpVersion::choices().join(", ")))
}

fn parse_queue_driver(raw: &str) -> Result<QueueDriver, String> {
    raw.parse()
        .map_err(|_| format!("expected one of: {}", QueueDriver::choices().join(", ")))
}

/// Help and version exit 0; every other parse failure is a usage error (1)
pub fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

impl InstallCli {
    /// Combine flags with `LEMP_*` overrides read through `env`
    pub fn presets(&self, env: impl Fn(&str) -> Option<String>) -> Result<Presets, LempError> {
        let text = |key: &str, check: fn(&str) -> Verdict| -> Result<Option<String>, LempError> {
            match env(key).filter(|v| !v.is_empty()) {
                Some(value) => {
                    check(&value).map_err(|e| LempError::usage(format!("{key}='{value}': {e}")))?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        };

        let worker_count = match env(WORKERS_ENV).filter(|v| !v.is_empty()) {
            Some(raw) => Some(
                validate::worker_count(&raw)
                    .map_err(|e| LempError::usage(format!("{WORKERS_ENV}='{raw}': {e}")))?,
            ),
            None => None,
        };

        Ok(Presets {
            project_name: text(PROJECT_ENV, validate::project_name)?,
            domain: text(DOMAIN_ENV, validate::domain)?,
            ssl_email: text(EMAIL_ENV, validate::email)?,
            worker_count,
            php_version: self.php_version,
            queue_driver: self.queue_driver,
        })
    }
}
