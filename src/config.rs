//! The configuration record governing one installation run.
//!
//! Built once by the wizard, validated field by field, then passed by
//! reference to every step. The recovery file is a write-only audit copy for
//! the operator; nothing reads it back.

use std::fmt;
use std::path::PathBuf;

use crate::console;
use crate::layout::{self, Layout};
use crate::types::{PhpVersion, QueueDriver};
use crate::validate::{self, DB_USER_MAX, Invalid};

pub const DEFAULT_PROJECT: &str = "laravel";
pub const DEFAULT_WORKERS: u8 = 3;

/// A credential. `Debug`/`Display` never show the value.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub project_name: String,
    pub domain: String,
    pub ssl_email: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: Secret,
    pub db_root_password: Secret,
    pub redis_password: Secret,
    pub php_version: PhpVersion,
    pub queue_driver: QueueDriver,
    pub worker_count: u8,
    pub non_interactive: bool,
    pub install_ssl: bool,
}

/// `<project>.com` when asked interactively, `<project>.local` otherwise
pub fn default_domain(project: &str, interactive: bool) -> String {
    if interactive {
        format!("{project}.com")
    } else {
        format!("{project}.local")
    }
}

pub fn default_email(domain: &str) -> String {
    format!("admin@{domain}")
}

/// `<project>_db` with hyphens folded to underscores
pub fn default_db_name(project: &str) -> String {
    format!("{}_db", project.replace('-', "_"))
}

/// `<db name>_usr`, cut to the MariaDB user-name limit
pub fn default_db_user(db_name: &str) -> String {
    let mut user = format!("{db_name}_usr");
    user.truncate(DB_USER_MAX);
    user
}

impl ConfigRecord {
    /// Check every field against its validator
    pub fn validate(&self) -> Result<(), Invalid> {
        validate::project_name(&self.project_name)?;
        validate::domain(&self.domain)?;
        validate::email(&self.ssl_email)?;
        validate::db_name(&self.db_name)?;
        validate::db_user(&self.db_user)?;
        validate::worker_count(&self.worker_count.to_string())?;
        for secret in [&self.db_password, &self.db_root_password, &self.redis_password] {
            if validate::password_strength(secret.expose()) == validate::Strength::Weak {
                return Err(Invalid("credentials must be at least MEDIUM strength"));
            }
        }
        Ok(())
    }

    pub fn project_dir(&self) -> String {
        format!("{}/{}", layout::WEB_ROOT, self.project_name)
    }

    /// Certificate issuance is never part of the run
    pub fn with_ssl_deferred(mut self) -> Self {
        self.install_ssl = false;
        self
    }

    /// Redacted key/value pairs for the on-screen summary
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Project name", self.project_name.clone()),
            ("Project directory", self.project_dir()),
            ("Domain", self.domain.clone()),
            ("SSL email", self.ssl_email.clone()),
            ("Database name", self.db_name.clone()),
            ("Database user", self.db_user.clone()),
            ("Database password", self.db_password.to_string()),
            ("Database root password", self.db_root_password.to_string()),
            ("Redis password", self.redis_password.to_string()),
            ("PHP version", self.php_version.to_string()),
            ("Queue driver", self.queue_driver.to_string()),
            ("Queue workers", self.worker_count.to_string()),
            ("Install SSL now", yes_no(self.install_ssl).to_string()),
        ]
    }

    /// `KEY=value` lines, secrets in clear text
    pub fn recovery_contents(&self) -> String {
        let entries = [
            ("PROJECT_NAME", self.project_name.clone()),
            ("PROJECT_DIR", self.project_dir()),
            ("DOMAIN", self.domain.clone()),
            ("SSL_EMAIL", self.ssl_email.clone()),
            ("DB_NAME", self.db_name.clone()),
            ("DB_USER", self.db_user.clone()),
            ("DB_PASSWORD", self.db_password.expose().to_string()),
            ("DB_ROOT_PASSWORD", self.db_root_password.expose().to_string()),
            ("REDIS_PASSWORD", self.redis_password.expose().to_string()),
            ("PHP_VERSION", self.php_version.to_string()),
            ("QUEUE_DRIVER", self.queue_driver.to_string()),
            ("WORKER_COUNT", self.worker_count.to_string()),
            ("INSTALL_SSL", self.install_ssl.to_string()),
            ("NON_INTERACTIVE", self.non_interactive.to_string()),
        ];

        let mut out = String::from(
            "# Laravel LEMP installation settings\n# Contains credentials. Keep this file private.\n",
        );
        for (key, value) in entries {
            out.push_str(&format!("{key}={value}\n"));
        }
        out
    }

    /// Write the recovery file (mode 0600), falling back to `/tmp` when the
    /// primary location is not writable. Returns the host path written.
    pub fn write_recovery(&self, layout: &Layout) -> Result<PathBuf, crate::error::StepError> {
        let contents = self.recovery_contents();
        match layout.write(layout::RECOVERY_FILE, &contents, 0o600) {
            Ok(()) => Ok(PathBuf::from(layout::RECOVERY_FILE)),
            Err(primary) => {
                console::warn(&format!(
                    "Cannot write {} ({primary}); using {}",
                    layout::RECOVERY_FILE,
                    layout::RECOVERY_FALLBACK
                ));
                layout.write(layout::RECOVERY_FALLBACK, &contents, 0o600)?;
                Ok(PathBuf::from(layout::RECOVERY_FALLBACK))
            }
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
