//! Closed enums for the stack's variation points.
//!
//! Anything outside these variants is rejected at the boundary (CLI parsing,
//! wizard input, environment overrides), never deep inside a step.

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Supported PHP runtime versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Display, EnumString, EnumIter)]
pub enum PhpVersion {
    #[default]
    #[strum(serialize = "8.3")]
    Php83,
    #[strum(serialize = "8.4")]
    Php84,
}

impl PhpVersion {
    /// PHP-FPM systemd unit name, e.g. `php8.3-fpm`
    pub fn fpm_service(self) -> String {
        format!("php{self}-fpm")
    }

    /// PHP-FPM socket path referenced by the site config
    pub fn fpm_socket(self) -> String {
        format!("/run/php/php{self}-fpm.sock")
    }

    /// Debian package name for an extension, e.g. `php8.3-mbstring`
    pub fn package(self, extension: &str) -> String {
        format!("php{self}-{extension}")
    }

    /// Accepted values, for usage and prompt text
    pub fn choices() -> Vec<String> {
        Self::iter().map(|v| v.to_string()).collect()
    }
}

/// Laravel queue backend used by the supervised workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum QueueDriver {
    #[default]
    Database,
    Redis,
}

impl QueueDriver {
    /// Accepted values, for usage and prompt text
    pub fn choices() -> Vec<String> {
        Self::iter().map(|v| v.to_string()).collect()
    }
}
