//! PHP runtime from the ondrej PPA.
//!
//! Core packages are critical; optional extensions are installed one by one
//! and a missing package only degrades the step.

use crate::edit::{self, DirectiveStyle};
use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome, StepPolicy};
use crate::install_state::InstallStage;
use crate::probe::ServiceDescriptor;
use crate::system::CommandSpec;
use crate::templates::PHP_INI_DIRECTIVES;

pub const PPA: &str = "ppa:ondrej/php";

/// Package suffixes (`php<ver>-<suffix>`) the application cannot run without
pub const CORE_EXTENSIONS: &[&str] = &[
    "fpm", "cli", "common", "mysql", "mbstring", "xml", "curl", "zip", "bcmath", "intl",
];

pub const OPTIONAL_EXTENSIONS: &[&str] = &["gd", "redis", "imagick"];

pub fn ini_paths(ctx: &StepContext<'_>) -> [String; 2] {
    let version = ctx.config.php_version;
    [
        format!("/etc/php/{version}/fpm/php.ini"),
        format!("/etc/php/{version}/cli/php.ini"),
    ]
}

pub struct PhpRuntime;

impl Step for PhpRuntime {
    fn name(&self) -> &'static str {
        "PHP runtime"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::PhpRuntime
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        let php = ctx.config.php_version;

        ctx.runner
            .run_checked(&CommandSpec::new("add-apt-repository").args(["-y", PPA]))?;
        ctx.runner.run_checked(&CommandSpec::apt(&["update"]))?;

        let packages: Vec<String> = CORE_EXTENSIONS.iter().map(|ext| php.package(ext)).collect();
        let packages: Vec<&str> = packages.iter().map(String::as_str).collect();
        super::apt_install(ctx, &packages)?;

        for ini in ini_paths(ctx) {
            if ctx.layout.exists(&ini) {
                super::edit_file(ctx, &ini, 0o644, |text| {
                    edit::set_directives(text, PHP_INI_DIRECTIVES, DirectiveStyle::Equals)
                })?;
            } else {
                tracing::warn!(path = %ini, "php.ini not found, tuning skipped");
            }
        }

        let fpm = php.fpm_service();
        super::enable_and_start(ctx, &fpm)?;
        super::restart(ctx, &fpm)?;
        let attempts = ctx.wait_ready(ServiceDescriptor::php_fpm(php))?;
        tracing::debug!(attempts, "php-fpm socket ready");
        Ok(StepOutcome::Done)
    }
}

pub struct PhpExtensions;

impl Step for PhpExtensions {
    fn name(&self) -> &'static str {
        "PHP extensions"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::PhpRuntime
    }

    fn policy(&self) -> StepPolicy {
        StepPolicy::BestEffort
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        let php = ctx.config.php_version;
        let missing: Vec<String> = OPTIONAL_EXTENSIONS
            .iter()
            .map(|ext| php.package(ext))
            .filter(|package| super::apt_install(ctx, &[package.as_str()]).is_err())
            .map(|package| format!("optional package {package} unavailable"))
            .collect();
        if missing.is_empty() {
            Ok(StepOutcome::Done)
        } else {
            Ok(StepOutcome::Degraded(missing))
        }
    }
}
