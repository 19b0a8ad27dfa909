//! Provisioning steps.
//!
//! One submodule per area of the stack. `default_plan` lists every step in
//! dependency order; the executor runs them as given.

pub mod database;
pub mod php;
pub mod redis;
pub mod security;
pub mod system;
pub mod tooling;
pub mod web;
pub mod workers;

use crate::error::StepError;
use crate::executor::{Step, StepContext};
use crate::system::CommandSpec;

// ============================================================================
// Shared helpers
// ============================================================================

/// `apt-get install` the given packages
pub fn apt_install(ctx: &StepContext<'_>, packages: &[&str]) -> Result<(), StepError> {
    let mut args = vec!["install"];
    args.extend_from_slice(packages);
    ctx.runner.run_checked(&CommandSpec::apt(&args))?;
    Ok(())
}

/// `systemctl enable` + `systemctl start`
pub fn enable_and_start(ctx: &StepContext<'_>, unit: &str) -> Result<(), StepError> {
    ctx.runner.run_checked(&CommandSpec::systemctl("enable", unit))?;
    ctx.runner.run_checked(&CommandSpec::systemctl("start", unit))?;
    Ok(())
}

pub fn restart(ctx: &StepContext<'_>, unit: &str) -> Result<(), StepError> {
    ctx.runner.run_checked(&CommandSpec::systemctl("restart", unit))?;
    Ok(())
}

/// Read-modify-write a configuration file with a one-time `.bak` backup
pub fn edit_file(
    ctx: &StepContext<'_>,
    path: &str,
    mode: u32,
    edit: impl FnOnce(&str) -> String,
) -> Result<(), StepError> {
    let current = ctx
        .layout
        .read(path)
        .map_err(|e| StepError::file(ctx.layout.path(path), e))?;
    ctx.layout.backup_once(path)?;
    let updated = edit(&current);
    if updated != current {
        ctx.layout.write(path, &updated, mode)?;
    }
    Ok(())
}

/// The full provisioning sequence
pub fn default_plan() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(system::SystemUpdate),
        Box::new(web::WebServer),
        Box::new(web::ProjectScaffold),
        Box::new(php::PhpRuntime),
        Box::new(php::PhpExtensions),
        Box::new(database::Database),
        Box::new(tooling::Composer),
        Box::new(tooling::NodeJs),
        Box::new(redis::Redis),
        Box::new(workers::Supervisor),
        Box::new(workers::QueueWorkers),
        Box::new(workers::ReloadWorkers),
        Box::new(security::PermissionHelper),
        Box::new(security::Scheduler),
        Box::new(security::Firewall),
        Box::new(security::CertificateManager),
        Box::new(system::RestartServices),
        Box::new(system::Verification),
    ]
}
