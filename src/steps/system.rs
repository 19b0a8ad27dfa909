//! Host-wide steps: package refresh at the start, restart sweep and
//! verification at the end.

use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome, StepPolicy};
use crate::install_state::InstallStage;
use crate::system::CommandSpec;
use crate::verify;

/// Tools later steps shell out to
const BASE_PACKAGES: &[&str] = &[
    "software-properties-common",
    "ca-certificates",
    "curl",
    "gnupg",
    "unzip",
    "git",
    "ufw",
    "cron",
    "openssl",
];

pub struct SystemUpdate;

impl Step for SystemUpdate {
    fn name(&self) -> &'static str {
        "System update"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::SystemUpdate
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        ctx.runner.run_checked(&CommandSpec::apt(&["update"]))?;
        ctx.runner.run_checked(&CommandSpec::apt(&[
            "-o",
            "Dpkg::Options::=--force-confdef",
            "-o",
            "Dpkg::Options::=--force-confold",
            "upgrade",
        ]))?;
        super::apt_install(ctx, BASE_PACKAGES)?;
        Ok(StepOutcome::Done)
    }
}

pub struct RestartServices;

impl RestartServices {
    pub fn services(ctx: &StepContext<'_>) -> Vec<String> {
        vec![
            ctx.config.php_version.fpm_service(),
            "nginx".to_string(),
            "mariadb".to_string(),
            "redis-server".to_string(),
            "supervisor".to_string(),
        ]
    }
}

impl Step for RestartServices {
    fn name(&self) -> &'static str {
        "Restart services"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::RestartServices
    }

    fn policy(&self) -> StepPolicy {
        StepPolicy::BestEffort
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        let problems: Vec<String> = Self::services(ctx)
            .iter()
            .filter_map(|service| super::restart(ctx, service).err())
            .map(|e| e.to_string())
            .collect();
        if problems.is_empty() {
            Ok(StepOutcome::Done)
        } else {
            Ok(StepOutcome::Degraded(problems))
        }
    }
}

pub struct Verification;

impl Step for Verification {
    fn name(&self) -> &'static str {
        "Verification"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Verification
    }

    fn policy(&self) -> StepPolicy {
        StepPolicy::BestEffort
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Verified(verify::run(ctx.config, ctx.runner, ctx.layout)))
    }
}
