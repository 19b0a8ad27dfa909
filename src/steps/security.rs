//! Permission helper, scheduler, firewall and certificate tooling.

use crate::console;
use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome, StepPolicy};
use crate::install_state::InstallStage;
use crate::layout::PERMISSION_HELPER;
use crate::system::CommandSpec;
use crate::templates;

pub struct PermissionHelper;

impl Step for PermissionHelper {
    fn name(&self) -> &'static str {
        "Permission helper"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::PermissionHelper
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        ctx.layout
            .write(PERMISSION_HELPER, &templates::permission_helper(), 0o755)?;
        Ok(StepOutcome::Done)
    }
}

pub struct Scheduler;

impl Step for Scheduler {
    fn name(&self) -> &'static str {
        "Scheduler"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Scheduler
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        ctx.layout.write(
            templates::cron_path(&ctx.config.project_name),
            &templates::cron_entry(ctx.config),
            0o644,
        )?;
        Ok(StepOutcome::Done)
    }
}

pub const FIREWALL_RULES: &[&str] = &["OpenSSH", "Nginx Full"];

/// Whether `ufw status` already lists an ALLOW rule for `rule`
pub fn rule_present(status: &str, rule: &str) -> bool {
    status.lines().any(|line| {
        line.strip_prefix(rule)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace) && rest.trim_start().starts_with("ALLOW"))
    })
}

/// Allow SSH and HTTP(S), then enable ufw. Rules already listed are not
/// added again.
pub struct Firewall;

impl Step for Firewall {
    fn name(&self) -> &'static str {
        "Firewall"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Firewall
    }

    fn policy(&self) -> StepPolicy {
        StepPolicy::BestEffort
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        let status = ctx
            .runner
            .run_checked(&CommandSpec::new("ufw").arg("status"))?
            .stdout;

        let missing: Vec<&str> = FIREWALL_RULES
            .iter()
            .copied()
            .filter(|rule| !rule_present(&status, rule))
            .collect();
        for rule in &missing {
            ctx.runner
                .run_checked(&CommandSpec::new("ufw").args(["allow", *rule]))?;
        }
        ctx.runner
            .run_checked(&CommandSpec::new("ufw").args(["--force", "enable"]))?;

        if missing.is_empty() {
            Ok(StepOutcome::Skipped("Firewall rules already present".to_string()))
        } else {
            Ok(StepOutcome::Done)
        }
    }
}

/// Installs certbot once. Issuing a certificate is left to the operator.
pub struct CertificateManager;

impl CertificateManager {
    pub fn issue_command(ctx: &StepContext<'_>) -> String {
        let config = ctx.config;
        format!(
            "certbot --nginx -d {domain} -d www.{domain} --email {email} --agree-tos --no-eff-email",
            domain = config.domain,
            email = config.ssl_email
        )
    }
}

impl Step for CertificateManager {
    fn name(&self) -> &'static str {
        "Certificate manager"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::CertificateManager
    }

    fn policy(&self) -> StepPolicy {
        StepPolicy::BestEffort
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        super::apt_install(ctx, &["certbot", "python3-certbot-nginx"])?;
        console::info(&format!(
            "Issue a certificate once DNS points here: {}",
            Self::issue_command(ctx)
        ));
        Ok(StepOutcome::Done)
    }
}
