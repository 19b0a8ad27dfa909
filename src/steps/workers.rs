//! Supervisor and the Laravel queue workers it runs.

use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome, StepPolicy};
use crate::install_state::InstallStage;
use crate::system::CommandSpec;
use crate::templates;

pub struct Supervisor;

impl Step for Supervisor {
    fn name(&self) -> &'static str {
        "Supervisor"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Supervisor
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        super::apt_install(ctx, &["supervisor"])?;
        super::enable_and_start(ctx, "supervisor")?;
        Ok(StepOutcome::Done)
    }
}

/// Worker program file plus the `.env` hint for the application
pub struct QueueWorkers;

impl Step for QueueWorkers {
    fn name(&self) -> &'static str {
        "Queue workers"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::QueueWorkers
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        let config = ctx.config;
        ctx.layout.write(
            templates::worker_conf_path(&config.project_name),
            &templates::supervisor_worker(config),
            0o644,
        )?;
        ctx.layout
            .write(templates::env_hint_path(config), &templates::env_hint(config), 0o600)?;
        Ok(StepOutcome::Done)
    }
}

/// `supervisorctl reread` + `update`. The workers only start once the
/// application is deployed, so a failure here is not fatal.
pub struct ReloadWorkers;

impl Step for ReloadWorkers {
    fn name(&self) -> &'static str {
        "Reload queue workers"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::QueueWorkers
    }

    fn policy(&self) -> StepPolicy {
        StepPolicy::BestEffort
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        for action in ["reread", "update"] {
            ctx.runner
                .run_checked(&CommandSpec::new("supervisorctl").arg(action))?;
        }
        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;
    use crate::layout::Layout;
    use crate::system::mock::MockRunner;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_worker_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = MockRunner::new();
        let record = sample();
        let ctx = StepContext::new(&record, &mock, &layout);

        QueueWorkers.run(&ctx).unwrap();
        QueueWorkers.run(&ctx).unwrap();

        let conf = layout.read("/etc/supervisor/conf.d/laravel-worker-acme.conf").unwrap();
        assert_eq!(conf.matches("[program:").count(), 1);
        assert!(conf.contains("numprocs=3"));

        let env = layout.path("/var/www/acme/.env.lemp");
        let mode = std::fs::metadata(env).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_reload_issues_reread_then_update() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = MockRunner::new();
        let record = sample();

        ReloadWorkers.run(&StepContext::new(&record, &mock, &layout)).unwrap();
        assert_eq!(mock.calls(), vec!["supervisorctl reread", "supervisorctl update"]);
    }
}
