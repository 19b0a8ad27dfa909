//! Composer and Node.js. Both are skipped when already on PATH.

use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome};
use crate::install_state::InstallStage;
use crate::layout::COMPOSER_BIN;
use crate::system::CommandSpec;

const COMPOSER_INSTALLER_URL: &str = "https://getcomposer.org/installer";
const COMPOSER_SETUP: &str = "/tmp/composer-setup.php";
pub const NODE_MAJOR: u8 = 20;
const NODE_SETUP: &str = "/tmp/nodesource_setup.sh";

fn download(ctx: &StepContext<'_>, url: &str, dest: &str) -> Result<(), StepError> {
    ctx.runner
        .run_checked(&CommandSpec::new("curl").args(["-fsSL", url, "-o", dest]))?;
    Ok(())
}

fn remove_tmp(ctx: &StepContext<'_>, path: &str) {
    let _ = ctx.runner.run(&CommandSpec::new("rm").args(["-f", path]));
}

pub struct Composer;

impl Step for Composer {
    fn name(&self) -> &'static str {
        "Composer"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Composer
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        if ctx.runner.command_exists("composer") {
            return Ok(StepOutcome::Skipped("Composer already installed".to_string()));
        }

        download(ctx, COMPOSER_INSTALLER_URL, COMPOSER_SETUP)?;
        let (dir, file) = COMPOSER_BIN
            .rsplit_once('/')
            .ok_or_else(|| StepError::other("invalid composer path"))?;
        let result = ctx.runner.run_checked(
            &CommandSpec::new("php").args([
                COMPOSER_SETUP.to_string(),
                format!("--install-dir={dir}"),
                format!("--filename={file}"),
            ]),
        );
        remove_tmp(ctx, COMPOSER_SETUP);
        result?;
        Ok(StepOutcome::Done)
    }
}

pub struct NodeJs;

impl Step for NodeJs {
    fn name(&self) -> &'static str {
        "Node.js"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::NodeJs
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        if ctx.runner.command_exists("node") {
            return Ok(StepOutcome::Skipped("Node.js already installed".to_string()));
        }

        download(
            ctx,
            &format!("https://deb.nodesource.com/setup_{NODE_MAJOR}.x"),
            NODE_SETUP,
        )?;
        let result = ctx.runner.run_checked(&CommandSpec::new("bash").arg(NODE_SETUP));
        remove_tmp(ctx, NODE_SETUP);
        result?;
        super::apt_install(ctx, &["nodejs"])?;
        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;
    use crate::layout::Layout;
    use crate::system::mock::MockRunner;

    #[test]
    fn test_present_tools_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = MockRunner::new();
        let record = sample();
        let ctx = StepContext::new(&record, &mock, &layout);

        assert!(matches!(Composer.run(&ctx).unwrap(), StepOutcome::Skipped(_)));
        assert!(matches!(NodeJs.run(&ctx).unwrap(), StepOutcome::Skipped(_)));
        assert!(!mock.ran("curl"));
    }

    #[test]
    fn test_composer_install() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = MockRunner::new();
        mock.fail("which composer", 1);
        let record = sample();

        let outcome = Composer.run(&StepContext::new(&record, &mock, &layout)).unwrap();
        assert!(matches!(outcome, StepOutcome::Done));
        assert!(mock.ran(
            "php /tmp/composer-setup.php --install-dir=/usr/local/bin --filename=composer"
        ));
        assert!(mock.ran("rm -f /tmp/composer-setup.php"));
    }

    #[test]
    fn test_node_setup_failure_still_removes_script() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = MockRunner::new();
        mock.fail("which node", 1);
        mock.fail("bash /tmp/nodesource_setup.sh", 1);
        let record = sample();

        assert!(NodeJs.run(&StepContext::new(&record, &mock, &layout)).is_err());
        assert!(mock.ran("rm -f /tmp/nodesource_setup.sh"));
        assert!(!mock.ran("apt-get -y install nodejs"));
    }
}
