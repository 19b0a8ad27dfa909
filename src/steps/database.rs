use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome};
use crate::install_state::InstallStage;
use crate::probe::ServiceDescriptor;
use crate::system::CommandSpec;
use crate::templates;

/// MariaDB server, tuning file, and the application database and user.
///
/// Provisioning SQL goes over stdin as root via the local unix socket, so the
/// credentials never appear in the process list and a re-run still connects
/// after the root password has been set.
pub struct Database;

impl Step for Database {
    fn name(&self) -> &'static str {
        "MariaDB"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Database
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        super::apt_install(ctx, &["mariadb-server", "mariadb-client"])?;
        super::enable_and_start(ctx, "mariadb")?;
        ctx.wait_ready(ServiceDescriptor::mariadb())?;

        ctx.layout
            .write(templates::MARIADB_TUNING, &templates::mariadb_tuning(), 0o644)?;
        super::restart(ctx, "mariadb")?;
        ctx.wait_ready(ServiceDescriptor::mariadb())?;

        let sql = CommandSpec::new("mysql")
            .args(["--user", "root"])
            .stdin(templates::provisioning_sql(ctx.config))
            .sensitive();
        ctx.runner.run_checked(&sql)?;
        Ok(StepOutcome::Done)
    }
}
