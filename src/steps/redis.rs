use crate::edit::{self, DirectiveStyle};
use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome};
use crate::install_state::InstallStage;
use crate::probe::ServiceDescriptor;
use crate::templates::REDIS_CONF;

/// Redis with a password, bound to loopback, run under systemd supervision.
///
/// The packaged config is edited in place (set-or-append), so running the
/// step again updates the password without duplicating directives.
pub struct Redis;

impl Step for Redis {
    fn name(&self) -> &'static str {
        "Redis"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::Redis
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        super::apt_install(ctx, &["redis-server"])?;

        let password = ctx.config.redis_password.expose();
        super::edit_file(ctx, REDIS_CONF, 0o640, |text| {
            edit::set_directives(
                text,
                &[
                    ("supervised", "systemd"),
                    ("bind", "127.0.0.1 ::1"),
                    ("requirepass", password),
                    ("maxmemory-policy", "allkeys-lru"),
                ],
                DirectiveStyle::Space,
            )
        })?;

        super::enable_and_start(ctx, "redis-server")?;
        super::restart(ctx, "redis-server")?;
        ctx.wait_ready(ServiceDescriptor::redis(password))?;
        Ok(StepOutcome::Done)
    }
}
