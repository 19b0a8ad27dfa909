use crate::error::StepError;
use crate::executor::{Step, StepContext, StepOutcome};
use crate::install_state::InstallStage;
use crate::system::CommandSpec;
use crate::templates;

pub struct WebServer;

impl Step for WebServer {
    fn name(&self) -> &'static str {
        "Nginx"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::WebServer
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        super::apt_install(ctx, &["nginx"])?;
        super::enable_and_start(ctx, "nginx")?;
        Ok(StepOutcome::Done)
    }
}

/// Project directory, placeholder page and the Nginx site.
///
/// The site file is rewritten whole on every run and the enabled link is
/// replaced, so a second run leaves exactly one server block.
pub struct ProjectScaffold;

impl Step for ProjectScaffold {
    fn name(&self) -> &'static str {
        "Project directory and site"
    }

    fn stage(&self) -> InstallStage {
        InstallStage::ProjectScaffold
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        let config = ctx.config;
        let project = &config.project_name;
        let dir = config.project_dir();

        ctx.layout.create_dir(format!("{dir}/public"))?;
        ctx.layout.create_dir(format!("{dir}/storage/logs"))?;

        let index = templates::placeholder_path(config);
        if !ctx.layout.exists(&index) {
            ctx.layout.write(&index, &templates::placeholder_index(config), 0o644)?;
        }

        let site = templates::nginx_site_path(project);
        ctx.layout.write(&site, &templates::nginx_site(config), 0o644)?;
        ctx.layout.symlink(&site, templates::nginx_enabled_path(project))?;
        if ctx.layout.remove_file(templates::NGINX_DEFAULT_SITE)? {
            tracing::info!("default nginx site disabled");
        }

        ctx.runner
            .run_checked(&CommandSpec::new("chown").args(["-R", "www-data:www-data", &dir]))?;
        ctx.runner.run_checked(&CommandSpec::new("nginx").arg("-t"))?;
        ctx.runner.run_checked(&CommandSpec::systemctl("reload", "nginx"))?;
        Ok(StepOutcome::Done)
    }
}
