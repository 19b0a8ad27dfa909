//! lemp-install - provision a Laravel-ready LEMP stack on Ubuntu

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use lempkit::cleanup::{CleanupHandler, InterruptHandler};
use lempkit::cli::{self, InstallCli};
use lempkit::config::ConfigRecord;
use lempkit::executor::{Executor, RunOutcome, RunSummary, StepContext};
use lempkit::layout::{Layout, RUN_LOCK};
use lempkit::lock::RunLock;
use lempkit::secret::SecretGenerator;
use lempkit::steps::{self, security::CertificateManager};
use lempkit::system::{HostRunner, SystemRunner};
use lempkit::wizard::{self, Decision, Prompter};
use lempkit::{console, process_guard, sanity};

fn main() -> ExitCode {
    console::init_logging();

    let cli = match InstallCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = cli::usage_exit_code(&e);
            let _ = e.print();
            return ExitCode::from(code as u8);
        }
    };
    tracing::debug!(?cli, "arguments parsed");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            console::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: InstallCli) -> Result<()> {
    let layout = Layout::from_env();
    let runner: Arc<dyn SystemRunner> = Arc::new(HostRunner);
    let presets = cli.presets(|key| std::env::var(key).ok())?;

    let interrupts = Arc::new(InterruptHandler::new(layout.path(RUN_LOCK)));
    let on_signal = Arc::clone(&interrupts);
    if let Err(e) = process_guard::init_signal_handlers(interrupts.interrupt(), move |signal| {
        on_signal.handle(signal);
    }) {
        tracing::warn!(error = %e, "failed to install signal handlers");
    }

    let sanity = sanity::verify_environment(runner.as_ref(), &layout).into_result()?;
    let non_interactive = cli.non_interactive || !io::stdin().is_terminal();
    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());

    if let Some(warning) = sanity.os_warning() {
        console::warn(&warning);
        if !non_interactive && !prompter.confirm("Continue anyway?", false)? {
            console::info("Installation cancelled.");
            return Ok(());
        }
    }

    let _lock = RunLock::acquire(&layout.path(RUN_LOCK))?;

    let record = {
        let mut generator = SecretGenerator::standard(runner.as_ref());
        if non_interactive {
            wizard::collect_non_interactive(&presets, &mut generator)?
        } else {
            wizard::collect_interactive(&mut prompter, &presets, &mut generator)?
        }
    };

    let (record, recovery_file) = match wizard::review(&mut prompter, record, &layout)? {
        Decision::Proceed {
            record,
            recovery_file,
        } => (record, recovery_file),
        Decision::Declined => {
            console::info("Installation cancelled. Nothing was changed.");
            return Ok(());
        }
    };

    let cleanup = Arc::new(CleanupHandler::new(
        Arc::clone(&runner),
        layout.clone(),
        record.php_version,
    ));
    interrupts.arm(Arc::clone(&cleanup));

    let ctx = StepContext::new(&record, runner.as_ref(), &layout);
    let mut executor =
        Executor::new(steps::default_plan(), cleanup).with_interrupt(interrupts.interrupt());
    let result = executor.run(&ctx);
    if interrupts.interrupt().is_set() {
        process_guard::wait_for_signal_exit();
    }
    interrupts.disarm();
    let summary = result.context("installation aborted; partial state was cleaned up")?;

    print_summary(&ctx, &summary, &recovery_file.display().to_string());
    Ok(())
}

fn print_summary(ctx: &StepContext<'_>, summary: &RunSummary, recovery_file: &str) {
    let config: &ConfigRecord = ctx.config;

    console::header("Verification");
    match &summary.report {
        Some(report) => report.print(),
        None => console::warn("Verification did not run"),
    }

    if !summary.warnings.is_empty() {
        console::header("Warnings");
        for warning in &summary.warnings {
            console::warn(warning);
        }
    }

    console::header("Next steps");
    println!("  Project directory   {}", config.project_dir());
    println!("  Site                http://{}", config.domain);
    println!("  Settings file       {recovery_file}");
    println!();
    println!(
        "  1. Deploy your Laravel code to {} (keep the public/ directory)",
        config.project_dir()
    );
    println!(
        "  2. Copy the values from {}/.env.lemp into .env",
        config.project_dir()
    );
    println!(
        "  3. Run `laravel-permissions {}` after deploying",
        config.project_dir()
    );
    println!(
        "  4. Issue a certificate once DNS points here:\n     {}",
        CertificateManager::issue_command(ctx).cyan()
    );
    if config.domain.ends_with(".local") {
        println!(
            "  5. Add `127.0.0.1 {}` to /etc/hosts to browse the site locally",
            config.domain
        );
    }
    println!();
    match summary.outcome() {
        RunOutcome::Verified => console::success("LEMP stack installed"),
        RunOutcome::CompletedWithIssues { failed_critical } => console::warn(&format!(
            "Installation completed with {failed_critical} issue(s); see the verification results above"
        )),
        RunOutcome::Unverified => {
            console::warn("Installation completed but could not be verified")
        }
    }
}
