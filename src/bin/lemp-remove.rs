//! lemp-remove - tear down the stack installed by lemp-install

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use lempkit::cleanup::InterruptHandler;
use lempkit::cli::{self, RemoveCli};
use lempkit::layout::{Layout, RUN_LOCK};
use lempkit::lock::RunLock;
use lempkit::removal::{self, Confirmation, Remover};
use lempkit::system::HostRunner;
use lempkit::wizard::Prompter;
use lempkit::{console, process_guard, sanity};

fn main() -> ExitCode {
    console::init_logging();

    if let Err(e) = RemoveCli::try_parse() {
        let code = cli::usage_exit_code(&e);
        let _ = e.print();
        return ExitCode::from(code as u8);
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            console::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let layout = Layout::from_env();
    let runner = HostRunner;

    // Never armed: an interrupted removal is finished by running it again
    let interrupts = Arc::new(InterruptHandler::new(layout.path(RUN_LOCK)));
    let on_signal = Arc::clone(&interrupts);
    if let Err(e) = process_guard::init_signal_handlers(interrupts.interrupt(), move |signal| {
        on_signal.handle(signal);
    }) {
        tracing::warn!(error = %e, "failed to install signal handlers");
    }

    let sanity = sanity::verify_environment(&runner, &layout).into_result()?;
    if let Some(warning) = sanity.os_warning() {
        console::warn(&warning);
    }

    let _lock = RunLock::acquire(&layout.path(RUN_LOCK))?;

    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
    let keep_database = match removal::confirm(&mut prompter)? {
        Confirmation::Declined => {
            console::info("Removal cancelled. Nothing was changed.");
            return Ok(());
        }
        Confirmation::Proceed { keep_database } => keep_database,
    };
    if keep_database {
        console::info("MariaDB packages, data and credentials will be kept");
    }

    let report = Remover::new(&runner, &layout, keep_database).run();

    console::header("Removal summary");
    report.print();
    let totals = report.totals();
    if totals.failed > 0 {
        console::warn(&format!(
            "{} action(s) failed; see the lines above",
            totals.failed
        ));
    } else {
        console::success("Removal complete");
    }
    Ok(())
}
