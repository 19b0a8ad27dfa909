//! Teardown of the provisioned stack.
//!
//! Phases run in a fixed order and no action can stop the run: each one
//! reports `Removed`, `Absent` or `Failed`, and a residual scan at the end
//! records whatever is left. The database (packages, data, credentials) can
//! be kept through a separate confirmation.

pub mod report;
pub mod targets;

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use crate::console;
use crate::error::StepError;
use crate::layout::{self, Layout};
use crate::system::{CommandSpec, SystemRunner, query};
use crate::templates::CRON_MARKER;
use crate::wizard::{Prompter, WizardError};

pub use report::{Action, Counts, Outcome, Phase, PhaseReport, RemovalReport, Residual};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Declined,
    Proceed { keep_database: bool },
}

/// The two y/N gates: everything, then the database specifically
pub fn confirm<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>) -> Result<Confirmation, WizardError> {
    prompter.say("This removes Nginx, PHP, Redis, Supervisor, Node.js, Certbot,")?;
    prompter.say("their configuration, cron entries, helper scripts and package sources.")?;
    if !prompter.confirm("Continue with removal?", false)? {
        return Ok(Confirmation::Declined);
    }
    let drop_database = prompter.confirm(
        "Also remove MariaDB/MySQL including ALL databases and data?",
        false,
    )?;
    Ok(Confirmation::Proceed {
        keep_database: !drop_database,
    })
}

fn outcome_of(result: Result<bool, StepError>) -> Outcome {
    match result {
        Ok(true) => Outcome::Removed,
        Ok(false) => Outcome::Absent,
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

pub struct Remover<'a> {
    runner: &'a dyn SystemRunner,
    layout: &'a Layout,
    keep_database: bool,
}

impl<'a> Remover<'a> {
    pub fn new(runner: &'a dyn SystemRunner, layout: &'a Layout, keep_database: bool) -> Self {
        Self {
            runner,
            layout,
            keep_database,
        }
    }

    pub fn run(&self) -> RemovalReport {
        let phases = [
            Phase::StopServices,
            Phase::PurgePackages,
            Phase::RemoveDirectories,
            Phase::RemoveCron,
            Phase::RemoveHelpers,
            Phase::RemoveSources,
            Phase::CleanHomes,
            Phase::Reload,
        ];

        let mut report = RemovalReport {
            keep_database: self.keep_database,
            ..RemovalReport::default()
        };
        for phase in phases {
            console::header(&phase.to_string());
            let mut result = PhaseReport::new(phase);
            match phase {
                Phase::StopServices => self.stop_services(&mut result),
                Phase::PurgePackages => self.purge_packages(&mut result),
                Phase::RemoveDirectories => self.remove_directories(&mut result),
                Phase::RemoveCron => self.remove_cron(&mut result),
                Phase::RemoveHelpers => self.remove_helpers(&mut result),
                Phase::RemoveSources => self.remove_sources(&mut result),
                Phase::CleanHomes => self.clean_homes(&mut result),
                Phase::Reload => self.reload(&mut result),
            }
            console::info(&result.counts().to_string());
            report.phases.push(result);
        }
        report.residual = self.residual_scan();
        report
    }

    /// Stop when running, disable when enabled; absent only when neither
    fn stop_services(&self, phase: &mut PhaseReport) {
        for service in targets::services(self.keep_database) {
            let active = self.runner.service_active(&service);
            let enabled = self.runner.service_enabled(&service);
            if !active && !enabled {
                phase.push(service, Outcome::Absent);
                continue;
            }

            let mut failures = Vec::new();
            for (action, needed) in [("stop", active), ("disable", enabled)] {
                if !needed {
                    continue;
                }
                if let Err(e) = self.runner.run_checked(&CommandSpec::systemctl(action, &service)) {
                    failures.push(e.to_string());
                }
            }
            let outcome = if failures.is_empty() {
                Outcome::Removed
            } else {
                Outcome::Failed(failures.join("; "))
            };
            phase.push(service, outcome);
        }
    }

    fn matching_packages(&self, installed: &BTreeSet<String>) -> Vec<String> {
        let patterns = targets::package_patterns(self.keep_database);
        installed
            .iter()
            .filter(|name| patterns.iter().any(|p| query::wildcard_match(p, name)))
            .cloned()
            .collect()
    }

    fn purge_packages(&self, phase: &mut PhaseReport) {
        let installed = match query::installed_packages(self.runner) {
            Ok(installed) => installed,
            Err(e) => {
                phase.push("package database", Outcome::Failed(e.to_string()));
                return;
            }
        };

        let mut claimed = BTreeSet::new();
        for (group, patterns) in targets::package_groups(self.keep_database) {
            let packages: Vec<&str> = installed
                .iter()
                .map(String::as_str)
                .filter(|name| patterns.iter().any(|p| query::wildcard_match(p, name)))
                .filter(|name| claimed.insert(*name))
                .collect();
            if packages.is_empty() {
                continue;
            }

            let mut args = vec!["purge"];
            args.extend_from_slice(&packages);
            let outcome = match self.runner.run_checked(&CommandSpec::apt(&args)) {
                Ok(_) => Outcome::Removed,
                Err(e) => {
                    tracing::warn!(group, error = %e, "purge failed");
                    Outcome::Failed(e.to_string())
                }
            };
            for package in packages {
                phase.push(package, outcome.clone());
            }
        }

        if claimed.is_empty() {
            phase.push("stack packages", Outcome::Absent);
            return;
        }
        let autoremove = CommandSpec::apt(&["autoremove", "--purge"]);
        let outcome = match self.runner.run_checked(&autoremove) {
            Ok(_) => Outcome::Removed,
            Err(e) => Outcome::Failed(e.to_string()),
        };
        phase.push(autoremove.command_line(), outcome);
    }

    fn remove_directories(&self, phase: &mut PhaseReport) {
        let mut dirs: Vec<&str> = targets::DIRECTORIES.to_vec();
        if !self.keep_database {
            dirs.extend_from_slice(targets::DATABASE_DIRECTORIES);
        }
        for dir in dirs {
            phase.push(dir, outcome_of(self.layout.remove_tree(dir)));
        }
    }

    /// Scheduler entries are found by content, wherever they live
    fn remove_cron(&self, phase: &mut PhaseReport) {
        for dir in targets::CRON_DIRS {
            for name in self.layout.list_dir(dir) {
                let path = format!("{dir}/{name}");
                let Ok(text) = self.layout.read(&path) else {
                    continue;
                };
                if !text.contains(CRON_MARKER) {
                    continue;
                }
                let kept: Vec<&str> = text
                    .lines()
                    .filter(|l| {
                        let l = l.trim();
                        !l.contains(CRON_MARKER) && !l.is_empty() && !l.starts_with('#')
                    })
                    .collect();
                let result = if kept.is_empty() {
                    self.layout.remove_file(&path)
                } else {
                    let remaining: Vec<&str> =
                        text.lines().filter(|l| !l.contains(CRON_MARKER)).collect();
                    let mode = if dir.starts_with("/var/spool") { 0o600 } else { 0o644 };
                    self.layout
                        .write(&path, &(remaining.join("\n") + "\n"), mode)
                        .map(|()| true)
                };
                phase.push(path, outcome_of(result));
            }
        }
        if phase.actions.is_empty() {
            phase.push("scheduler entries", Outcome::Absent);
        }
    }

    fn remove_helpers(&self, phase: &mut PhaseReport) {
        for file in [layout::PERMISSION_HELPER, layout::COMPOSER_BIN] {
            phase.push(file, outcome_of(self.layout.remove_file(file)));
        }
        // The recovery file holds the database credentials
        if !self.keep_database {
            for file in [layout::RECOVERY_FILE, layout::RECOVERY_FALLBACK] {
                phase.push(file, outcome_of(self.layout.remove_file(file)));
            }
        }
    }

    fn remove_sources(&self, phase: &mut PhaseReport) {
        for name in self.layout.list_dir(targets::SOURCE_DIR) {
            if targets::SOURCE_MARKERS.iter().any(|m| name.contains(m)) {
                let path = format!("{}/{name}", targets::SOURCE_DIR);
                phase.push(&path, outcome_of(self.layout.remove_file(&path)));
            }
        }
        for keyring in targets::KEYRINGS {
            phase.push(*keyring, outcome_of(self.layout.remove_file(keyring)));
        }
    }

    fn clean_homes(&self, phase: &mut PhaseReport) {
        let passwd = self.layout.read(layout::PASSWD).unwrap_or_default();
        let mut entries: Vec<&str> = targets::HOME_ENTRIES.to_vec();
        if !self.keep_database {
            entries.extend_from_slice(targets::DATABASE_HOME_ENTRIES);
        }
        for account in query::parse_human_accounts(&passwd) {
            for entry in &entries {
                let path = account.home.join(entry);
                let outcome = outcome_of(self.layout.remove_tree(&path));
                if outcome != Outcome::Absent {
                    phase.push(path.display().to_string(), outcome);
                }
            }
        }
    }

    fn reload(&self, phase: &mut PhaseReport) {
        for spec in [
            CommandSpec::new("systemctl").arg("daemon-reload"),
            CommandSpec::apt(&["update"]),
        ] {
            let outcome = match self.runner.run_checked(&spec) {
                Ok(_) => Outcome::Removed,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            phase.push(spec.command_line(), outcome);
        }
    }

    fn residual_scan(&self) -> Residual {
        let packages = query::installed_packages(self.runner)
            .map(|installed| self.matching_packages(&installed))
            .unwrap_or_default();

        let targeted = targets::services(self.keep_database);
        let services: Vec<String> = query::active_services(self.runner)
            .map(|active| targeted.iter().filter(|s| active.contains(*s)).cloned().collect())
            .unwrap_or_default();

        let unit_files: Vec<String> = targets::UNIT_DIRS
            .iter()
            .flat_map(|dir| targeted.iter().map(move |s| format!("{dir}/{s}.service")))
            .filter(|path| self.layout.exists(path))
            .collect();

        Residual {
            packages,
            services,
            unit_files,
        }
    }
}
