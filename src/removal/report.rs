use std::fmt;

use colored::Colorize;
use strum::Display;

/// Result of one teardown action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Removed,
    /// Nothing there to remove
    Absent,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    #[strum(serialize = "Stop services")]
    StopServices,
    #[strum(serialize = "Purge packages")]
    PurgePackages,
    #[strum(serialize = "Remove directories")]
    RemoveDirectories,
    #[strum(serialize = "Remove cron entries")]
    RemoveCron,
    #[strum(serialize = "Remove helper files")]
    RemoveHelpers,
    #[strum(serialize = "Remove package sources")]
    RemoveSources,
    #[strum(serialize = "Clean home directories")]
    CleanHomes,
    #[strum(serialize = "Reload system state")]
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub target: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub removed: usize,
    pub absent: usize,
    pub failed: usize,
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} removed, {} absent, {} failed",
            self.removed, self.absent, self.failed
        )
    }
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, target: impl Into<String>, outcome: Outcome) {
        let target = target.into();
        if let Outcome::Failed(reason) = &outcome {
            tracing::warn!(phase = %self.phase, %target, %reason, "removal action failed");
        }
        self.actions.push(Action { target, outcome });
    }

    pub fn counts(&self) -> Counts {
        self.actions.iter().fold(Counts::default(), |mut c, a| {
            match a.outcome {
                Outcome::Removed => c.removed += 1,
                Outcome::Absent => c.absent += 1,
                Outcome::Failed(_) => c.failed += 1,
            }
            c
        })
    }
}

/// What is still on the host after teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Residual {
    pub packages: Vec<String>,
    pub services: Vec<String>,
    pub unit_files: Vec<String>,
}

impl Residual {
    pub fn is_clean(&self) -> bool {
        self.packages.is_empty() && self.services.is_empty() && self.unit_files.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub phases: Vec<PhaseReport>,
    pub residual: Residual,
    pub keep_database: bool,
}

impl RemovalReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.phases.iter().flat_map(|p| p.actions.iter())
    }

    pub fn totals(&self) -> Counts {
        self.phases.iter().map(PhaseReport::counts).fold(Counts::default(), |a, b| Counts {
            removed: a.removed + b.removed,
            absent: a.absent + b.absent,
            failed: a.failed + b.failed,
        })
    }

    pub fn print(&self) {
        for phase in &self.phases {
            println!("  {:<26} {}", phase.phase.to_string(), phase.counts());
            for action in &phase.actions {
                if let Outcome::Failed(reason) = &action.outcome {
                    println!("    {} {}: {reason}", "failed".red(), action.target);
                }
            }
        }
        println!();
        if self.residual.is_clean() {
            println!("  {}", "No residual packages, services or unit files found.".green());
            return;
        }
        println!("  {}", "Residual state:".yellow().bold());
        for package in &self.residual.packages {
            println!("    package  {package}");
        }
        for service in &self.residual.services {
            println!("    service  {service}");
        }
        for unit in &self.residual.unit_files {
            println!("    unit     {unit}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut phase = PhaseReport::new(Phase::RemoveDirectories);
        phase.push("/etc/nginx", Outcome::Removed);
        phase.push("/etc/php", Outcome::Absent);
        phase.push("/etc/redis", Outcome::Failed("busy".into()));
        assert_eq!(
            phase.counts(),
            Counts {
                removed: 1,
                absent: 1,
                failed: 1
            }
        );
        assert_eq!(phase.counts().to_string(), "1 removed, 1 absent, 1 failed");
    }
}
