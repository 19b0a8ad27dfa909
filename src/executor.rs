//! Step executor.
//!
//! Runs provisioning steps in plan order, advancing the install state machine
//! as it goes. A critical failure stops the run, triggers the cleanup handler
//! exactly once and surfaces as `LempError::Step`. A best-effort failure is
//! recorded as a warning and the run continues. Once the shared interrupt
//! flag is set no further step starts and a failing step is reported as the
//! interruption rather than as its own failure.

use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::{CleanupGuard, CleanupHandler};
use crate::config::ConfigRecord;
use crate::console;
use crate::error::{LempError, StepError};
use crate::install_state::{InstallStage, InstallerContext};
use crate::layout::Layout;
use crate::probe::{self, ProbeError, ServiceDescriptor};
use crate::process_guard::Interrupt;
use crate::system::SystemRunner;
use crate::verify::VerificationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure aborts the run
    Critical,
    /// Failure is logged and the run continues
    BestEffort,
}

#[derive(Debug)]
pub enum StepOutcome {
    Done,
    /// Nothing to do (already present)
    Skipped(String),
    /// Completed, but parts of it failed
    Degraded(Vec<String>),
    Verified(VerificationReport),
}

/// Everything a step may touch
pub struct StepContext<'a> {
    pub config: &'a ConfigRecord,
    pub runner: &'a dyn SystemRunner,
    pub layout: &'a Layout,
    /// Overrides every probe interval (tests use zero)
    pub probe_interval: Option<Duration>,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a ConfigRecord, runner: &'a dyn SystemRunner, layout: &'a Layout) -> Self {
        Self {
            config,
            runner,
            layout,
            probe_interval: None,
        }
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    /// Wait for a service using its descriptor's budget
    pub fn wait_ready(&self, desc: ServiceDescriptor) -> Result<u32, ProbeError> {
        let desc = match self.probe_interval {
            Some(interval) => desc.with_interval(interval),
            None => desc,
        };
        probe::wait_ready(self.runner, self.layout, &desc)
    }
}

pub trait Step {
    fn name(&self) -> &'static str;
    fn stage(&self) -> InstallStage;
    fn policy(&self) -> StepPolicy {
        StepPolicy::Critical
    }
    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError>;
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub warnings: Vec<String>,
    pub report: Option<VerificationReport>,
    pub completed: Vec<&'static str>,
}

/// How a run that reached the end is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every critical verification check passed
    Verified,
    CompletedWithIssues { failed_critical: usize },
    /// The verification step produced no report
    Unverified,
}

impl RunSummary {
    pub fn outcome(&self) -> RunOutcome {
        match &self.report {
            Some(report) if report.is_clean() => RunOutcome::Verified,
            Some(report) => RunOutcome::CompletedWithIssues {
                failed_critical: report.failed_critical(),
            },
            None => RunOutcome::Unverified,
        }
    }
}

pub struct Executor {
    steps: Vec<Box<dyn Step>>,
    cleanup: Arc<CleanupHandler>,
    state: InstallerContext,
    interrupt: Interrupt,
}

impl Executor {
    pub fn new(steps: Vec<Box<dyn Step>>, cleanup: Arc<CleanupHandler>) -> Self {
        Self {
            steps,
            cleanup,
            state: InstallerContext::new(),
            interrupt: Interrupt::new(),
        }
    }

    /// Share the flag the signal thread sets
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn state(&self) -> &InstallerContext {
        &self.state
    }

    pub fn run(&mut self, ctx: &StepContext<'_>) -> Result<RunSummary, LempError> {
        let mut guard = self.cleanup.guard();
        let mut summary = RunSummary::default();
        let total = self.steps.len();

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(signal) = self.interrupt.signal() {
                return Err(abort_interrupted(&mut self.state, &mut guard, signal));
            }
            self.state.advance_to(step.stage())?;
            console::header(&format!("[{}/{}] {}", index + 1, total, step.name()));

            let outcome = match step.run(ctx) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Some(signal) = self.interrupt.signal() {
                        tracing::debug!(step = step.name(), error = %e, "step failed after interrupt");
                        return Err(abort_interrupted(&mut self.state, &mut guard, signal));
                    }
                    if step.policy() == StepPolicy::BestEffort {
                        console::warn(&format!("{} failed (continuing): {e}", step.name()));
                        summary.warnings.push(format!("{}: {e}", step.name()));
                        continue;
                    }
                    console::error(&format!("{} failed: {e}", step.name()));
                    self.state.fail()?;
                    guard.trigger(step.name());
                    return Err(LempError::Step {
                        step: step.name(),
                        source: e,
                    });
                }
            };

            match outcome {
                StepOutcome::Done => console::success(&format!("{} complete", step.name())),
                StepOutcome::Skipped(reason) => console::info(&reason),
                StepOutcome::Degraded(problems) => {
                    for problem in problems {
                        console::warn(&problem);
                        summary.warnings.push(format!("{}: {problem}", step.name()));
                    }
                }
                StepOutcome::Verified(report) => summary.report = Some(report),
            }
            summary.completed.push(step.name());
        }

        if let Some(signal) = self.interrupt.signal() {
            return Err(abort_interrupted(&mut self.state, &mut guard, signal));
        }
        self.state.advance_to(InstallStage::Completed)?;
        guard.disarm();
        Ok(summary)
    }
}

/// Mark the run failed and make sure cleanup has finished before returning
fn abort_interrupted(state: &mut InstallerContext, guard: &mut CleanupGuard, signal: &'static str) -> LempError {
    if let Err(e) = state.fail() {
        tracing::debug!(error = %e, "state already terminal");
    }
    guard.trigger(&format!("interrupted by {signal}"));
    LempError::Interrupted { signal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;
    use crate::system::mock::MockRunner;
    use crate::types::PhpVersion;
    use std::sync::Mutex;

    struct Scripted {
        name: &'static str,
        stage: InstallStage,
        policy: StepPolicy,
        fails: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Step for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
        fn stage(&self) -> InstallStage {
            self.stage
        }
        fn policy(&self) -> StepPolicy {
            self.policy
        }
        fn run(&self, _ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
            self.log.lock().unwrap().push(self.name);
            if self.fails {
                Err(StepError::other("boom"))
            } else {
                Ok(StepOutcome::Done)
            }
        }
    }

    fn plan(log: &Arc<Mutex<Vec<&'static str>>>, failing: &'static str, policy: StepPolicy) -> Vec<Box<dyn Step>> {
        [
            ("one", InstallStage::SystemUpdate),
            ("two", InstallStage::WebServer),
            ("three", InstallStage::Firewall),
            ("four", InstallStage::Verification),
        ]
        .into_iter()
        .map(|(name, stage)| {
            Box::new(Scripted {
                name,
                stage,
                policy: if name == failing { policy } else { StepPolicy::Critical },
                fails: name == failing,
                log: Arc::clone(log),
            }) as Box<dyn Step>
        })
        .collect()
    }

    #[test]
    fn test_critical_failure_stops_and_cleans_once() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = Arc::new(MockRunner::new());
        let cleanup = Arc::new(CleanupHandler::new(mock.clone(), layout.clone(), PhpVersion::Php83));
        let log = Arc::new(Mutex::new(Vec::new()));
        let record = sample();

        let mut executor = Executor::new(plan(&log, "two", StepPolicy::Critical), cleanup.clone());
        let err = executor
            .run(&StepContext::new(&record, mock.as_ref(), &layout))
            .unwrap_err();

        assert!(matches!(err, LempError::Step { step: "two", .. }));
        assert_eq!(*log.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(cleanup.runs(), 1);
        assert_eq!(executor.state().failed_at(), Some(InstallStage::WebServer));
    }

    #[test]
    fn test_best_effort_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = Arc::new(MockRunner::new());
        let cleanup = Arc::new(CleanupHandler::new(mock.clone(), layout.clone(), PhpVersion::Php83));
        let log = Arc::new(Mutex::new(Vec::new()));
        let record = sample();

        let mut executor = Executor::new(plan(&log, "three", StepPolicy::BestEffort), cleanup.clone());
        let summary = executor
            .run(&StepContext::new(&record, mock.as_ref(), &layout))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["one", "two", "three", "four"]);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.completed, vec!["one", "two", "four"]);
        assert_eq!(cleanup.runs(), 0);
        assert!(executor.state().is_complete());
    }

    /// Stands in for a step whose child was killed by the signal thread
    struct KilledBySignal {
        interrupt: Interrupt,
        policy: StepPolicy,
    }

    impl Step for KilledBySignal {
        fn name(&self) -> &'static str {
            "killed"
        }
        fn stage(&self) -> InstallStage {
            InstallStage::WebServer
        }
        fn policy(&self) -> StepPolicy {
            self.policy
        }
        fn run(&self, _ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
            self.interrupt.trigger("SIGINT");
            Err(StepError::other("terminated by signal"))
        }
    }

    fn interrupted_run(policy: StepPolicy) -> (Result<RunSummary, LempError>, Arc<CleanupHandler>, Vec<&'static str>) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mock = Arc::new(MockRunner::new());
        let cleanup = Arc::new(CleanupHandler::new(mock.clone(), layout.clone(), PhpVersion::Php83));
        let log = Arc::new(Mutex::new(Vec::new()));
        let interrupt = Interrupt::new();
        let record = sample();

        let mut steps = plan(&log, "", StepPolicy::Critical);
        steps.insert(
            1,
            Box::new(KilledBySignal {
                interrupt: interrupt.clone(),
                policy,
            }),
        );

        let mut executor = Executor::new(steps, cleanup.clone()).with_interrupt(interrupt);
        let result = executor.run(&StepContext::new(&record, mock.as_ref(), &layout));
        let ran = log.lock().unwrap().clone();
        (result, cleanup, ran)
    }

    #[test]
    fn test_interrupt_stops_before_next_best_effort_step() {
        let (result, cleanup, ran) = interrupted_run(StepPolicy::BestEffort);
        assert!(matches!(result, Err(LempError::Interrupted { signal: "SIGINT" })));
        assert_eq!(ran, vec!["one"]);
        assert_eq!(cleanup.runs(), 1);
    }

    #[test]
    fn test_interrupt_is_not_reported_as_step_failure() {
        let (result, cleanup, ran) = interrupted_run(StepPolicy::Critical);
        assert!(matches!(result, Err(LempError::Interrupted { .. })));
        assert_eq!(ran, vec!["one"]);
        assert_eq!(cleanup.runs(), 1);
    }

    #[test]
    fn test_outcome_reflects_verification() {
        use crate::verify::CheckResult;

        let check = |passed, critical| CheckResult {
            name: "service nginx".into(),
            critical,
            passed,
            detail: String::new(),
            hint: None,
        };
        let mut summary = RunSummary::default();
        assert_eq!(summary.outcome(), RunOutcome::Unverified);

        summary.report = Some(VerificationReport {
            checks: vec![check(true, true), check(false, false)],
        });
        assert_eq!(summary.outcome(), RunOutcome::Verified);

        summary.report = Some(VerificationReport {
            checks: vec![check(false, true), check(false, true), check(true, true)],
        });
        assert_eq!(
            summary.outcome(),
            RunOutcome::CompletedWithIssues { failed_critical: 2 }
        );
    }
}
