//! Install State Machine
//!
//! The executor's single source of truth for provisioning progress. Stages
//! only move forward one at a time; any non-terminal stage may move to
//! `Failed`.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! SystemUpdate → WebServer → ProjectScaffold → PhpRuntime → Database
//!     ↓
//! Composer → NodeJs → Redis → Supervisor → QueueWorkers
//!     ↓
//! PermissionHelper → Scheduler → Firewall → CertificateManager
//!     ↓
//! RestartServices → Verification → Completed
//!
//! (Any stage can transition to Failed)
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Provisioning stages in execution order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[repr(u8)]
pub enum InstallStage {
    #[default]
    NotStarted = 0,
    /// Package index refresh and upgrade
    SystemUpdate = 1,
    WebServer = 2,
    /// Project directory, placeholder page, site configuration
    ProjectScaffold = 3,
    PhpRuntime = 4,
    Database = 5,
    Composer = 6,
    NodeJs = 7,
    Redis = 8,
    Supervisor = 9,
    QueueWorkers = 10,
    PermissionHelper = 11,
    Scheduler = 12,
    Firewall = 13,
    CertificateManager = 14,
    RestartServices = 15,
    Verification = 16,
    Completed = 17,
    /// Terminal. The stage that failed is kept in `InstallerContext::failed_at`.
    Failed = 255,
}

impl InstallStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Next stage in sequence, `None` at a terminal state
    pub fn next(self) -> Option<Self> {
        if self.is_terminal() {
            return None;
        }
        Self::iter().find(|s| s.order() == self.order() + 1)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::SystemUpdate => "Updating system packages",
            Self::WebServer => "Installing Nginx",
            Self::ProjectScaffold => "Preparing project directory",
            Self::PhpRuntime => "Installing PHP",
            Self::Database => "Installing MariaDB",
            Self::Composer => "Installing Composer",
            Self::NodeJs => "Installing Node.js",
            Self::Redis => "Installing Redis",
            Self::Supervisor => "Installing Supervisor",
            Self::QueueWorkers => "Configuring queue workers",
            Self::PermissionHelper => "Installing permission helper",
            Self::Scheduler => "Configuring scheduler",
            Self::Firewall => "Configuring firewall",
            Self::CertificateManager => "Installing certificate tooling",
            Self::RestartServices => "Restarting services",
            Self::Verification => "Verifying installation",
            Self::Completed => "Installation complete",
            Self::Failed => "Installation failed",
        }
    }

    /// Stages that do work, in order
    pub fn working_stages() -> impl Iterator<Item = Self> {
        Self::iter().filter(|s| !matches!(s, Self::NotStarted | Self::Completed | Self::Failed))
    }

    pub fn progress_percent(self) -> u8 {
        match self {
            Self::Failed => 0,
            other => (u16::from(other.order()) * 100 / u16::from(Self::Completed.order())) as u8,
        }
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage { from: InstallStage, to: InstallStage },

    #[error("Cannot go backwards from {from} to {to} (provisioning is forward-only)")]
    BackwardTransition { from: InstallStage, to: InstallStage },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },
}

/// Owns the current stage and validates every transition.
///
/// ```
/// use lempkit::install_state::{InstallerContext, InstallStage};
///
/// let mut ctx = InstallerContext::new();
/// ctx.enter(InstallStage::SystemUpdate).unwrap();
/// assert!(ctx.enter(InstallStage::Database).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InstallerContext {
    current: InstallStage,
    failed_at: Option<InstallStage>,
    /// (stage, unix timestamp) for every stage entered
    stage_history: Vec<(InstallStage, u64)>,
}

impl InstallerContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current_stage(&self) -> InstallStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<InstallStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == InstallStage::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == InstallStage::Failed
    }

    pub fn stage_history(&self) -> &[(InstallStage, u64)] {
        &self.stage_history
    }

    /// Enter `stage`. Re-entering the current stage is a no-op, so several
    /// steps may share one stage; otherwise only the next stage is accepted.
    pub fn enter(&mut self, stage: InstallStage) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        if stage == self.current {
            return Ok(());
        }
        if stage < self.current {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: stage,
            });
        }
        if self.current.next() != Some(stage) {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: stage,
            });
        }

        tracing::debug!(from = %self.current, to = %stage, "stage transition");
        self.current = stage;
        self.stage_history.push((stage, unix_now()));
        Ok(())
    }

    /// Advance to the next stage in sequence
    pub fn advance(&mut self) -> Result<InstallStage, InstallTransitionError> {
        let next = self
            .current
            .next()
            .ok_or(InstallTransitionError::FromTerminalState { from: self.current })?;
        self.enter(next)?;
        Ok(next)
    }

    /// Walk forward through stages that have no steps, ending on `stage`
    pub fn advance_to(&mut self, stage: InstallStage) -> Result<(), InstallTransitionError> {
        if stage < self.current {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: stage,
            });
        }
        while self.current < stage {
            self.advance()?;
        }
        Ok(())
    }

    /// Move to `Failed`, recording where it happened
    pub fn fail(&mut self) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.current = InstallStage::Failed;
        self.stage_history.push((InstallStage::Failed, unix_now()));
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
