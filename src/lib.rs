//! lempkit library
//!
//! Provisions and removes a Laravel-ready LEMP stack (Nginx, PHP-FPM, MariaDB,
//! Redis, Supervisor) on Ubuntu. Both binaries are thin wrappers over this crate.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod console;
pub mod edit;
pub mod error;
pub mod executor;
pub mod install_state;
pub mod layout;
pub mod lock;
pub mod probe;
pub mod process_guard;
pub mod removal;
pub mod sanity;
pub mod secret;
pub mod steps;
pub mod system;
pub mod templates;
pub mod types;
pub mod validate;
pub mod verify;
pub mod wizard;

// Re-export main types for convenience
pub use cleanup::{CleanupGuard, CleanupHandler, InterruptHandler};
pub use config::{ConfigRecord, Secret};
pub use error::{CommandError, LempError, StepError};
pub use executor::{Executor, RunOutcome, RunSummary, Step, StepContext, StepOutcome, StepPolicy};
pub use install_state::{InstallStage, InstallTransitionError, InstallerContext};
pub use layout::Layout;
pub use lock::{LockError, RunLock};
pub use process_guard::{ChildRegistry, CommandProcessGroup, Interrupt};
pub use removal::{Confirmation, Remover};
pub use removal::report::{Outcome, RemovalReport};
pub use system::{CommandOutput, CommandSpec, HostRunner, SystemRunner};
pub use types::{PhpVersion, QueueDriver};
pub use verify::VerificationReport;
pub use wizard::{Decision, Presets, Prompter};
