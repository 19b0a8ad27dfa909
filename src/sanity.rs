//! Pre-flight sanity checks for the runtime environment
//!
//! Run before anything is mutated:
//! - running with root privileges (EUID 0)
//! - required binaries are present
//! - the host is Ubuntu (a warning, not a failure)

use crate::error::LempError;
use crate::layout::{Layout, OS_RELEASE};
use crate::system::SystemRunner;
use crate::system::query;

/// Set to `1` to skip the root check (development only)
pub const SKIP_ROOT_ENV: &str = "LEMP_SKIP_ROOT_CHECK";

const REQUIRED_BINARIES: &[&str] = &[
    "apt-get",   // package installation
    "systemctl", // service management
    "dpkg-query",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsStatus {
    Ubuntu(Option<String>),
    Other(String),
    Unknown,
}

#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
    pub os: OsStatus,
}

impl SanityCheckResult {
    /// Root and binaries; the OS check never fails the run
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// The precondition failure to report, if any
    pub fn into_result(self) -> Result<Self, LempError> {
        if !self.is_root {
            return Err(LempError::precondition(
                "root privileges required; run with sudo or as root",
            ));
        }
        if !self.missing_binaries.is_empty() {
            return Err(LempError::precondition(format!(
                "missing required binaries: {}",
                self.missing_binaries.join(", ")
            )));
        }
        Ok(self)
    }

    /// Warning text when the host is not (recognisably) Ubuntu
    pub fn os_warning(&self) -> Option<String> {
        match &self.os {
            OsStatus::Ubuntu(_) => None,
            OsStatus::Other(name) => Some(format!(
                "This installer targets Ubuntu; detected {name}. Package names may differ."
            )),
            OsStatus::Unknown => Some(format!(
                "Cannot read {OS_RELEASE}; this installer targets Ubuntu."
            )),
        }
    }
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn skip_root_check() -> bool {
    std::env::var(SKIP_ROOT_ENV).is_ok_and(|v| v == "1")
}

pub fn detect_os(layout: &Layout) -> OsStatus {
    match layout.read(OS_RELEASE) {
        Ok(text) if query::is_ubuntu(&text) => OsStatus::Ubuntu(query::os_version(&text)),
        Ok(text) => OsStatus::Other(
            text.lines()
                .find_map(|l| l.strip_prefix("PRETTY_NAME="))
                .map(|v| v.trim_matches('"').to_string())
                .unwrap_or_else(|| "an unknown distribution".to_string()),
        ),
        Err(_) => OsStatus::Unknown,
    }
}

/// Perform all checks and return the result
pub fn verify_environment(runner: &dyn SystemRunner, layout: &Layout) -> SanityCheckResult {
    tracing::debug!("running pre-flight sanity checks");

    let missing_binaries = REQUIRED_BINARIES
        .iter()
        .filter(|b| !runner.command_exists(b))
        .map(|b| (*b).to_string())
        .collect();

    let is_root = if skip_root_check() {
        tracing::warn!("{SKIP_ROOT_ENV}=1, skipping root check");
        true
    } else {
        is_running_as_root()
    };

    SanityCheckResult {
        missing_binaries,
        is_root,
        os: detect_os(layout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::mock::MockRunner;

    #[test]
    fn test_detect_os() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        assert_eq!(detect_os(&layout), OsStatus::Unknown);

        layout
            .write(OS_RELEASE, "NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"24.04\"\n", 0o644)
            .unwrap();
        assert_eq!(detect_os(&layout), OsStatus::Ubuntu(Some("24.04".into())));

        layout
            .write(OS_RELEASE, "PRETTY_NAME=\"Fedora Linux 40\"\nID=fedora\n", 0o644)
            .unwrap();
        assert_eq!(detect_os(&layout), OsStatus::Other("Fedora Linux 40".into()));
    }

    #[test]
    fn test_missing_binaries_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockRunner::new();
        mock.fail("which systemctl", 1);

        let result = verify_environment(&mock, &Layout::new(dir.path()));
        assert_eq!(result.missing_binaries, vec!["systemctl"]);
        assert!(!result.is_ok());
    }

    #[test]
    fn test_into_result_messages() {
        let result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: false,
            os: OsStatus::Unknown,
        };
        let err = result.into_result().unwrap_err();
        assert!(err.to_string().contains("root privileges required"));

        let ok = SanityCheckResult {
            missing_binaries: vec![],
            is_root: true,
            os: OsStatus::Other("Debian".into()),
        };
        let ok = ok.into_result().unwrap();
        assert!(ok.os_warning().unwrap().contains("Debian"));
    }
}
