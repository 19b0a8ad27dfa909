//! External command execution.
//!
//! Every collaborator the installer drives (apt, systemctl, ufw, mysql,
//! redis-cli, supervisorctl...) is reached through the `SystemRunner` trait.
//! `HostRunner` is the real implementation; `mock::MockRunner` scripts the
//! responses for tests. Output scraping lives in `query`.

pub mod mock;
pub mod query;

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::CommandError;
use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Written to the child's stdin, then stdin is closed
    pub stdin: Option<String>,
    /// Arguments or stdin carry a secret; only the program name is logged
    pub sensitive: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            sensitive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// `apt-get` with the non-interactive frontend and `-y`
    pub fn apt(args: &[&str]) -> Self {
        Self::new("apt-get")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .arg("-y")
            .args(args.iter().copied())
    }

    /// `systemctl <action> <unit>`
    pub fn systemctl(action: &str, unit: &str) -> Self {
        Self::new("systemctl").args([action, unit])
    }

    /// The command line as a single string (secrets included)
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Log-safe rendering
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            write!(f, "{} <redacted>", self.program)
        } else {
            f.write_str(&self.command_line())
        }
    }
}

/// Output from an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into a `CommandError` naming `context`
    pub fn ensure_success(self, context: &str) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                context: context.to_string(),
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Gateway to external commands.
///
/// `run` returns `Err` only when the command could not be started; a non-zero
/// exit is an `Ok` output the caller inspects.
pub trait SystemRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Run and require a zero exit status
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let context = spec.to_string();
        self.run(spec)?.ensure_success(&context)
    }

    /// Whether `program` resolves on PATH
    fn command_exists(&self, program: &str) -> bool {
        self.run(&CommandSpec::new("which").arg(program))
            .map(|out| out.success())
            .unwrap_or(false)
    }

    /// Whether a systemd unit is active
    fn service_active(&self, unit: &str) -> bool {
        self.run(&CommandSpec::systemctl("is-active", unit).arg("--quiet"))
            .map(|out| out.success())
            .unwrap_or(false)
    }

    fn service_enabled(&self, unit: &str) -> bool {
        self.run(&CommandSpec::systemctl("is-enabled", unit).arg("--quiet"))
            .map(|out| out.success())
            .unwrap_or(false)
    }
}

/// Runs commands on the host, each in its own registered process group.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRunner;

impl SystemRunner for HostRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %spec, "running");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();

        let spawn_err = |e: std::io::Error| CommandError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let pid = child.id();
        ChildRegistry::global()
            .lock()
            .expect("ChildRegistry mutex poisoned")
            .register(pid);

        if let (Some(input), Some(mut pipe)) = (&spec.stdin, child.stdin.take()) {
            // A child that exits without reading stdin closes the pipe; its exit status tells the story
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                tracing::debug!(command = %spec, error = %e, "stdin write failed");
            }
        }

        let output = child.wait_with_output().map_err(spawn_err);

        ChildRegistry::global()
            .lock()
            .expect("ChildRegistry mutex poisoned")
            .unregister(pid);

        let output = output?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        tracing::debug!(command = %spec, code = ?result.exit_code, "finished");
        Ok(result)
    }
}
