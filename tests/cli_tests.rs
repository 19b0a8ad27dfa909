//! Binary-level behaviour of `lemp-install` and `lemp-remove`
//!
//! Each test runs the real executable against a temporary root (`LEMP_ROOT`)
//! with stub `apt-get`, `systemctl` and `dpkg-query` on PATH. The stubs log
//! every invocation, so "nothing changed" can be checked directly.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use lempkit::layout::{Layout, RECOVERY_FILE, RUN_LOCK};

const INSTALL: &str = env!("CARGO_BIN_EXE_lemp-install");
const REMOVE: &str = env!("CARGO_BIN_EXE_lemp-remove");

struct Host {
    _dir: tempfile::TempDir,
    root: PathBuf,
    stubs: PathBuf,
    log: PathBuf,
    layout: Layout,
}

impl Host {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let stubs = dir.path().join("bin");
        let log = dir.path().join("stub.log");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&stubs).unwrap();

        let logging = format!("#!/bin/sh\necho \"$(basename \"$0\") $*\" >> {}\nexit 0\n", log.display());
        for program in ["apt-get", "systemctl", "dpkg-query"] {
            write_script(&stubs.join(program), &logging);
        }
        write_script(&stubs.join("which"), "#!/bin/sh\ncommand -v \"$1\" >/dev/null 2>&1\n");

        let layout = Layout::new(&root);
        layout.write("/etc/nginx/nginx.conf", "user www-data;\n", 0o644).unwrap();
        Self {
            _dir: dir,
            root,
            stubs,
            log,
            layout,
        }
    }

    fn command(&self, program: &str) -> Command {
        let path = format!(
            "{}:{}",
            self.stubs.display(),
            std::env::var("PATH").unwrap_or_default()
        );
        let mut cmd = Command::new(program);
        cmd.env("LEMP_ROOT", &self.root)
            .env("LEMP_SKIP_ROOT_CHECK", "1")
            .env("PATH", path)
            .env_remove("LEMP_PROJECT_NAME")
            .env_remove("LEMP_DOMAIN")
            .env_remove("LEMP_SSL_EMAIL")
            .env_remove("LEMP_WORKERS")
            .env_remove("LEMP_LOG");
        cmd
    }

    fn run(&self, program: &str, args: &[&str], stdin: &str) -> Output {
        let mut child = self
            .command(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child.stdin.take().unwrap().write_all(stdin.as_bytes()).unwrap();
        child.wait_with_output().unwrap()
    }

    fn stub_calls(&self) -> String {
        fs::read_to_string(&self.log).unwrap_or_default()
    }

    /// A lock held by a live process (this test binary)
    fn hold_lock(&self) -> String {
        let owner = format!("{}\n", std::process::id());
        self.layout.write(RUN_LOCK, &owner, 0o644).unwrap();
        owner
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn wait_for(path: &Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn wait_exit(child: &mut Child, timeout: Duration) -> Option<i32> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(status) = child.try_wait().unwrap() {
            return status.code();
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    let _ = child.kill();
    None
}

#[test]
fn test_remove_refused_while_another_run_holds_lock() {
    let host = Host::new();
    let owner = host.hold_lock();

    let out = host.run(REMOVE, &[], "y\ny\n");

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("another installation appears to be running"));
    assert_eq!(host.layout.read(RUN_LOCK).unwrap(), owner);
    assert!(host.layout.exists("/etc/nginx/nginx.conf"));
    assert_eq!(host.stub_calls(), "");
}

#[test]
fn test_install_refused_while_another_run_holds_lock() {
    let host = Host::new();
    let owner = host.hold_lock();

    let out = host.run(INSTALL, &["--non-interactive"], "");

    assert_eq!(out.status.code(), Some(1));
    assert_eq!(host.layout.read(RUN_LOCK).unwrap(), owner);
    assert!(!host.layout.exists(RECOVERY_FILE));
    assert_eq!(host.stub_calls(), "");
}

#[test]
fn test_interrupt_at_prompt_releases_lock() {
    let host = Host::new();
    let mut child = host
        .command(REMOVE)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // keep stdin open so the binary blocks on the first question
    let _stdin = child.stdin.take();

    assert!(wait_for(&host.layout.path(RUN_LOCK), Duration::from_secs(10)));
    std::thread::sleep(Duration::from_millis(200));
    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    assert_eq!(wait_exit(&mut child, Duration::from_secs(10)), Some(130));
    assert!(!host.layout.exists(RUN_LOCK));
    assert!(host.layout.exists("/etc/nginx/nginx.conf"));

    // the next run is not refused
    let out = host.run(REMOVE, &[], "n\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn test_stale_lock_from_dead_run_is_taken_over() {
    let host = Host::new();
    let mut dead = Command::new("true").spawn().unwrap();
    let pid = dead.id();
    dead.wait().unwrap();
    host.layout.write(RUN_LOCK, &format!("{pid}\n"), 0o644).unwrap();

    let out = host.run(REMOVE, &[], "n\n");

    assert_eq!(out.status.code(), Some(0));
    assert!(!host.layout.exists(RUN_LOCK));
    assert!(host.layout.exists("/etc/nginx/nginx.conf"));
}

#[test]
fn test_closed_stdin_declines_removal() {
    let host = Host::new();

    let out = host.run(REMOVE, &[], "");

    assert_eq!(out.status.code(), Some(0));
    assert!(host.layout.exists("/etc/nginx/nginx.conf"));
    assert_eq!(host.stub_calls(), "");
}
