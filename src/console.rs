//! Operator-facing output and diagnostic logging setup.
//!
//! Operator messages are single colored lines on stdout tagged by severity.
//! Each one is mirrored as a debug-level `tracing` event, so the default
//! stderr filter stays quiet and `LEMP_LOG=debug` still produces a complete
//! trace alongside the command-level events.

use colored::Colorize;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "LEMP_LOG";

/// Initialize the tracing subscriber (stderr, `LEMP_LOG` filter, default `warn`)
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn header(title: &str) {
    println!();
    println!("{} {}", "==>".blue().bold(), title.bold());
    tracing::debug!(step = title, "step started");
}

pub fn info(msg: &str) {
    println!("{} {msg}", "[INFO]".cyan());
    tracing::debug!(severity = "info", "{msg}");
}

pub fn success(msg: &str) {
    println!("{} {msg}", "[OK]".green().bold());
    tracing::debug!(severity = "ok", "{msg}");
}

pub fn warn(msg: &str) {
    println!("{} {msg}", "[WARN]".yellow().bold());
    tracing::debug!(severity = "warn", "{msg}");
}

pub fn error(msg: &str) {
    println!("{} {msg}", "[ERROR]".red().bold());
    tracing::debug!(severity = "error", "{msg}");
}
