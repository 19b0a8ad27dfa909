//! Post-install verification battery.
//!
//! Diagnostic only: every check runs regardless of earlier results and the
//! report never aborts the run. Failed checks carry a remediation hint.

use std::collections::BTreeSet;

use colored::Colorize;

use crate::config::ConfigRecord;
use crate::layout::Layout;
use crate::probe::redis_cli;
use crate::steps::php::{CORE_EXTENSIONS, OPTIONAL_EXTENSIONS};
use crate::system::{CommandSpec, SystemRunner, query};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub critical: bool,
    pub passed: bool,
    pub detail: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
}

impl VerificationReport {
    fn record(&mut self, name: impl Into<String>, critical: bool, outcome: Result<String, String>, hint: impl Into<String>) {
        let (passed, detail) = match outcome {
            Ok(detail) => (true, detail),
            Err(detail) => (false, detail),
        };
        self.checks.push(CheckResult {
            name: name.into(),
            critical,
            passed,
            detail,
            hint: (!passed).then(|| hint.into()),
        });
    }

    pub fn failed_critical(&self) -> usize {
        self.checks.iter().filter(|c| c.critical && !c.passed).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_critical() == 0
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Print one line per check, then hints for the failures
    pub fn print(&self) {
        for check in &self.checks {
            let tag = match (check.passed, check.critical) {
                (true, _) => "PASS".green().bold(),
                (false, true) => "FAIL".red().bold(),
                (false, false) => "WARN".yellow().bold(),
            };
            println!("  [{tag}] {:<28} {}", check.name, check.detail);
        }
        let hints: Vec<_> = self.failed().filter_map(|c| c.hint.as_ref().map(|h| (c, h))).collect();
        if !hints.is_empty() {
            println!();
            println!("  Suggested fixes:");
            for (check, hint) in hints {
                println!("    {}: {hint}", check.name);
            }
        }
    }
}

/// Module name reported by `php -m` for an extension package suffix
pub fn php_module_name(extension: &str) -> &str {
    match extension {
        "mysql" => "pdo_mysql",
        "xml" => "dom",
        "cli" | "fpm" | "common" => "core",
        other => other,
    }
}

pub fn run(config: &ConfigRecord, runner: &dyn SystemRunner, layout: &Layout) -> VerificationReport {
    let mut report = VerificationReport::default();

    let fpm = config.php_version.fpm_service();
    for service in ["nginx", fpm.as_str(), "mariadb", "redis-server", "supervisor"] {
        let active = runner.service_active(service);
        report.record(
            format!("service {service}"),
            true,
            if active { Ok("active".into()) } else { Err("not active".into()) },
            format!("systemctl status {service}"),
        );
    }

    let ports = query::listening_ports(runner).unwrap_or_default();
    for (port, owner) in [(80u16, "nginx"), (3306, "mariadb"), (6379, "redis-server")] {
        report.record(
            format!("port {port}"),
            true,
            if ports.contains(&port) {
                Ok("listening".into())
            } else {
                Err("not listening".into())
            },
            format!("check that {owner} is running: systemctl restart {owner}"),
        );
    }

    report.record(
        "php cli",
        true,
        first_line(runner, CommandSpec::new("php").arg("-v")),
        format!("apt-get install {}", config.php_version.package("cli")),
    );

    let modules: BTreeSet<String> = query::php_modules(runner).unwrap_or_default();
    for (extensions, critical) in [(CORE_EXTENSIONS, true), (OPTIONAL_EXTENSIONS, false)] {
        for ext in extensions {
            let module = php_module_name(ext);
            if module == "core" {
                continue;
            }
            report.record(
                format!("php extension {module}"),
                critical,
                if modules.contains(module) {
                    Ok("loaded".into())
                } else {
                    Err("not loaded".into())
                },
                format!("apt-get install {}", config.php_version.package(ext)),
            );
        }
    }

    report.record(
        "composer",
        true,
        first_line(runner, CommandSpec::new("composer").arg("--version").env("COMPOSER_ALLOW_SUPERUSER", "1")),
        "re-run the installer or see https://getcomposer.org/download/",
    );
    report.record(
        "node",
        true,
        first_line(runner, CommandSpec::new("node").arg("--version")),
        "apt-get install nodejs",
    );

    let db_login = CommandSpec::new("mysql")
        .args(["--user", &config.db_user, "--execute", "SELECT 1", &config.db_name])
        .env("MYSQL_PWD", config.db_password.expose())
        .sensitive();
    report.record(
        "database login",
        true,
        runner
            .run_checked(&db_login)
            .map(|_| format!("{} can log in to {}", config.db_user, config.db_name))
            .map_err(|e| e.to_string()),
        "check the credentials in the recovery file and `systemctl status mariadb`",
    );

    let ping = runner
        .run_checked(&redis_cli(config.redis_password.expose(), &["ping"]))
        .map_err(|e| e.to_string())
        .and_then(|out| {
            if out.stdout.contains("PONG") {
                Ok("PONG".to_string())
            } else {
                Err(out.stdout.trim().to_string())
            }
        });
    report.record(
        "redis ping",
        true,
        ping,
        "check requirepass in /etc/redis/redis.conf and `systemctl status redis-server`",
    );

    report.record(
        "nginx config",
        true,
        runner
            .run_checked(&CommandSpec::new("nginx").arg("-t"))
            .map(|_| "syntax ok".to_string())
            .map_err(|e| e.to_string()),
        "nginx -t",
    );

    let dir = config.project_dir();
    report.record(
        "project directory",
        true,
        if layout.exists(&dir) {
            Ok(dir.clone())
        } else {
            Err(format!("{dir} missing"))
        },
        format!("mkdir -p {dir}/public"),
    );

    report
}

fn first_line(runner: &dyn SystemRunner, spec: CommandSpec) -> Result<String, String> {
    runner
        .run_checked(&spec)
        .map(|out| out.stdout.lines().next().unwrap_or_default().trim().to_string())
        .map_err(|e| e.to_string())
}
