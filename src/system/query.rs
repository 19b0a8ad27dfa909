//! Narrow adapters over tool output that has no structured API.
//!
//! Each query pairs a command with a pure parser so the parsing can be tested
//! against captured output and swapped without touching callers.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::{CommandSpec, SystemRunner};
use crate::error::CommandError;

/// Packages dpkg reports as fully installed
pub fn installed_packages(runner: &dyn SystemRunner) -> Result<BTreeSet<String>, CommandError> {
    let out = runner.run_checked(
        &CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}\t${Package}\n"]),
    )?;
    Ok(parse_installed_packages(&out.stdout))
}

pub fn parse_installed_packages(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(status, _)| status.trim() == "install ok installed")
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// TCP ports in LISTEN state
pub fn listening_ports(runner: &dyn SystemRunner) -> Result<BTreeSet<u16>, CommandError> {
    let out = runner.run_checked(&CommandSpec::new("ss").arg("-ltnH"))?;
    Ok(parse_listening_ports(&out.stdout))
}

pub fn parse_listening_ports(text: &str) -> BTreeSet<u16> {
    text.lines()
        .filter_map(|line| line.split_whitespace().nth(3))
        .filter_map(|local| local.rsplit_once(':'))
        .filter_map(|(_, port)| port.parse().ok())
        .collect()
}

/// Names (without `.service`) of active service units
pub fn active_services(runner: &dyn SystemRunner) -> Result<BTreeSet<String>, CommandError> {
    let out = runner.run_checked(&CommandSpec::new("systemctl").args([
        "list-units",
        "--type=service",
        "--state=active",
        "--no-legend",
        "--plain",
    ]))?;
    Ok(parse_unit_list(&out.stdout))
}

pub fn parse_unit_list(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|unit| unit.strip_suffix(".service"))
        .map(str::to_string)
        .collect()
}

/// Lower-cased module names reported by `php -m`
pub fn php_modules(runner: &dyn SystemRunner) -> Result<BTreeSet<String>, CommandError> {
    let out = runner.run_checked(&CommandSpec::new("php").arg("-m"))?;
    Ok(parse_php_modules(&out.stdout))
}

pub fn parse_php_modules(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('['))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// An `/etc/passwd` entry with a home directory worth scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub uid: u32,
    pub home: PathBuf,
}

const NOBODY_UID: u32 = 65534;

/// Root plus every human account (UID 1000 and up, except nobody)
pub fn parse_human_accounts(passwd: &str) -> Vec<Account> {
    passwd
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 6 {
                return None;
            }
            let uid: u32 = fields[2].parse().ok()?;
            let human = uid >= 1000 && uid != NOBODY_UID;
            (uid == 0 || human).then(|| Account {
                name: fields[0].to_string(),
                uid,
                home: PathBuf::from(fields[5]),
            })
        })
        .collect()
}

/// `ID=ubuntu` (or `ID_LIKE` containing ubuntu) in os-release
pub fn is_ubuntu(os_release: &str) -> bool {
    os_release.lines().any(|line| {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        let value = value.trim_matches('"').to_ascii_lowercase();
        match key {
            "ID" => value == "ubuntu",
            "ID_LIKE" => value.split_whitespace().any(|v| v == "ubuntu"),
            _ => false,
        }
    })
}

/// `VERSION_ID` from os-release, if present
pub fn os_version(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("VERSION_ID="))
        .map(|v| v.trim_matches('"').to_string())
}

/// Shell-style wildcard match supporting `*` only
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !text.starts_with(first) || text.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &text[first.len()..];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(idx) => rest = &rest[idx + middle.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::CommandOutput;
    use crate::system::mock::MockRunner;

    #[test]
    fn test_parse_installed_packages() {
        let text = "install ok installed\tnginx\n\
                    deinstall ok config-files\tphp8.1-fpm\n\
                    install ok installed\tphp8.3-fpm\n\
                    garbage line\n";
        let pkgs = parse_installed_packages(text);
        assert!(pkgs.contains("nginx"));
        assert!(pkgs.contains("php8.3-fpm"));
        assert!(!pkgs.contains("php8.1-fpm"));
        assert_eq!(pkgs.len(), 2);
    }

    #[test]
    fn test_parse_listening_ports() {
        let text = "LISTEN 0      511          0.0.0.0:80        0.0.0.0:*\n\
                    LISTEN 0      80         127.0.0.1:3306      0.0.0.0:*\n\
                    LISTEN 0      511            [::]:80           [::]:*\n\
                    LISTEN 0      511            [::1]:6379        [::]:*\n";
        let ports = parse_listening_ports(text);
        assert_eq!(ports.into_iter().collect::<Vec<_>>(), vec![80, 3306, 6379]);
    }

    #[test]
    fn test_parse_unit_list() {
        let text = "nginx.service loaded active running A high performance web server\n\
                    php8.3-fpm.service loaded active running The PHP 8.3 FastCGI Process Manager\n\
                    systemd-journald.socket loaded active running Journal Socket\n";
        let units = parse_unit_list(text);
        assert!(units.contains("nginx"));
        assert!(units.contains("php8.3-fpm"));
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn test_parse_php_modules() {
        let text = "[PHP Modules]\nCore\ncurl\nPDO\npdo_mysql\nZend OPcache\n\n[Zend Modules]\nZend OPcache\n";
        let mods = parse_php_modules(text);
        assert!(mods.contains("pdo_mysql"));
        assert!(mods.contains("curl"));
        assert!(mods.contains("zend opcache"));
        assert!(!mods.iter().any(|m| m.starts_with('[')));
    }

    #[test]
    fn test_parse_human_accounts() {
        let passwd = "root:x:0:0:root:/root:/bin/bash\n\
                      daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
                      www-data:x:33:33:www-data:/var/www:/usr/sbin/nologin\n\
                      nobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin\n\
                      alice:x:1000:1000:Alice:/home/alice:/bin/bash\n\
                      bob:x:1001:1001::/home/bob:/bin/zsh\n";
        let accounts = parse_human_accounts(passwd);
        let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["root", "alice", "bob"]);
        assert_eq!(accounts[1].home, PathBuf::from("/home/alice"));
    }

    #[test]
    fn test_is_ubuntu() {
        assert!(is_ubuntu("NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"24.04\"\n"));
        assert!(is_ubuntu("ID=pop\nID_LIKE=\"ubuntu debian\"\n"));
        assert!(!is_ubuntu("ID=debian\n"));
        assert_eq!(
            os_version("ID=ubuntu\nVERSION_ID=\"24.04\"\n").as_deref(),
            Some("24.04")
        );
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("php*", "php8.3-fpm"));
        assert!(wildcard_match("php*-fpm", "php8.3-fpm"));
        assert!(!wildcard_match("php*-fpm", "php8.3-cli"));
        assert!(wildcard_match("nginx", "nginx"));
        assert!(!wildcard_match("nginx", "nginx-common"));
        assert!(wildcard_match("*redis*", "php8.3-redis"));
        assert!(!wildcard_match("ab*ba", "aba"));
    }

    #[test]
    fn test_installed_packages_through_runner() {
        let mock = MockRunner::new();
        mock.respond(
            "dpkg-query",
            CommandOutput::ok("install ok installed\tredis-server\n"),
        );
        let pkgs = installed_packages(&mock).unwrap();
        assert!(pkgs.contains("redis-server"));
    }
}
