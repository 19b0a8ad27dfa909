//! What the removal tool looks for. Names cover the variants a host may carry
//! besides what the installer itself set up (older PHP versions, MySQL
//! instead of MariaDB, Apache under either name).

pub const PHP_VERSIONS: &[&str] = &["7.4", "8.0", "8.1", "8.2", "8.3", "8.4"];

pub const WEB_SERVICES: &[&str] = &["nginx", "apache2", "httpd"];
pub const CACHE_SERVICES: &[&str] = &["redis-server", "redis"];
pub const SUPERVISOR_SERVICES: &[&str] = &["supervisor"];
pub const DATABASE_SERVICES: &[&str] = &["mariadb", "mysql", "mysqld"];

pub fn php_services() -> Vec<String> {
    PHP_VERSIONS.iter().map(|v| format!("php{v}-fpm")).collect()
}

/// Every service to stop, queue and web tier first
pub fn services(keep_database: bool) -> Vec<String> {
    let mut all: Vec<String> = SUPERVISOR_SERVICES.iter().map(|s| s.to_string()).collect();
    all.extend(WEB_SERVICES.iter().map(|s| s.to_string()));
    all.extend(php_services());
    all.extend(CACHE_SERVICES.iter().map(|s| s.to_string()));
    if !keep_database {
        all.extend(DATABASE_SERVICES.iter().map(|s| s.to_string()));
    }
    all
}

/// Package-name patterns (`*` wildcard) purged per component
pub const PACKAGE_GROUPS: &[(&str, &[&str])] = &[
    ("web server", &["nginx", "nginx-*", "libnginx-*", "apache2", "apache2-*"]),
    ("php", &["php*"]),
    ("redis", &["redis-server", "redis-tools", "redis"]),
    ("supervisor", &["supervisor"]),
    ("node.js", &["nodejs"]),
    ("certbot", &["certbot", "python3-certbot*"]),
];

pub const DATABASE_PACKAGES: &[&str] = &["mariadb-*", "mysql-*", "galera-*", "libmariadb*"];

/// Groups purged one `apt-get purge` at a time, so one broken maintainer
/// script only holds back its own component
pub fn package_groups(keep_database: bool) -> Vec<(&'static str, &'static [&'static str])> {
    let mut groups = PACKAGE_GROUPS.to_vec();
    if !keep_database {
        groups.push(("database", DATABASE_PACKAGES));
    }
    groups
}

pub fn package_patterns(keep_database: bool) -> Vec<&'static str> {
    let mut patterns: Vec<&'static str> = PACKAGE_GROUPS
        .iter()
        .flat_map(|(_, patterns)| patterns.iter().copied())
        .collect();
    if !keep_database {
        patterns.extend_from_slice(DATABASE_PACKAGES);
    }
    patterns
}

/// Configuration and data directories per component
pub const DIRECTORIES: &[&str] = &[
    "/etc/nginx",
    "/var/log/nginx",
    "/var/lib/nginx",
    "/etc/php",
    "/var/lib/php",
    "/var/log/php",
    "/etc/redis",
    "/var/lib/redis",
    "/var/log/redis",
    "/etc/supervisor",
    "/var/log/supervisor",
    "/etc/letsencrypt",
];

pub const DATABASE_DIRECTORIES: &[&str] = &["/etc/mysql", "/var/lib/mysql", "/var/log/mysql"];

pub const CRON_DIRS: &[&str] = &["/etc/cron.d", "/var/spool/cron/crontabs"];

pub const SOURCE_DIR: &str = "/etc/apt/sources.list.d";
pub const SOURCE_MARKERS: &[&str] = &["ondrej", "nodesource"];
pub const KEYRINGS: &[&str] = &[
    "/etc/apt/keyrings/nodesource.gpg",
    "/usr/share/keyrings/nodesource.gpg",
];

/// Tool caches and history files under each home directory
pub const HOME_ENTRIES: &[&str] = &[
    ".composer",
    ".config/composer",
    ".cache/composer",
    ".npm",
    ".config/psysh",
    ".local/share/psysh",
    ".node_repl_history",
    ".php_history",
    ".rediscli_history",
];

pub const DATABASE_HOME_ENTRIES: &[&str] = &[".mysql_history"];

pub const UNIT_DIRS: &[&str] = &["/etc/systemd/system", "/lib/systemd/system"];
