//! Rendered configuration files.
//!
//! Each function returns the complete file text for one configuration
//! record. Files written from these are always replaced whole, so re-running
//! a step never accumulates directives.

use crate::config::ConfigRecord;
use crate::types::QueueDriver;

pub fn nginx_site_path(project: &str) -> String {
    format!("/etc/nginx/sites-available/{project}")
}

pub fn nginx_enabled_path(project: &str) -> String {
    format!("/etc/nginx/sites-enabled/{project}")
}

pub const NGINX_DEFAULT_SITE: &str = "/etc/nginx/sites-enabled/default";
pub const MARIADB_TUNING: &str = "/etc/mysql/mariadb.conf.d/99-laravel.cnf";
pub const REDIS_CONF: &str = "/etc/redis/redis.conf";

pub fn worker_conf_path(project: &str) -> String {
    format!("/etc/supervisor/conf.d/laravel-worker-{project}.conf")
}

pub fn cron_path(project: &str) -> String {
    format!("/etc/cron.d/laravel-{project}")
}

pub fn env_hint_path(record: &ConfigRecord) -> String {
    format!("{}/.env.lemp", record.project_dir())
}

pub fn placeholder_path(record: &ConfigRecord) -> String {
    format!("{}/public/index.php", record.project_dir())
}

pub fn nginx_site(record: &ConfigRecord) -> String {
    let domain = &record.domain;
    let root = format!("{}/public", record.project_dir());
    let socket = record.php_version.fpm_socket();
    format!(
        r#"server {{
    listen 80;
    listen [::]:80;
    server_name {domain} www.{domain};
    root {root};

    add_header X-Frame-Options "SAMEORIGIN";
    add_header X-Content-Type-Options "nosniff";

    index index.php index.html;
    charset utf-8;
    client_max_body_size 64M;

    location / {{
        try_files $uri $uri/ /index.php?$query_string;
    }}

    location = /favicon.ico {{ access_log off; log_not_found off; }}
    location = /robots.txt  {{ access_log off; log_not_found off; }}

    error_page 404 /index.php;

    location ~ \.php$ {{
        fastcgi_pass unix:{socket};
        fastcgi_param SCRIPT_FILENAME $realpath_root$fastcgi_script_name;
        include fastcgi_params;
        fastcgi_hide_header X-Powered-By;
    }}

    location ~ /\.(?!well-known).* {{
        deny all;
    }}
}}
"#
    )
}

pub fn placeholder_index(record: &ConfigRecord) -> String {
    format!(
        "<?php\n// Placeholder until the Laravel application is deployed to {}\necho '{} is ready for deployment';\n",
        record.project_dir(),
        record.project_name
    )
}

/// `php.ini` directives applied to both the FPM and CLI configuration
pub const PHP_INI_DIRECTIVES: &[(&str, &str)] = &[
    ("memory_limit", "256M"),
    ("upload_max_filesize", "64M"),
    ("post_max_size", "64M"),
    ("max_execution_time", "300"),
    ("cgi.fix_pathinfo", "0"),
];

pub fn mariadb_tuning() -> String {
    "[mysqld]\n\
     character-set-server = utf8mb4\n\
     collation-server = utf8mb4_unicode_ci\n\
     bind-address = 127.0.0.1\n\
     innodb_buffer_pool_size = 256M\n\
     max_connections = 150\n"
        .to_string()
}

/// SQL fed to the `mysql` client on stdin. Every statement is safe to repeat.
pub fn provisioning_sql(record: &ConfigRecord) -> String {
    let db = &record.db_name;
    let user = &record.db_user;
    let password = sql_quote(record.db_password.expose());
    let root_password = sql_quote(record.db_root_password.expose());
    format!(
        "CREATE DATABASE IF NOT EXISTS `{db}` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci;\n\
         CREATE USER IF NOT EXISTS '{user}'@'localhost' IDENTIFIED BY '{password}';\n\
         ALTER USER '{user}'@'localhost' IDENTIFIED BY '{password}';\n\
         GRANT ALL PRIVILEGES ON `{db}`.* TO '{user}'@'localhost';\n\
         DELETE FROM mysql.global_priv WHERE User='';\n\
         DROP DATABASE IF EXISTS test;\n\
         ALTER USER 'root'@'localhost' IDENTIFIED VIA unix_socket OR mysql_native_password USING PASSWORD('{root_password}');\n\
         FLUSH PRIVILEGES;\n"
    )
}

/// Escape a value for a single-quoted SQL literal
pub fn sql_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn supervisor_worker(record: &ConfigRecord) -> String {
    let project = &record.project_name;
    let dir = record.project_dir();
    let connection = record.queue_driver;
    let workers = record.worker_count;
    format!(
        "[program:laravel-worker-{project}]\n\
         process_name=%(program_name)s_%(process_num)02d\n\
         command=/usr/bin/php {dir}/artisan queue:work {connection} --sleep=3 --tries=3 --max-time=3600\n\
         autostart=true\n\
         autorestart=true\n\
         stopasgroup=true\n\
         killasgroup=true\n\
         user=www-data\n\
         numprocs={workers}\n\
         redirect_stderr=true\n\
         stdout_logfile={dir}/storage/logs/worker.log\n\
         stopwaitsecs=3600\n"
    )
}

pub fn permission_helper() -> String {
    r#"#!/bin/bash
# Reset ownership and permissions of a Laravel project for the web server.
# Usage: laravel-permissions <project-directory>
set -euo pipefail

DIR="${1:-}"
if [[ -z "$DIR" || ! -d "$DIR" ]]; then
    echo "Usage: laravel-permissions <project-directory>" >&2
    exit 1
fi

chown -R www-data:www-data "$DIR"
find "$DIR" -type f -exec chmod 644 {} \;
find "$DIR" -type d -exec chmod 755 {} \;
for writable in storage bootstrap/cache; do
    if [[ -d "$DIR/$writable" ]]; then
        chmod -R ug+rwx "$DIR/$writable"
    fi
done
echo "Permissions reset for $DIR"
"#
    .to_string()
}

pub fn cron_entry(record: &ConfigRecord) -> String {
    format!(
        "# Laravel scheduler for {}\n\
         * * * * * www-data cd {} && /usr/bin/php artisan schedule:run >> /dev/null 2>&1\n",
        record.project_name,
        record.project_dir()
    )
}

/// Marker the removal tool uses to find scheduler entries
pub const CRON_MARKER: &str = "artisan schedule:run";

/// `.env` settings for the Laravel application, secrets included
pub fn env_hint(record: &ConfigRecord) -> String {
    let mut out = format!(
        "# Settings generated for {project}. Copy into {dir}/.env\n\
         APP_URL=http://{domain}\n\
         DB_CONNECTION=mysql\n\
         DB_HOST=127.0.0.1\n\
         DB_PORT=3306\n\
         DB_DATABASE={db}\n\
         DB_USERNAME={user}\n\
         DB_PASSWORD={password}\n\
         REDIS_HOST=127.0.0.1\n\
         REDIS_PASSWORD={redis}\n\
         REDIS_PORT=6379\n\
         QUEUE_CONNECTION={queue}\n",
        project = record.project_name,
        dir = record.project_dir(),
        domain = record.domain,
        db = record.db_name,
        user = record.db_user,
        password = record.db_password.expose(),
        redis = record.redis_password.expose(),
        queue = record.queue_driver,
    );
    if record.queue_driver == QueueDriver::Redis {
        out.push_str("CACHE_STORE=redis\nSESSION_DRIVER=redis\n");
    }
    out
}
