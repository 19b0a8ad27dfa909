//! Teardown scenarios against a scripted host

use std::io::Cursor;

use lempkit::layout::{Layout, PERMISSION_HELPER, RECOVERY_FILE};
use lempkit::removal::{self, Confirmation, Outcome, Phase, Remover};
use lempkit::system::CommandOutput;
use lempkit::system::mock::MockRunner;
use lempkit::wizard::Prompter;

const DPKG_BEFORE: &str = "install ok installed\tnginx\n\
                           install ok installed\tnginx-common\n\
                           install ok installed\tphp8.3-fpm\n\
                           install ok installed\tphp8.3-cli\n\
                           install ok installed\tredis-server\n\
                           install ok installed\tsupervisor\n\
                           install ok installed\tmariadb-server\n\
                           install ok installed\tmariadb-client\n\
                           install ok installed\tcoreutils\n\
                           deinstall ok config-files\tapache2\n";

const DPKG_AFTER: &str = "install ok installed\tmariadb-server\n\
                          install ok installed\tmariadb-client\n\
                          install ok installed\tcoreutils\n";

fn installed_host() -> (tempfile::TempDir, Layout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    for file in [
        "/etc/nginx/nginx.conf",
        "/etc/php/8.3/fpm/php.ini",
        "/etc/redis/redis.conf",
        "/etc/mysql/my.cnf",
        "/var/lib/mysql/ibdata1",
        "/etc/apt/sources.list.d/ondrej-ubuntu-php-noble.sources",
        "/etc/apt/sources.list.d/nodesource.list",
        "/etc/apt/sources.list.d/docker.list",
    ] {
        layout.write(file, "x", 0o644).unwrap();
    }
    layout.write(PERMISSION_HELPER, "#!/bin/bash\n", 0o755).unwrap();
    layout.write(RECOVERY_FILE, "DB_PASSWORD=secret\n", 0o600).unwrap();
    layout
        .write(
            "/etc/cron.d/laravel-shop",
            "* * * * * www-data cd /var/www/shop && php artisan schedule:run >> /dev/null 2>&1\n",
            0o644,
        )
        .unwrap();
    layout
        .write(
            "/etc/passwd",
            "root:x:0:0:root:/root:/bin/bash\ndeploy:x:1000:1000::/home/deploy:/bin/bash\n",
            0o644,
        )
        .unwrap();
    layout.write("/home/deploy/.composer/auth.json", "{}", 0o600).unwrap();
    layout.write("/root/.mysql_history", "SELECT 1;", 0o600).unwrap();
    (dir, layout)
}

fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
    Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
}

/// Every `apt-get purge` issued, joined into one line
fn purged(mock: &MockRunner) -> String {
    mock.calls()
        .into_iter()
        .filter(|c| c.starts_with("apt-get -y purge"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn test_declining_first_prompt_changes_nothing() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();

    assert_eq!(removal::confirm(&mut prompter("N\n")).unwrap(), Confirmation::Declined);

    assert!(mock.calls().is_empty());
    assert!(layout.exists("/etc/nginx/nginx.conf"));
    assert!(layout.exists(RECOVERY_FILE));
}

#[test]
fn test_keep_database_leaves_mariadb_in_place() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();
    mock.respond_sequence(
        "dpkg-query",
        vec![CommandOutput::ok(DPKG_BEFORE), CommandOutput::ok(DPKG_AFTER)],
    );

    let keep_database = match removal::confirm(&mut prompter("y\nn\n")).unwrap() {
        Confirmation::Proceed { keep_database } => keep_database,
        Confirmation::Declined => panic!("removal should proceed"),
    };
    assert!(keep_database);

    let report = Remover::new(&mock, &layout, keep_database).run();

    let purge = purged(&mock);
    assert!(purge.contains("nginx-common"));
    assert!(purge.contains("php8.3-fpm"));
    assert!(!purge.contains("mariadb"));
    assert!(!purge.contains("coreutils"));
    assert!(!purge.contains("apache2"));
    assert!(!mock.ran("systemctl is-active mariadb"));

    assert!(!layout.exists("/etc/nginx"));
    assert!(!layout.exists("/etc/php"));
    assert!(layout.exists("/etc/mysql/my.cnf"));
    assert!(layout.exists("/var/lib/mysql/ibdata1"));
    assert!(layout.exists(RECOVERY_FILE));
    assert!(layout.exists("/root/.mysql_history"));
    assert!(!layout.exists("/home/deploy/.composer"));
    assert!(!layout.exists(PERMISSION_HELPER));
    assert!(!layout.exists("/etc/cron.d/laravel-shop"));

    assert!(!layout.exists("/etc/apt/sources.list.d/nodesource.list"));
    assert!(!layout.exists("/etc/apt/sources.list.d/ondrej-ubuntu-php-noble.sources"));
    assert!(layout.exists("/etc/apt/sources.list.d/docker.list"));

    assert!(report.keep_database);
    assert!(report.residual.is_clean());
    assert_eq!(report.totals().failed, 0);
}

#[test]
fn test_full_removal_drops_database_and_credentials() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();
    mock.respond_sequence(
        "dpkg-query",
        vec![CommandOutput::ok(DPKG_BEFORE), CommandOutput::ok("")],
    );

    let report = Remover::new(&mock, &layout, false).run();

    assert!(mock.ran("systemctl stop mariadb"));
    assert!(mock.ran("systemctl disable mariadb"));
    assert!(purged(&mock).contains("mariadb-server"));
    assert!(!layout.exists("/var/lib/mysql"));
    assert!(!layout.exists(RECOVERY_FILE));
    assert!(!layout.exists("/root/.mysql_history"));
    assert!(mock.ran("systemctl daemon-reload"));
    assert!(!report.keep_database);
}

#[test]
fn test_failures_are_recorded_not_fatal() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();
    mock.respond("dpkg-query", CommandOutput::ok(DPKG_BEFORE));
    mock.fail("apt-get -y purge", 100);
    mock.fail("systemctl stop nginx", 1);

    let report = Remover::new(&mock, &layout, true).run();

    let stop = report.phase(Phase::StopServices).unwrap();
    assert!(stop
        .actions
        .iter()
        .any(|a| a.target == "nginx" && matches!(a.outcome, Outcome::Failed(_))));
    assert!(report.phase(Phase::PurgePackages).unwrap().counts().failed > 0);

    // later phases still ran
    assert!(!layout.exists("/etc/nginx"));
    assert!(mock.ran("systemctl daemon-reload"));
    assert!(report.residual.packages.contains(&"nginx".to_string()));
    assert!(!report.residual.packages.contains(&"mariadb-server".to_string()));
}

#[test]
fn test_second_removal_reports_everything_absent() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();
    mock.respond_sequence(
        "dpkg-query",
        vec![CommandOutput::ok(DPKG_BEFORE), CommandOutput::ok("")],
    );
    Remover::new(&mock, &layout, false).run();

    mock.clear_calls();
    mock.fail("systemctl is-active", 3);
    mock.fail("systemctl is-enabled", 1);
    let again = Remover::new(&mock, &layout, false).run();

    assert!(!mock.ran("apt-get -y purge"));
    assert!(!mock.ran("systemctl stop"));
    for phase in [Phase::StopServices, Phase::RemoveDirectories, Phase::RemoveCron] {
        let counts = again.phase(phase).unwrap().counts();
        assert_eq!(counts.removed, 0, "{phase}");
        assert_eq!(counts.failed, 0, "{phase}");
    }
}

#[test]
fn test_one_failing_group_does_not_hold_back_the_others() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();
    mock.respond("dpkg-query", CommandOutput::ok(DPKG_BEFORE));
    mock.fail("apt-get -y purge php8.3", 100);

    let report = Remover::new(&mock, &layout, true).run();
    let purge = report.phase(Phase::PurgePackages).unwrap();
    let outcome = |target: &str| {
        purge
            .actions
            .iter()
            .find(|a| a.target == target)
            .map(|a| a.outcome.clone())
            .unwrap()
    };

    assert!(matches!(outcome("php8.3-fpm"), Outcome::Failed(_)));
    assert!(matches!(outcome("php8.3-cli"), Outcome::Failed(_)));
    assert_eq!(outcome("nginx"), Outcome::Removed);
    assert_eq!(outcome("redis-server"), Outcome::Removed);
    assert_eq!(outcome("supervisor"), Outcome::Removed);
    assert_eq!(outcome("apt-get -y autoremove --purge"), Outcome::Removed);
    assert_eq!(purge.counts().failed, 2);
    assert!(mock.ran("apt-get -y purge nginx nginx-common"));
}

#[test]
fn test_enabled_but_stopped_service_is_disabled() {
    let (_dir, layout) = installed_host();
    let mock = MockRunner::new();
    mock.respond("dpkg-query", CommandOutput::ok(""));
    mock.fail("systemctl is-active", 3);

    let report = Remover::new(&mock, &layout, true).run();

    assert!(!mock.ran("systemctl stop"));
    assert!(mock.ran("systemctl disable supervisor"));
    let stop = report.phase(Phase::StopServices).unwrap();
    assert!(stop.actions.iter().all(|a| a.outcome == Outcome::Removed));
}
