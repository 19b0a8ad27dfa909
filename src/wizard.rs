//! Configuration wizard.
//!
//! Walks a fixed question sequence (project, domain, email, database name and
//! user, three credentials, PHP version, queue driver, worker count). Every
//! question loops until its validator accepts; an empty answer takes the shown
//! default. Non-interactive mode fills the same record from presets and
//! computed defaults without prompting.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{self, ConfigRecord, Secret};
use crate::layout::Layout;
use crate::secret::SecretGenerator;
use crate::types::{PhpVersion, QueueDriver};
use crate::validate::{self, Strength, Verdict};

pub const DB_PASSWORD_LEN: usize = 24;
pub const ROOT_PASSWORD_LEN: usize = 32;
pub const REDIS_PASSWORD_LEN: usize = 24;

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("terminal IO failed: {0}")]
    Io(#[from] io::Error),

    #[error("input closed while asking for {0}")]
    InputClosed(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot write recovery file: {0}")]
    Recovery(String),
}

/// Values supplied before the wizard runs (CLI flags, environment overrides).
/// In interactive mode they become the shown defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presets {
    pub project_name: Option<String>,
    pub domain: Option<String>,
    pub ssl_email: Option<String>,
    pub worker_count: Option<u8>,
    pub php_version: Option<PhpVersion>,
    pub queue_driver: Option<QueueDriver>,
}

/// Line-oriented prompt over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    closed: bool,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            closed: false,
        }
    }

    pub fn say(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{line}")
    }

    /// One line of input; `None` once the input is exhausted
    fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            self.closed = true;
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask once. Empty input (or closed input) yields `default`.
    pub fn ask(&mut self, question: &str, default: &str) -> io::Result<String> {
        if default.is_empty() {
            write!(self.output, "{question}: ")?;
        } else {
            write!(self.output, "{question} [{default}]: ")?;
        }
        self.output.flush()?;
        Ok(match self.read_line()? {
            Some(answer) if !answer.is_empty() => answer,
            _ => default.to_string(),
        })
    }

    /// Ask until `check` accepts the answer
    pub fn ask_valid(
        &mut self,
        question: &str,
        default: &str,
        check: impl Fn(&str) -> Verdict,
    ) -> Result<String, WizardError> {
        loop {
            let answer = self.ask(question, default)?;
            match check(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) if self.closed => {
                    tracing::debug!(%reason, "input closed on invalid answer");
                    return Err(WizardError::InputClosed(question.to_string()));
                }
                Err(reason) => self.say(&format!("  Invalid: {reason}. Please try again."))?,
            }
        }
    }

    /// y/N question; an empty answer takes `default_yes`. Closed input
    /// always answers no, so a vanished terminal never approves anything.
    pub fn confirm(&mut self, question: &str, default_yes: bool) -> Result<bool, WizardError> {
        let hint = if default_yes { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "{question} [{hint}]: ")?;
            self.output.flush()?;
            let Some(answer) = self.read_line()? else {
                tracing::debug!(question, "input closed, treating as no");
                return Ok(false);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default_yes),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("  Please answer y or n.")?,
            }
        }
    }

    /// Numbered menu; returns the zero-based index picked
    pub fn choose(
        &mut self,
        question: &str,
        options: &[String],
        default: usize,
    ) -> Result<usize, WizardError> {
        self.say(question)?;
        for (i, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {option}", i + 1))?;
        }
        let count = options.len();
        let pick = self.ask_valid("Select an option", &(default + 1).to_string(), |s| {
            match s.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => Ok(()),
                _ => Err(validate::Invalid("pick one of the listed numbers")),
            }
        })?;
        pick.parse::<usize>()
            .map(|n| n - 1)
            .map_err(|_| WizardError::InputClosed(question.to_string()))
    }

    fn ask_secret(
        &mut self,
        label: &str,
        len: usize,
        generator: &mut SecretGenerator<'_>,
    ) -> Result<Secret, WizardError> {
        let options = [
            "Generate a strong password (recommended)".to_string(),
            "Enter a password manually".to_string(),
        ];
        if self.choose(&format!("{label}:"), &options, 0)? == 0 {
            self.say(&format!("  Generated a {len}-character {label}."))?;
            return Ok(Secret::new(generator.generate_strong(len)));
        }

        loop {
            write!(self.output, "Enter {label}: ")?;
            self.output.flush()?;
            let Some(candidate) = self.read_line()? else {
                return Err(WizardError::InputClosed(label.to_string()));
            };
            match validate::password_strength(&candidate) {
                Strength::Weak => self.say(
                    "  Password is WEAK. Use 12+ characters mixing upper/lower case, digits and symbols.",
                )?,
                Strength::Medium => {
                    if self.confirm("  Password strength is MEDIUM. Use it anyway?", false)? {
                        return Ok(Secret::new(candidate));
                    }
                }
                Strength::Strong => return Ok(Secret::new(candidate)),
            }
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Run the full question sequence
pub fn collect_interactive<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    presets: &Presets,
    generator: &mut SecretGenerator<'_>,
) -> Result<ConfigRecord, WizardError> {
    prompter.say("")?;
    prompter.say("Laravel LEMP stack configuration")?;
    prompter.say("Press Enter to accept the value shown in brackets.")?;
    prompter.say("")?;

    let project_name = prompter.ask_valid(
        "Project name",
        presets.project_name.as_deref().unwrap_or(config::DEFAULT_PROJECT),
        validate::project_name,
    )?;

    let domain_default = presets
        .domain
        .clone()
        .unwrap_or_else(|| config::default_domain(&project_name, true));
    let domain = prompter.ask_valid("Domain", &domain_default, validate::domain)?;

    let email_default = presets
        .ssl_email
        .clone()
        .unwrap_or_else(|| config::default_email(&domain));
    let ssl_email = prompter.ask_valid("SSL contact email", &email_default, validate::email)?;

    let db_name = prompter.ask_valid(
        "Database name",
        &config::default_db_name(&project_name),
        validate::db_name,
    )?;
    let db_user = prompter.ask_valid(
        "Database user",
        &config::default_db_user(&db_name),
        validate::db_user,
    )?;

    let db_password = prompter.ask_secret("database password", DB_PASSWORD_LEN, generator)?;
    let db_root_password =
        prompter.ask_secret("MariaDB root password", ROOT_PASSWORD_LEN, generator)?;
    let redis_password = prompter.ask_secret("Redis password", REDIS_PASSWORD_LEN, generator)?;

    let php_default = presets.php_version.unwrap_or_default();
    let php_choices = PhpVersion::choices();
    let php_pick = prompter.choose(
        "PHP version:",
        &php_choices,
        php_choices
            .iter()
            .position(|v| *v == php_default.to_string())
            .unwrap_or(0),
    )?;
    let php_version = php_choices[php_pick]
        .parse()
        .map_err(|_| invalid("PHP version", &php_choices[php_pick]))?;

    let queue_default = presets.queue_driver.unwrap_or_default();
    let queue_choices = QueueDriver::choices();
    let queue_pick = prompter.choose(
        "Queue driver:",
        &queue_choices,
        queue_choices
            .iter()
            .position(|v| *v == queue_default.to_string())
            .unwrap_or(0),
    )?;
    let queue_driver = queue_choices[queue_pick]
        .parse()
        .map_err(|_| invalid("queue driver", &queue_choices[queue_pick]))?;

    let workers = prompter.ask_valid(
        "Number of queue workers (1-20)",
        &presets.worker_count.unwrap_or(config::DEFAULT_WORKERS).to_string(),
        |s| validate::worker_count(s).map(|_| ()),
    )?;
    let worker_count =
        validate::worker_count(&workers).map_err(|e| invalid("worker count", &e.to_string()))?;

    Ok(ConfigRecord {
        project_name,
        domain,
        ssl_email,
        db_name,
        db_user,
        db_password,
        db_root_password,
        redis_password,
        php_version,
        queue_driver,
        worker_count,
        non_interactive: false,
        install_ssl: false,
    })
}

/// Fill the record from presets and defaults without prompting
pub fn collect_non_interactive(
    presets: &Presets,
    generator: &mut SecretGenerator<'_>,
) -> Result<ConfigRecord, WizardError> {
    let project_name = presets
        .project_name
        .clone()
        .unwrap_or_else(|| config::DEFAULT_PROJECT.to_string());
    checked("project name", &project_name, validate::project_name)?;

    let domain = presets
        .domain
        .clone()
        .unwrap_or_else(|| config::default_domain(&project_name, false));
    checked("domain", &domain, validate::domain)?;

    let ssl_email = presets
        .ssl_email
        .clone()
        .unwrap_or_else(|| config::default_email(&domain));
    checked("SSL email", &ssl_email, validate::email)?;

    let db_name = config::default_db_name(&project_name);
    let db_user = config::default_db_user(&db_name);

    let worker_count = presets.worker_count.unwrap_or(config::DEFAULT_WORKERS);
    checked("worker count", &worker_count.to_string(), |s| {
        validate::worker_count(s).map(|_| ())
    })?;

    Ok(ConfigRecord {
        project_name,
        domain,
        ssl_email,
        db_name,
        db_user,
        db_password: Secret::new(generator.generate_strong(DB_PASSWORD_LEN)),
        db_root_password: Secret::new(generator.generate_strong(ROOT_PASSWORD_LEN)),
        redis_password: Secret::new(generator.generate_strong(REDIS_PASSWORD_LEN)),
        php_version: presets.php_version.unwrap_or_default(),
        queue_driver: presets.queue_driver.unwrap_or_default(),
        worker_count,
        non_interactive: true,
        install_ssl: false,
    })
}

/// Outcome of the summary/confirmation step
#[derive(Debug)]
pub enum Decision {
    Proceed {
        record: ConfigRecord,
        recovery_file: PathBuf,
    },
    Declined,
}

/// Show the redacted summary, persist the recovery file, then ask to proceed.
/// Non-interactive records proceed without asking.
pub fn review<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    record: ConfigRecord,
    layout: &Layout,
) -> Result<Decision, WizardError> {
    prompter.say("")?;
    prompter.say("Configuration summary")?;
    prompter.say("---------------------")?;
    for (key, value) in record.summary() {
        prompter.say(&format!("  {key:<24} {value}"))?;
    }

    let record = record.with_ssl_deferred();
    let recovery_file = record
        .write_recovery(layout)
        .map_err(|e| WizardError::Recovery(e.to_string()))?;
    prompter.say(&format!(
        "  Full settings (including passwords) saved to {}",
        recovery_file.display()
    ))?;
    prompter.say("")?;

    if !record.non_interactive && !prompter.confirm("Proceed with installation?", true)? {
        return Ok(Decision::Declined);
    }

    Ok(Decision::Proceed {
        record,
        recovery_file,
    })
}

fn invalid(field: &'static str, reason: &str) -> WizardError {
    WizardError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn checked(field: &'static str, value: &str, check: impl Fn(&str) -> Verdict) -> Result<(), WizardError> {
    check(value).map_err(|e| invalid(field, &format!("'{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::PseudoEntropy;
    use std::io::Cursor;

    fn generator() -> SecretGenerator<'static> {
        SecretGenerator::with_tiers(vec![Box::new(PseudoEntropy::seeded(42))])
    }

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_ask_takes_default_on_empty() {
        let mut p = prompter("\n");
        assert_eq!(p.ask("Domain", "shop.com").unwrap(), "shop.com");
    }

    #[test]
    fn test_ask_valid_reprompts_until_accepted() {
        let mut p = prompter("x\nbad name\nshop\n");
        let name = p.ask_valid("Project name", "laravel", validate::project_name).unwrap();
        assert_eq!(name, "shop");
        let out = String::from_utf8(p.into_output()).unwrap();
        assert_eq!(out.matches("Invalid:").count(), 2);
    }

    #[test]
    fn test_ask_valid_errors_when_input_closes_on_invalid() {
        let mut p = prompter("x\n");
        let err = p.ask_valid("Project name", "", validate::project_name).unwrap_err();
        assert!(matches!(err, WizardError::InputClosed(_)));
    }

    #[test]
    fn test_confirm_closed_input_declines() {
        let mut p = prompter("");
        assert!(!p.confirm("Proceed with installation?", true).unwrap());
        let mut p = prompter("\n");
        assert!(p.confirm("Proceed with installation?", true).unwrap());
    }

    #[test]
    fn test_confirm_parsing() {
        let mut p = prompter("maybe\nY\n\n");
        assert!(p.confirm("Continue?", false).unwrap());
        assert!(!p.confirm("Continue?", false).unwrap());
    }

    #[test]
    fn test_choose_rejects_out_of_range() {
        let mut p = prompter("3\n2\n");
        let choices = PhpVersion::choices();
        assert_eq!(p.choose("PHP version:", &choices, 0).unwrap(), 1);
    }

    #[test]
    fn test_manual_password_weak_then_medium_declined_then_strong() {
        // manual entry; weak; medium declined; strong accepted
        let mut p = prompter("2\nabc\nabcdefgH\nn\nS3cure!Passw0rd\n");
        let secret = p.ask_secret("database password", 24, &mut generator()).unwrap();
        assert_eq!(secret.expose(), "S3cure!Passw0rd");
    }

    #[test]
    fn test_manual_password_medium_accepted_with_confirmation() {
        let mut p = prompter("2\nabcdefgH\ny\n");
        let secret = p.ask_secret("Redis password", 24, &mut generator()).unwrap();
        assert_eq!(secret.expose(), "abcdefgH");
    }

    #[test]
    fn test_non_interactive_defaults() {
        let presets = Presets {
            project_name: Some("acme".into()),
            ..Presets::default()
        };
        let record = collect_non_interactive(&presets, &mut generator()).unwrap();
        assert_eq!(record.domain, "acme.local");
        assert_eq!(record.ssl_email, "admin@acme.local");
        assert_eq!(record.db_name, "acme_db");
        assert_eq!(record.db_user, "acme_db_usr");
        assert_eq!(record.php_version, PhpVersion::Php83);
        assert_eq!(record.queue_driver, QueueDriver::Database);
        assert_eq!(record.worker_count, 3);
        assert!(record.non_interactive);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_non_interactive_rejects_bad_override() {
        let presets = Presets {
            domain: Some("not a domain".into()),
            ..Presets::default()
        };
        let err = collect_non_interactive(&presets, &mut generator()).unwrap_err();
        assert!(matches!(err, WizardError::Invalid { field: "domain", .. }));
    }

    #[test]
    fn test_review_declined_still_writes_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let mut record = collect_non_interactive(&Presets::default(), &mut generator()).unwrap();
        record.non_interactive = false;

        let mut p = prompter("n\n");
        let decision = review(&mut p, record, &layout).unwrap();
        assert!(matches!(decision, Decision::Declined));
        assert!(layout.exists(crate::layout::RECOVERY_FILE));
    }
}
