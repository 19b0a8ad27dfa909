//! Input validators for wizard answers, CLI values and environment overrides.
//!
//! Validators never fail hard: a rejection is a value carrying the reason, and
//! the caller decides whether to re-prompt (wizard) or exit (CLI boundary).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static PROJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,50}$").expect("project name regex"));

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("domain regex")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?\.[A-Za-z]{2,}$")
        .expect("email regex")
});

static DB_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier regex"));

pub const DB_NAME_MAX: usize = 64;
pub const DB_USER_MAX: usize = 32;
pub const WORKERS_MIN: u8 = 1;
pub const WORKERS_MAX: u8 = 20;

/// Reason an answer was rejected. Displayed to the operator before re-prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalid(pub &'static str);

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Invalid {}

pub type Verdict = Result<(), Invalid>;

/// Letters, digits, `-` and `_`, 3 to 50 characters
pub fn project_name(name: &str) -> Verdict {
    if PROJECT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Invalid(
            "project name must be 3-50 characters of letters, digits, '-' or '_'",
        ))
    }
}

pub fn domain(domain: &str) -> Verdict {
    if DOMAIN.is_match(domain) {
        Ok(())
    } else {
        Err(Invalid(
            "domain must be dot-separated letters, digits and hyphens (e.g. example.com)",
        ))
    }
}

pub fn email(email: &str) -> Verdict {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(Invalid("email must look like user@example.com"))
    }
}

pub fn db_name(name: &str) -> Verdict {
    db_identifier(name, DB_NAME_MAX)
        .map_err(|_| Invalid("database name must be 1-64 letters, digits or '_'"))
}

pub fn db_user(user: &str) -> Verdict {
    db_identifier(user, DB_USER_MAX)
        .map_err(|_| Invalid("database user must be 1-32 letters, digits or '_'"))
}

fn db_identifier(value: &str, max: usize) -> Verdict {
    if value.len() <= max && DB_IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(Invalid("invalid identifier"))
    }
}

/// Parses and range-checks a supervised worker count
pub fn worker_count(raw: &str) -> Result<u8, Invalid> {
    match raw.trim().parse::<u8>() {
        Ok(n) if (WORKERS_MIN..=WORKERS_MAX).contains(&n) => Ok(n),
        _ => Err(Invalid("worker count must be a number from 1 to 20")),
    }
}

/// Password strength tiers. Ordering follows strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weak => "WEAK",
            Self::Medium => "MEDIUM",
            Self::Strong => "STRONG",
        })
    }
}

/// Raw score: 2 points for 12+ chars (1 for 8+), one per character class.
pub fn password_score(password: &str) -> u8 {
    let len = password.chars().count();
    let mut score = match len {
        12.. => 2,
        8..=11 => 1,
        _ => 0,
    };
    let classes: [fn(&char) -> bool; 4] = [
        char::is_ascii_lowercase,
        char::is_ascii_uppercase,
        char::is_ascii_digit,
        |c| !c.is_ascii_alphanumeric(),
    ];
    for class in classes {
        if password.chars().any(|c| class(&c)) {
            score += 1;
        }
    }
    score
}

pub fn password_strength(password: &str) -> Strength {
    match password_score(password) {
        0..=2 => Strength::Weak,
        3..=4 => Strength::Medium,
        _ => Strength::Strong,
    }
}
