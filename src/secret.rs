//! Credential generation with a degrading chain of entropy sources.
//!
//! Tiers are tried in order and the first non-empty draw wins:
//! 1. the OS CSPRNG, bytes filtered to the alphabet;
//! 2. `openssl rand -base64`, filtered to the alphabet;
//! 3. a seeded pseudo-random per-character pick.
//!
//! Generation never fails. Output is always exactly the requested length:
//! short results are padded deterministically, long ones truncated.

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};

use crate::system::{CommandSpec, SystemRunner};
use crate::validate::{self, Strength};

/// Characters a generated secret may contain
pub const ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()_+=";

pub fn in_alphabet(c: char) -> bool {
    ALPHABET.contains(c)
}

/// One tier of the fallback chain. A draw may come back short or empty.
pub trait EntropySource {
    fn name(&self) -> &'static str;
    fn draw(&mut self, len: usize) -> String;
}

/// Tier 1: kernel CSPRNG via `OsRng`
#[derive(Debug, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn name(&self) -> &'static str {
        "os-random"
    }

    fn draw(&mut self, len: usize) -> String {
        let mut out = String::with_capacity(len);
        let mut buf = vec![0u8; len.max(16) * 4];
        for _ in 0..16 {
            if OsRng.try_fill_bytes(&mut buf).is_err() {
                return String::new();
            }
            out.extend(
                buf.iter()
                    .map(|&b| b as char)
                    .filter(|&c| in_alphabet(c))
                    .take(len - out.len()),
            );
            if out.len() >= len {
                break;
            }
        }
        out
    }
}

/// Tier 2: `openssl rand -base64`
pub struct OpensslEntropy<'a> {
    runner: &'a dyn SystemRunner,
}

impl<'a> OpensslEntropy<'a> {
    pub fn new(runner: &'a dyn SystemRunner) -> Self {
        Self { runner }
    }
}

impl EntropySource for OpensslEntropy<'_> {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn draw(&mut self, len: usize) -> String {
        let spec = CommandSpec::new("openssl")
            .args(["rand", "-base64", &(len * 2).to_string()])
            .sensitive();
        match self.runner.run_checked(&spec) {
            Ok(out) => out.stdout.chars().filter(|&c| in_alphabet(c)).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "openssl entropy unavailable");
                String::new()
            }
        }
    }
}

/// Tier 3: seeded PRNG, one alphabet pick per character
pub struct PseudoEntropy {
    rng: StdRng,
}

impl PseudoEntropy {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from wall clock and PID
    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::seeded(nanos ^ (u64::from(std::process::id()) << 32))
    }
}

impl EntropySource for PseudoEntropy {
    fn name(&self) -> &'static str {
        "pseudo-random"
    }

    fn draw(&mut self, len: usize) -> String {
        let alphabet = ALPHABET.as_bytes();
        (0..len)
            .map(|_| alphabet[self.rng.gen_range(0..alphabet.len())] as char)
            .collect()
    }
}

pub struct SecretGenerator<'a> {
    tiers: Vec<Box<dyn EntropySource + 'a>>,
}

impl<'a> SecretGenerator<'a> {
    /// The full three-tier chain
    pub fn standard(runner: &'a dyn SystemRunner) -> Self {
        Self::with_tiers(vec![
            Box::new(OsEntropy),
            Box::new(OpensslEntropy::new(runner)),
            Box::new(PseudoEntropy::from_clock()),
        ])
    }

    pub fn with_tiers(tiers: Vec<Box<dyn EntropySource + 'a>>) -> Self {
        Self { tiers }
    }

    /// Exactly `len` characters from `ALPHABET`
    pub fn generate(&mut self, len: usize) -> String {
        if len == 0 {
            return String::new();
        }
        let mut secret = String::new();
        for tier in &mut self.tiers {
            let drawn: String = tier.draw(len).chars().filter(|&c| in_alphabet(c)).collect();
            if !drawn.is_empty() {
                tracing::debug!(tier = tier.name(), "secret drawn");
                secret = drawn;
                break;
            }
            tracing::debug!(tier = tier.name(), "entropy tier produced nothing, falling back");
        }
        fit_length(secret, len)
    }

    /// Regenerate (bounded) until the secret scores STRONG
    pub fn generate_strong(&mut self, len: usize) -> String {
        let mut secret = self.generate(len);
        for _ in 0..8 {
            if validate::password_strength(&secret) == Strength::Strong {
                break;
            }
            secret = self.generate(len);
        }
        secret
    }
}

/// Truncate, or pad by cycling through the alphabet
fn fit_length(secret: String, len: usize) -> String {
    let mut chars: Vec<char> = secret.chars().take(len).collect();
    let alphabet: Vec<char> = ALPHABET.chars().collect();
    while chars.len() < len {
        chars.push(alphabet[chars.len() % alphabet.len()]);
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::CommandOutput;
    use crate::system::mock::MockRunner;

    struct Empty;
    impl EntropySource for Empty {
        fn name(&self) -> &'static str {
            "empty"
        }
        fn draw(&mut self, _len: usize) -> String {
            String::new()
        }
    }

    struct Fixed(&'static str);
    impl EntropySource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn draw(&mut self, _len: usize) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_standard_chain_exact_length() {
        let mock = MockRunner::new();
        let mut generator = SecretGenerator::standard(&mock);
        for len in [1, 12, 24, 32, 100] {
            let s = generator.generate(len);
            assert_eq!(s.chars().count(), len);
            assert!(s.chars().all(in_alphabet));
        }
        assert!(!mock.ran("openssl"), "tier 2 only runs when tier 1 is empty");
    }

    #[test]
    fn test_falls_back_to_openssl() {
        let mock = MockRunner::new();
        mock.respond("openssl rand", CommandOutput::ok("q1w2E3r4/T5y6+U7i8==\n"));
        let mut generator = SecretGenerator::with_tiers(vec![
            Box::new(Empty),
            Box::new(OpensslEntropy::new(&mock)),
        ]);

        let s = generator.generate(8);
        assert_eq!(s, "q1w2E3r4");
    }

    #[test]
    fn test_filters_and_pads_short_draws() {
        let mut generator = SecretGenerator::with_tiers(vec![Box::new(Fixed("ab~~ c"))]);
        let s = generator.generate(6);
        assert_eq!(s.len(), 6);
        assert!(s.starts_with("abc"));
        assert!(s.chars().all(in_alphabet));
        // padding is deterministic
        assert_eq!(s, generator.generate(6));
    }

    #[test]
    fn test_truncates_long_draws() {
        let mut generator = SecretGenerator::with_tiers(vec![Box::new(Fixed("abcdefghij"))]);
        assert_eq!(generator.generate(4), "abcd");
    }

    #[test]
    fn test_all_tiers_empty_still_yields_secret() {
        let mut generator = SecretGenerator::with_tiers(vec![Box::new(Empty), Box::new(Empty)]);
        let s = generator.generate(10);
        assert_eq!(s, "ABCDEFGHIJ");
    }

    #[test]
    fn test_generate_strong() {
        let mut generator = SecretGenerator::with_tiers(vec![Box::new(PseudoEntropy::seeded(7))]);
        let s = generator.generate_strong(24);
        assert_eq!(s.len(), 24);
        assert!(validate::password_strength(&s) >= Strength::Medium);
    }
}
