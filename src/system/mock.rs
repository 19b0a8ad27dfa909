//! Scripted `SystemRunner` for tests.
//!
//! Responses are matched by command-line prefix; the most recently added
//! matching rule wins. Unmatched commands succeed with empty output. Every
//! call is recorded so tests can assert on what would have run.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CommandOutput, CommandSpec, SystemRunner};
use crate::error::CommandError;

struct Rule {
    prefix: String,
    responses: VecDeque<CommandOutput>,
}

#[derive(Default)]
pub struct MockRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer commands starting with `prefix` with `output`
    pub fn respond(&self, prefix: &str, output: CommandOutput) -> &Self {
        self.respond_sequence(prefix, vec![output])
    }

    /// Answer successive matching calls with `outputs`; the last one repeats
    pub fn respond_sequence(&self, prefix: &str, outputs: Vec<CommandOutput>) -> &Self {
        self.rules.lock().expect("rules").push(Rule {
            prefix: prefix.to_string(),
            responses: outputs.into(),
        });
        self
    }

    /// Commands starting with `prefix` exit with `code`
    pub fn fail(&self, prefix: &str, code: i32) -> &Self {
        self.respond(prefix, CommandOutput::failed(code, format!("{prefix}: failed")))
    }

    /// All recorded command lines, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .map(CommandSpec::command_line)
            .collect()
    }

    /// Recorded specs, for stdin/env assertions
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("calls").clear();
    }
}

impl SystemRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().expect("calls").push(spec.clone());
        let line = spec.command_line();

        let mut rules = self.rules.lock().expect("rules");
        let rule = rules
            .iter_mut()
            .rev()
            .find(|rule| line.starts_with(&rule.prefix));

        Ok(match rule {
            Some(rule) if rule.responses.len() > 1 => {
                rule.responses.pop_front().unwrap_or_default()
            }
            Some(rule) => rule.responses.front().cloned().unwrap_or_default(),
            None => CommandOutput::ok(""),
        })
    }
}
