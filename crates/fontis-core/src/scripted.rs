//! A scripted [`CommandRunner`] for tests.
//!
//! Answers each command from the first matching rule and records every
//! invocation, so tests can assert both on what the engine decided and on
//! what it would have executed.

use std::cell::RefCell;
use std::io;

use crate::error::CommandError;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

enum Response {
    Output(CommandOutput),
    SpawnFailure,
}

struct Rule {
    program: String,
    needle: Vec<String>,
    response: Response,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        let needle: Vec<&str> = self.needle.iter().map(String::as_str).collect();
        spec.program() == self.program && spec.has_args(&needle)
    }
}

/// Fake runner answering from scripted rules. Unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `program` invocations whose arguments contain `needle`
    /// (contiguously) with `output`. Earlier rules win.
    #[must_use]
    pub fn on(mut self, program: &str, needle: &[&str], output: CommandOutput) -> Self {
        self.rules.push(Rule {
            program: program.to_owned(),
            needle: needle.iter().map(|s| (*s).to_owned()).collect(),
            response: Response::Output(output),
        });
        self
    }

    /// Make matching invocations fail to spawn.
    #[must_use]
    pub fn spawn_fails(mut self, program: &str, needle: &[&str]) -> Self {
        self.rules.push(Rule {
            program: program.to_owned(),
            needle: needle.iter().map(|s| (*s).to_owned()).collect(),
            response: Response::SpawnFailure,
        });
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Whether any recorded call of `program` contained `needle`.
    pub fn invoked(&self, program: &str, needle: &[&str]) -> bool {
        self.position(program, needle).is_some()
    }

    /// Index of the first recorded call of `program` containing `needle`.
    pub fn position(&self, program: &str, needle: &[&str]) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|c| c.program() == program && c.has_args(needle))
    }

    /// Number of recorded calls of `program` containing `needle`.
    pub fn count(&self, program: &str, needle: &[&str]) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program() == program && c.has_args(needle))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.borrow_mut().push(spec.clone());
        match self.rules.iter().find(|r| r.matches(spec)).map(|r| &r.response) {
            Some(Response::Output(out)) => Ok(out.clone()),
            Some(Response::SpawnFailure) => Err(CommandError::Spawn {
                program: spec.program().to_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
            None => Ok(CommandOutput::ok("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins_and_calls_are_recorded() {
        let runner = ScriptedRunner::new()
            .on("git", &["rev-parse", "HEAD"], CommandOutput::ok("abc\n"))
            .on("git", &["rev-parse"], CommandOutput::failed(1, ""));

        let head = runner
            .run(&CommandSpec::new("git").args(["rev-parse", "HEAD"]))
            .unwrap();
        assert_eq!(head.stdout_trimmed(), "abc");

        let other = runner
            .run(&CommandSpec::new("git").args(["rev-parse", "FETCH_HEAD"]))
            .unwrap();
        assert!(!other.success());

        let unmatched = runner.run(&CommandSpec::new("gpg")).unwrap();
        assert!(unmatched.success());

        assert_eq!(runner.calls().len(), 3);
        assert_eq!(runner.position("git", &["FETCH_HEAD"]), Some(1));
        assert_eq!(runner.count("git", &["rev-parse"]), 2);
        assert!(!runner.invoked("gpgconf", &[]));
    }

    #[test]
    fn spawn_failure_rule() {
        let runner = ScriptedRunner::new().spawn_fails("gpgconf", &[]);
        let err = runner.run(&CommandSpec::new("gpgconf")).unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
