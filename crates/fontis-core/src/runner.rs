//! The external command interface.
//!
//! Every git, gpg, and gpgconf invocation is described by a
//! [`CommandSpec`] and executed through a [`CommandRunner`]. Per-call
//! environment overrides (the verifier's `GNUPGHOME`) travel inside the
//! spec, so nothing ever mutates the process environment and two engines
//! in one process cannot see each other's keyrings.

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::error::CommandError;

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    stdin: Option<String>,
}

impl CommandSpec {
    /// Start describing an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            stdin: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    /// Run inside `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Override one environment variable for this invocation only.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Feed `data` to the process on standard input.
    #[must_use]
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if set.
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Environment overrides in insertion order.
    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Value of one environment override, if present.
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Data fed on stdin, if any.
    pub fn get_stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Whether `needle` occurs as a contiguous run inside the arguments.
    pub fn has_args(&self, needle: &[&str]) -> bool {
        needle.is_empty()
            || self
                .args
                .windows(needle.len())
                .any(|w| w.iter().zip(needle).all(|(a, n)| a == n))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status and captured streams of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl CommandOutput {
    /// A successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A successful exit with the given stderr (where gpg reports status).
    pub fn ok_stderr(stderr: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// A failed exit with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Stdout with surrounding whitespace removed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Runs external commands to completion.
///
/// Implementations must block until the process exits; the engine relies
/// on strictly sequential execution.
pub trait CommandRunner {
    /// Run `spec` and capture its status and output.
    ///
    /// A non-zero exit is **not** an error here; only failure to launch is.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the process could not be started.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Run `spec` and require a zero exit status.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the process could not be started
    /// and [`CommandError::Failed`] (carrying args, stdout, and stderr) if
    /// it exited unsuccessfully.
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = self.run(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(CommandError::Failed {
                program: spec.program().to_owned(),
                args: spec.get_args().to_vec(),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        (**self).run(spec)
    }
}

/// Runs commands as real child processes via `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec, cwd = ?spec.get_current_dir(), "running external command");

        let mut cmd = Command::new(spec.program());
        cmd.args(spec.get_args());
        if let Some(dir) = spec.get_current_dir() {
            cmd.current_dir(dir);
        }
        for (key, value) in spec.get_envs() {
            cmd.env(key, value);
        }
        cmd.stdin(if spec.get_stdin().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let spawn_err = |source| CommandError::Spawn {
            program: spec.program().to_owned(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        if let (Some(data), Some(mut pipe)) = (spec.get_stdin(), child.stdin.take()) {
            // Dropping the pipe at the end of this block closes stdin.
            pipe.write_all(data.as_bytes()).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(code = ?result.code, stdout = %result.stdout, stderr = %result.stderr, "command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builder_and_display() {
        let spec = CommandSpec::new("git")
            .args(["fetch", "-q", "--tags"])
            .arg("--")
            .path_arg(Path::new("/srv/repo"))
            .env("GNUPGHOME", "/keyring")
            .current_dir(Path::new("/work"));

        assert_eq!(spec.to_string(), "git fetch -q --tags -- /srv/repo");
        assert_eq!(spec.get_env("GNUPGHOME"), Some("/keyring"));
        assert_eq!(spec.get_env("HOME"), None);
        assert_eq!(spec.get_current_dir(), Some(Path::new("/work")));
    }

    #[test]
    fn has_args_matches_contiguous_runs_only() {
        let spec = CommandSpec::new("git").args(["tag", "--points-at", "abc"]);
        assert!(spec.has_args(&[]));
        assert!(spec.has_args(&["tag"]));
        assert!(spec.has_args(&["--points-at", "abc"]));
        assert!(!spec.has_args(&["tag", "abc"]));
        assert!(!spec.has_args(&["tag", "--points-at", "abc", "extra"]));
    }

    #[test]
    fn run_checked_reports_failure_details() {
        struct Failing;
        impl CommandRunner for Failing {
            fn run(&self, _spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
                Ok(CommandOutput::failed(128, "fatal: not a git repository"))
            }
        }

        let spec = CommandSpec::new("git").args(["rev-parse", "HEAD"]);
        let err = Failing.run_checked(&spec).unwrap_err();
        match err {
            CommandError::Failed {
                program,
                args,
                code,
                stderr,
                ..
            } => {
                assert_eq!(program, "git");
                assert_eq!(args, vec!["rev-parse", "HEAD"]);
                assert_eq!(code, Some(128));
                assert!(stderr.contains("not a git repository"));
            }
            CommandError::Spawn { .. } => panic!("expected Failed"),
        }
    }

    #[test]
    fn process_runner_reports_missing_binary_as_spawn_error() {
        let spec = CommandSpec::new("fontis-nonexistent-tool-that-should-never-exist");
        let err = ProcessRunner.run(&spec).unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn process_runner_applies_env_cwd_and_stdin() {
        if which::which("sh").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s|' \"$FONTIS_PROBE\"; pwd; cat"])
            .env("FONTIS_PROBE", "isolated")
            .current_dir(dir.path())
            .stdin("from-stdin");

        let out = ProcessRunner.run_checked(&spec).expect("sh should run");
        assert!(out.stdout.starts_with("isolated|"));
        assert!(out.stdout.contains("from-stdin"));
        assert!(
            std::env::var_os("FONTIS_PROBE").is_none(),
            "override must not leak into our own environment"
        );
    }

    #[test]
    fn process_runner_captures_nonzero_exit() {
        if which::which("sh").is_err() {
            return;
        }
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let out = ProcessRunner.run(&spec).expect("sh should spawn");
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }
}
