//! Error types shared by every fontis crate.

use std::path::PathBuf;

/// Malformed caller input. Always raised before anything is mutated.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Branch name does not match `[A-Za-z0-9][A-Za-z0-9/._-]+`.
    #[error("Invalid branch {0}")]
    InvalidBranch(String),

    /// Component directory does not match the restricted path grammar.
    #[error("Invalid repository directory {0}")]
    InvalidComponentDir(String),

    /// Maintainer fingerprint is not 40 hex characters.
    #[error("Invalid maintainer provided: {0}")]
    InvalidFingerprint(String),

    /// Explicit commit is not a full 40 or 64 character hex hash.
    #[error("Invalid commit {0}")]
    InvalidCommit(String),

    /// An explicit maintainer list was combined with trust-all mode.
    #[error("--maintainer cannot be used together with --trust-all-keys")]
    ConflictingTrustSources,

    /// A listed maintainer has no `<fingerprint>.asc` in the keys directory.
    #[error("Cannot find {}", .0.display())]
    MissingKeyFile(PathBuf),

    /// No OpenPGP client was found at any configured location.
    #[error("Cannot find GnuPG or GnuPG-compatible Sequoia Chameleon (tried {})", display_paths(.0))]
    VerifierNotFound(Vec<PathBuf>),

    /// Filesystem preparation of an input directory failed.
    #[error("cannot prepare `{}`: {source}", .path.display())]
    Io {
        /// The directory being prepared.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// A string that should have been a full git object id but is not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectIdError {
    /// Not 40 (SHA-1) or 64 (SHA-256) characters long.
    #[error("Bad Git hash value (wrong length {0}); failing")]
    WrongLength(usize),

    /// Contains something other than lowercase hex.
    #[error("Bad Git hash value (bad character); failing")]
    BadCharacter,
}

/// An external command could not be run or exited unsuccessfully.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The process could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that was attempted.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The process ran and exited with a non-zero status.
    #[error(
        "`{program}` exited with {}\nargs: {args:?}\nstdout: {stdout}\nstderr: {stderr}",
        display_code(.code)
    )]
    Failed {
        /// Program that ran.
        program: String,
        /// Arguments it was given.
        args: Vec<String>,
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
}

#[allow(clippy::ref_option)]
fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| format!("status {c}"))
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_command_reports_args_and_streams() {
        let err = CommandError::Failed {
            program: "git".to_owned(),
            args: vec!["fetch".to_owned(), "-q".to_owned()],
            code: Some(128),
            stdout: String::new(),
            stderr: "fatal: couldn't find remote ref main".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status 128"));
        assert!(msg.contains("args: [\"fetch\", \"-q\"]"));
        assert!(msg.contains("stderr: fatal: couldn't find remote ref main"));
    }

    #[test]
    fn verifier_not_found_lists_candidates() {
        let err = ValidationError::VerifierNotFound(vec![
            PathBuf::from("/usr/bin/gpg-sq"),
            PathBuf::from("/usr/bin/gpg"),
        ]);
        assert!(err.to_string().contains("/usr/bin/gpg-sq, /usr/bin/gpg"));
    }
}
