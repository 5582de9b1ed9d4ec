//! Single-object signature verification.

use std::fmt;
use std::path::{Path, PathBuf};

use fontis_core::{CommandError, CommandRunner, CommandSpec, Fingerprint};
use tracing::{debug, warn};

use crate::keyring::Keyring;
use crate::status::StatusReport;

/// Kind of git object that carries a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// An annotated tag object.
    Tag,
    /// A commit object.
    Commit,
}

impl ObjectKind {
    /// The git subcommand suffix (`verify-tag` / `verify-commit`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verifies git objects in one repository against one keyring.
#[derive(Debug, Clone)]
pub struct ProvenanceVerifier {
    git: String,
    repo: PathBuf,
    keyring: Keyring,
}

impl ProvenanceVerifier {
    /// Bind a verifier to a checkout and its component keyring.
    pub fn new(git: impl Into<String>, repo: impl Into<PathBuf>, keyring: Keyring) -> Self {
        Self {
            git: git.into(),
            repo: repo.into(),
            keyring,
        }
    }

    /// The checkout being verified.
    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// The git program used for object enumeration and verification.
    pub fn git(&self) -> &str {
        &self.git
    }

    /// Build the `git verify-<kind> --raw` invocation for `object`.
    pub fn command(&self, kind: ObjectKind, object: &str) -> CommandSpec {
        let spec = CommandSpec::new(self.git.clone())
            .arg("-c")
            .arg(format!("gpg.program={}", self.keyring.gpg().program().display()))
            .args(["-c", "gpg.minTrustLevel=fully"])
            .arg(format!("verify-{kind}"))
            .args(["--raw", "--", object])
            .current_dir(&self.repo);
        self.keyring.bind(spec)
    }

    /// Verify one object and return its trusted signer, if any.
    ///
    /// A verifier that exits non-zero (bad signature, untrusted key,
    /// unsigned object) is logged and reported as `Ok(None)`: absence of
    /// a key is for the caller to judge.
    ///
    /// # Errors
    ///
    /// Only a failure to launch git at all is an error.
    pub fn verify<R: CommandRunner>(
        &self,
        runner: &R,
        kind: ObjectKind,
        object: &str,
    ) -> Result<Option<Fingerprint>, CommandError> {
        let output = runner.run(&self.command(kind, object))?;
        if !output.success() {
            warn!(
                %kind,
                object,
                code = ?output.code,
                stderr = %output.stderr,
                "signature verification command failed"
            );
            return Ok(None);
        }

        let report = StatusReport::parse(&output.stderr);
        let signer = report.trusted_signer().cloned();
        debug!(
            %kind,
            object,
            new_signatures = report.new_signatures,
            trust = ?report.trust,
            signer = ?signer.as_ref().map(Fingerprint::as_str),
            "interpreted verifier status"
        );
        Ok(signer)
    }
}
