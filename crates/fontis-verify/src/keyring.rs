//! Isolated per-component keyrings.
//!
//! Each component gets its own OpenPGP home directory. It is passed to
//! every gpg, gpgconf, and git-verify invocation as `GNUPGHOME` through
//! the command spec, never through the process environment, so the
//! caller's own keyring is never read and two components never share
//! trust state.

use std::fs;
use std::path::{Path, PathBuf};

use fontis_core::{CommandRunner, CommandSpec, Fingerprint, ValidationError};
use tracing::{debug, info};

use crate::error::VerificationError;

/// Environment variable naming the OpenPGP client's home directory.
pub const CREDENTIAL_HOME_VAR: &str = "GNUPGHOME";

/// Ownertrust value written for every trusted key (6 = ultimate).
const OWNERTRUST_ULTIMATE: u8 = 6;

/// The OpenPGP client binary git and the keyring use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgClient {
    program: PathBuf,
}

impl GpgClient {
    /// Use a specific client binary.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Pick the first candidate that exists on disk.
    ///
    /// Candidates are tried in order, so list the Sequoia chameleon
    /// (`gpg-sq`) before classic `gpg` to prefer it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::VerifierNotFound`] if none exists.
    pub fn discover(candidates: &[PathBuf]) -> Result<Self, ValidationError> {
        candidates
            .iter()
            .find(|c| c.exists())
            .map(|c| {
                debug!(client = %c.display(), "selected OpenPGP client");
                Self::new(c.clone())
            })
            .ok_or_else(|| ValidationError::VerifierNotFound(candidates.to_vec()))
    }

    /// Path of the client binary.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Which keys a keyring should trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSource {
    /// Only these maintainers, each backed by `<fingerprint>.asc`.
    Maintainers(Vec<Fingerprint>),
    /// Every key file found in the keys directory (insecure).
    AllKeys,
}

impl TrustSource {
    /// Build the trust source from the two mutually exclusive flags.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ConflictingTrustSources`] when both an
    /// explicit maintainer list and trust-all are requested.
    pub fn from_flags(
        maintainers: Vec<Fingerprint>,
        trust_all_keys: bool,
    ) -> Result<Self, ValidationError> {
        match (trust_all_keys, maintainers.is_empty()) {
            (true, false) => Err(ValidationError::ConflictingTrustSources),
            (true, true) => Ok(Self::AllKeys),
            (false, _) => Ok(Self::Maintainers(maintainers)),
        }
    }

    /// Check that every listed maintainer has a key file in `keys_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingKeyFile`] for the first missing file.
    pub fn check_key_files(&self, keys_dir: &Path) -> Result<(), ValidationError> {
        if let Self::Maintainers(maintainers) = self {
            for fpr in maintainers {
                let path = keys_dir.join(fpr.key_file_name());
                if !path.is_file() {
                    return Err(ValidationError::MissingKeyFile(path));
                }
            }
        }
        Ok(())
    }
}

/// A component-private OpenPGP home directory.
#[derive(Debug, Clone)]
pub struct Keyring {
    dir: PathBuf,
    gpg: GpgClient,
    gpgconf: String,
}

impl Keyring {
    /// Describe a keyring rooted at `dir`. Nothing touches disk yet.
    pub fn new(dir: impl Into<PathBuf>, gpg: GpgClient, gpgconf: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            gpg,
            gpgconf: gpgconf.into(),
        }
    }

    /// The keyring directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The OpenPGP client bound to this keyring.
    pub const fn gpg(&self) -> &GpgClient {
        &self.gpg
    }

    /// Point `spec` at this keyring.
    #[must_use]
    pub fn bind(&self, spec: CommandSpec) -> CommandSpec {
        spec.env(CREDENTIAL_HOME_VAR, self.dir.display().to_string())
    }

    fn gpg_command(&self) -> CommandSpec {
        self.bind(CommandSpec::new(self.gpg.program().display().to_string()))
    }

    /// Create the directory (with parents) and restrict it to its owner.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Io`] if the directory cannot be created
    /// or its permissions cannot be set.
    pub fn prepare(&self) -> Result<(), ValidationError> {
        let io_err = |source| ValidationError::Io {
            path: self.dir.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        restrict_to_owner(&self.dir).map_err(io_err)?;
        Ok(())
    }

    /// Prepare the keyring, import and trust keys per `source`, and
    /// restart the agent so the new trust takes effect.
    ///
    /// Returns the fingerprints that were marked trusted.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::Validation`] for a missing key file or
    /// unusable directory, and [`VerificationError::Command`] if any gpg
    /// step fails.
    pub fn populate<R: CommandRunner>(
        &self,
        runner: &R,
        keys_dir: &Path,
        source: &TrustSource,
    ) -> Result<Vec<Fingerprint>, VerificationError> {
        source.check_key_files(keys_dir)?;
        self.prepare()?;

        // A fresh home is only initialized by a listing, not by the
        // first import.
        runner.run_checked(&self.gpg_command().arg("--list-keys"))?;

        let trusted = match source {
            TrustSource::AllKeys => {
                for file in key_files(keys_dir)? {
                    self.import(runner, &file)?;
                }
                let fingerprints = self.list_fingerprints(runner)?;
                for fpr in &fingerprints {
                    self.trust(runner, fpr)?;
                }
                fingerprints
            }
            TrustSource::Maintainers(maintainers) => {
                for fpr in maintainers {
                    self.import(runner, &keys_dir.join(fpr.key_file_name()))?;
                    self.trust(runner, fpr)?;
                }
                maintainers.clone()
            }
        };

        self.restart_agent(runner)?;
        info!(
            keyring = %self.dir.display(),
            trusted = trusted.len(),
            "keyring populated"
        );
        Ok(trusted)
    }

    fn import<R: CommandRunner>(&self, runner: &R, file: &Path) -> Result<(), VerificationError> {
        debug!(file = %file.display(), "importing key");
        runner.run_checked(&self.gpg_command().arg("--import").path_arg(file))?;
        Ok(())
    }

    fn trust<R: CommandRunner>(
        &self,
        runner: &R,
        fpr: &Fingerprint,
    ) -> Result<(), VerificationError> {
        runner.run_checked(
            &self
                .gpg_command()
                .arg("--import-ownertrust")
                .stdin(format!("{fpr}:{OWNERTRUST_ULTIMATE}:\n")),
        )?;
        Ok(())
    }

    fn list_fingerprints<R: CommandRunner>(
        &self,
        runner: &R,
    ) -> Result<Vec<Fingerprint>, VerificationError> {
        let out = runner.run_checked(&self.gpg_command().args(["--list-keys", "--with-colons"]))?;
        Ok(parse_colon_fingerprints(&out.stdout))
    }

    fn restart_agent<R: CommandRunner>(&self, runner: &R) -> Result<(), VerificationError> {
        runner.run_checked(
            &self.bind(CommandSpec::new(self.gpgconf.clone()).args(["--kill", "gpg-agent"])),
        )?;
        Ok(())
    }
}

/// Extract fingerprints from `--with-colons` output: field 10 of every
/// `fpr:` record. Records without a valid 40-hex value are skipped.
pub fn parse_colon_fingerprints(listing: &str) -> Vec<Fingerprint> {
    listing
        .lines()
        .filter(|line| line.starts_with("fpr:"))
        .filter_map(|line| line.split(':').nth(9))
        .filter_map(|field| Fingerprint::parse(field).ok())
        .collect()
}

/// Regular files directly inside `keys_dir`, sorted for determinism.
fn key_files(keys_dir: &Path) -> Result<Vec<PathBuf>, ValidationError> {
    let io_err = |source| ValidationError::Io {
        path: keys_dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(keys_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(unix)]
fn restrict_to_owner(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_to_owner(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
