//! Picks the single revision that will be verified.

use std::fs;
use std::io;
use std::path::PathBuf;

use fontis_core::{CommandRunner, CommandSpec};
use tracing::{debug, info};

use crate::error::FetchError;

/// Prefix that marks a tag as a release version.
pub const VERSION_TAG_PREFIX: &str = "v";

/// Outcome of resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The full commit hash to verify.
    Reference(String),
    /// Versions-only mode found no version tag. Nothing was verified.
    NoVersionTag,
}

/// Resolves the fetched state of one checkout to a commit hash.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    git: String,
    dir: PathBuf,
}

impl ReferenceResolver {
    /// Bind a resolver to a checkout.
    pub fn new(git: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            dir: dir.into(),
        }
    }

    /// Resolve the revision to verify.
    ///
    /// An existing checkout resolves `FETCH_HEAD`; a fresh one resolves
    /// `HEAD`. With `versions_only`, an existing checkout requires a `v*`
    /// tag pointing exactly at the fetched commit (otherwise `FETCH_HEAD`
    /// is discarded), and a fresh one resolves its nearest `v*` tag.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unresolvable`] if git cannot name a commit,
    /// [`FetchError::Git`] if tag listing fails, and [`FetchError::Io`] if
    /// `FETCH_HEAD` cannot be removed.
    pub fn resolve<R: CommandRunner>(
        &self,
        runner: &R,
        fresh_clone: bool,
        versions_only: bool,
    ) -> Result<Resolution, FetchError> {
        if fresh_clone {
            let target = if versions_only {
                match self.nearest_version_tag(runner)? {
                    Some(tag) => format!("{tag}^{{commit}}"),
                    None => return Ok(Resolution::NoVersionTag),
                }
            } else {
                "HEAD".to_owned()
            };
            return self.rev_parse(runner, &target).map(Resolution::Reference);
        }

        let rev = self.rev_parse(runner, "FETCH_HEAD^{commit}")?;
        if versions_only {
            let tags = self.version_tags_at(runner, &rev)?;
            if tags.is_empty() {
                self.discard_fetch_head()?;
                return Ok(Resolution::NoVersionTag);
            }
            debug!(?tags, commit = %rev, "version tags point at fetched commit");
        }
        Ok(Resolution::Reference(rev))
    }

    /// `git rev-parse -q --verify <rev>`; an unknown or empty result is
    /// [`FetchError::Unresolvable`].
    ///
    /// # Errors
    ///
    /// See [`ReferenceResolver::resolve`].
    pub fn rev_parse<R: CommandRunner>(&self, runner: &R, rev: &str) -> Result<String, FetchError> {
        let output = runner.run(&self.git().args(["rev-parse", "-q", "--verify", rev]))?;
        let hash = output.stdout_trimmed();
        if !output.success() || hash.is_empty() {
            debug!(rev, code = ?output.code, "rev-parse did not name a commit");
            return Err(FetchError::Unresolvable);
        }
        Ok(hash.to_owned())
    }

    /// Names of `v*` tags pointing exactly at `rev`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Git`] if the listing fails.
    pub fn version_tags_at<R: CommandRunner>(
        &self,
        runner: &R,
        rev: &str,
    ) -> Result<Vec<String>, FetchError> {
        let output = runner.run_checked(&self.git().args(["tag", "--points-at", rev]))?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|tag| tag.starts_with(VERSION_TAG_PREFIX))
            .map(str::to_owned)
            .collect())
    }

    /// Nearest `v*` tag reachable from `HEAD`, if any.
    ///
    /// # Errors
    ///
    /// Only a failure to launch git is an error; `describe` finding
    /// nothing yields `None`.
    pub fn nearest_version_tag<R: CommandRunner>(
        &self,
        runner: &R,
    ) -> Result<Option<String>, FetchError> {
        let output = runner.run(&self.git().args([
            "describe",
            "--match=v*",
            "--abbrev=0",
            "HEAD",
        ]))?;
        let tag = output.stdout_trimmed();
        Ok((output.success() && tag.starts_with(VERSION_TAG_PREFIX)).then(|| tag.to_owned()))
    }

    fn discard_fetch_head(&self) -> Result<(), FetchError> {
        let path = self.dir.join(".git").join("FETCH_HEAD");
        info!("No version tag.");
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(FetchError::Io { path, source: e }),
            _ => Ok(()),
        }
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new(self.git.clone()).current_dir(&self.dir)
    }
}
