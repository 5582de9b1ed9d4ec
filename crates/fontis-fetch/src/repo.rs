//! Repository state manager: clone or fetch, without trusting anything.
//!
//! What happens depends on two facts, modelled as [`LocalState`] ×
//! [`RequestedRef`] and reduced to a [`SyncPlan`]:
//!
//! | local state | requested | plan |
//! |-------------|-----------|------|
//! | has `.git` | anything | incremental fetch into `FETCH_HEAD` |
//! | none | commit-shaped | `init` + fetch exact object + soft reset |
//! | none | branch | non-checking single-branch clone |
//!
//! `git clone` cannot target an arbitrary commit, hence the init/fetch path.

use std::fs;
use std::io;
use std::path::Path;

use fontis_core::{BranchName, CommandRunner, CommandSpec, ComponentDir, ExplicitCommit};
use tracing::{info, warn};

use crate::error::FetchError;

/// Whether the component directory already holds a git checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    /// No git metadata (the directory may still exist as stray content).
    NoLocalState,
    /// `.git` exists as a directory.
    HasLocalState,
}

impl LocalState {
    /// Inspect the component directory.
    pub fn detect(dir: &ComponentDir) -> Self {
        if dir.git_dir().is_dir() {
            Self::HasLocalState
        } else {
            Self::NoLocalState
        }
    }
}

/// What the caller asked to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedRef {
    /// The tip of a branch.
    Branch(BranchName),
    /// An exact commit. Takes precedence over any branch.
    Commit(ExplicitCommit),
}

impl RequestedRef {
    /// Choose between an explicit commit and a branch.
    pub fn select(branch: BranchName, commit: Option<ExplicitCommit>) -> Self {
        commit.map_or(Self::Branch(branch), Self::Commit)
    }

    /// The value passed to git on the command line.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Branch(b) => b.as_str(),
            Self::Commit(c) => c.as_str(),
        }
    }

    /// Whether this names an object directly (explicit, or a branch value
    /// that is itself a full hash) rather than a branch tip.
    pub fn is_commit_shaped(&self) -> bool {
        match self {
            Self::Branch(b) => b.looks_like_commit(),
            Self::Commit(_) => true,
        }
    }

    /// Whether the caller supplied an explicit commit.
    pub const fn is_explicit_commit(&self) -> bool {
        matches!(self, Self::Commit(_))
    }
}

/// How to bring the checkout in line with the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPlan {
    /// Fetch tags plus the requested ref into the existing checkout.
    IncrementalFetch,
    /// Initialize an empty repository, fetch the exact object (with
    /// tags), and soft-reset onto it.
    InitAndFetch,
    /// Non-checking clone of the requested branch only.
    CloneBranch,
}

impl SyncPlan {
    /// Decide the plan for a state/request combination.
    pub fn choose(local: LocalState, requested: &RequestedRef) -> Self {
        match (local, requested.is_commit_shaped()) {
            (LocalState::HasLocalState, _) => Self::IncrementalFetch,
            (LocalState::NoLocalState, true) => Self::InitAndFetch,
            (LocalState::NoLocalState, false) => Self::CloneBranch,
        }
    }

    /// Whether this plan creates the checkout from nothing.
    pub const fn is_fresh_clone(self) -> bool {
        !matches!(self, Self::IncrementalFetch)
    }
}

/// Flags shaping the sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Remove the component directory unconditionally first.
    pub clean: bool,
    /// Add `--depth=1` to every fetch and clone.
    pub shallow: bool,
    /// Treat a failed remote fetch as a silent success.
    pub ignore_missing: bool,
}

/// Result of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResult {
    /// The checkout now holds the remote state.
    Synced {
        /// The plan that ran.
        plan: SyncPlan,
    },
    /// The remote fetch failed and `ignore_missing` was set.
    RemoteMissing,
}

/// Materializes the remote into the component directory.
#[derive(Debug, Clone)]
pub struct RepositoryManager {
    git: String,
    url: String,
    dir: ComponentDir,
    options: SyncOptions,
}

impl RepositoryManager {
    /// Bind a manager to one remote and one component directory.
    pub fn new(
        git: impl Into<String>,
        url: impl Into<String>,
        dir: ComponentDir,
        options: SyncOptions,
    ) -> Self {
        Self {
            git: git.into(),
            url: url.into(),
            dir,
            options,
        }
    }

    /// Bring the checkout in line with the remote for `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Remote`] when the remote fetch fails (unless
    /// `ignore_missing`), [`FetchError::Git`] for local git failures, and
    /// [`FetchError::Io`] if the directory cannot be cleaned or created.
    pub fn sync<R: CommandRunner>(
        &self,
        runner: &R,
        requested: &RequestedRef,
    ) -> Result<SyncResult, FetchError> {
        if self.options.clean {
            info!(dir = %self.dir.path().display(), "--> Removing previous sources");
            self.remove_dir()?;
        }

        let plan = SyncPlan::choose(LocalState::detect(&self.dir), requested);
        info!(?plan, reference = requested.as_str(), url = %self.url, "syncing repository");

        match plan {
            SyncPlan::IncrementalFetch => {
                let fetch = self
                    .git_in_dir()
                    .arg("fetch")
                    .args(self.depth())
                    .args(["-q", "--tags", "--", self.url.as_str(), requested.as_str()]);
                if !self.remote(runner, &fetch, requested)? {
                    return Ok(SyncResult::RemoteMissing);
                }
            }
            SyncPlan::InitAndFetch => {
                self.remove_dir()?;
                fs::create_dir_all(self.dir.path()).map_err(|source| self.io_err(source))?;
                runner.run_checked(&self.git_in_dir().arg("init").arg("-q"))?;

                let fetch = self
                    .git_in_dir()
                    .args(["fetch", "--tags"])
                    .args(self.depth())
                    .args(["--", self.url.as_str(), requested.as_str()]);
                if !self.remote_or_remove(runner, &fetch, requested)? {
                    return Ok(SyncResult::RemoteMissing);
                }
                runner.run_checked(
                    &self
                        .git_in_dir()
                        .args(["reset", "-q", "--soft", "FETCH_HEAD"]),
                )?;
            }
            SyncPlan::CloneBranch => {
                self.remove_dir()?;
                let clone = CommandSpec::new(self.git.clone())
                    .arg("clone")
                    .args(self.depth())
                    .args(["-n", "-q", "-b", requested.as_str(), "--", self.url.as_str()])
                    .path_arg(self.dir.path());
                if !self.remote_or_remove(runner, &clone, requested)? {
                    return Ok(SyncResult::RemoteMissing);
                }
            }
        }

        Ok(SyncResult::Synced { plan })
    }

    /// Run a command that talks to the remote. `Ok(false)` means it failed
    /// and `ignore_missing` is set.
    fn remote<R: CommandRunner>(
        &self,
        runner: &R,
        spec: &CommandSpec,
        requested: &RequestedRef,
    ) -> Result<bool, FetchError> {
        match runner.run_checked(spec) {
            Ok(_) => Ok(true),
            Err(source) if self.options.ignore_missing => {
                warn!(
                    url = %self.url,
                    reference = requested.as_str(),
                    error = %source,
                    "remote fetch failed; ignoring as requested"
                );
                Ok(false)
            }
            Err(source) => Err(FetchError::Remote {
                url: self.url.clone(),
                reference: requested.as_str().to_owned(),
                source,
            }),
        }
    }

    /// Like [`Self::remote`], but a failure removes the directory this
    /// sync created.
    fn remote_or_remove<R: CommandRunner>(
        &self,
        runner: &R,
        spec: &CommandSpec,
        requested: &RequestedRef,
    ) -> Result<bool, FetchError> {
        let result = self.remote(runner, spec, requested);
        if !matches!(result, Ok(true)) {
            self.remove_dir()?;
        }
        result
    }

    fn git_in_dir(&self) -> CommandSpec {
        CommandSpec::new(self.git.clone()).current_dir(self.dir.path())
    }

    fn depth(&self) -> Option<&'static str> {
        self.options.shallow.then_some("--depth=1")
    }

    /// Remove the component directory, tolerating its absence.
    pub(crate) fn remove_dir(&self) -> Result<(), FetchError> {
        remove_dir_if_present(self.dir.path()).map_err(|source| self.io_err(source))
    }

    fn io_err(&self, source: io::Error) -> FetchError {
        FetchError::Io {
            path: self.dir.path().to_path_buf(),
            source,
        }
    }
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
