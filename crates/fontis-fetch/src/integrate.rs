//! Moves the working branch onto a verified revision.
//!
//! Only ever called after verification succeeded. Never rewrites history:
//! an existing branch is switched only when it is an ancestor of the
//! verified revision, and merging is fast-forward only.

use std::path::PathBuf;

use fontis_core::{BranchName, CommandRunner, CommandSpec};
use serde::Serialize;
use tracing::info;

use crate::error::IntegrationError;

/// How the working branch was switched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchSwitch {
    /// An existing local branch was reset onto the revision.
    Existing,
    /// A new local branch was created at the revision.
    New,
}

/// What integration did to the working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationReport {
    /// The branch checked out before integration.
    pub previous_branch: String,
    /// The working branch after integration.
    pub branch: String,
    /// The verified revision.
    pub reference: String,
    /// Branch switch performed, if any.
    pub switched: Option<BranchSwitch>,
    /// Whether a fast-forward merge ran.
    pub merged: bool,
    /// Whether `refs/remotes/origin/<branch>` was moved.
    pub tracking_updated: bool,
    /// Whether submodules were initialized and updated.
    pub submodules: bool,
}

/// Integrates a verified revision into one checkout.
#[derive(Debug, Clone)]
pub struct IntegrationEngine {
    git: String,
    dir: PathBuf,
    branch: BranchName,
}

impl IntegrationEngine {
    /// Bind the engine to a checkout and its working branch.
    pub fn new(git: impl Into<String>, dir: impl Into<PathBuf>, branch: BranchName) -> Self {
        Self {
            git: git.into(),
            dir: dir.into(),
            branch,
        }
    }

    /// Integrate `reference`, which must already be verified.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFastForward`] if the existing branch
    /// is not an ancestor of `reference`, and [`IntegrationError::Git`] if
    /// any git step fails.
    pub fn integrate<R: CommandRunner>(
        &self,
        runner: &R,
        reference: &str,
        fresh_clone: bool,
    ) -> Result<IntegrationReport, IntegrationError> {
        let branch = self.branch.as_str();
        let previous_branch = runner
            .run_checked(&self.git().args(["rev-parse", "--abbrev-ref", "HEAD"]))?
            .stdout_trimmed()
            .to_owned();

        let mut report = IntegrationReport {
            previous_branch,
            branch: branch.to_owned(),
            reference: reference.to_owned(),
            switched: None,
            merged: false,
            tracking_updated: false,
            submodules: false,
        };

        if report.previous_branch != branch || fresh_clone || !self.is_populated() {
            report.switched = Some(self.switch_branch(
                runner,
                &report.previous_branch,
                reference,
                fresh_clone,
            )?);
        }

        if !fresh_clone {
            info!("--> Merging...");
            runner.run_checked(&self.git().args([
                "-c",
                "merge.verifySignatures=no",
                "merge",
                "--ff-only",
                "--commit",
                "-q",
                reference,
            ]))?;
            report.merged = true;

            let tracking = format!("refs/remotes/origin/{branch}");
            if self.ref_exists(runner, &["show-ref", "--verify", "--quiet", &tracking])? {
                runner.run_checked(&self.git().args(["update-ref", "--", &tracking, reference]))?;
                report.tracking_updated = true;
            }
        }

        if self.dir.join(".gitmodules").exists() {
            info!("--> Updating submodules");
            runner.run_checked(&self.git().args(["submodule", "init"]))?;
            runner.run_checked(&self.git().args(["submodule", "update", "--recursive"]))?;
            report.submodules = true;
        }

        Ok(report)
    }

    fn switch_branch<R: CommandRunner>(
        &self,
        runner: &R,
        previous: &str,
        reference: &str,
        fresh_clone: bool,
    ) -> Result<BranchSwitch, IntegrationError> {
        let branch = self.branch.as_str();
        let local = format!("refs/heads/{branch}");

        if !self.ref_exists(runner, &["rev-parse", "-q", "--verify", &local])? {
            info!("--> Switching branch from {previous} branch to new {branch}");
            runner.run_checked(&self.git().args(["checkout", "-q", "-b", branch, reference]))?;
            return Ok(BranchSwitch::New);
        }

        info!("--> Switching branch from {previous} branch to {branch}");
        if !fresh_clone {
            let ancestry = self
                .git()
                .args(["merge-base", "--is-ancestor", branch, reference]);
            let output = runner.run(&ancestry)?;
            match output.code {
                Some(0) => {}
                Some(1) => {
                    return Err(IntegrationError::NotFastForward {
                        branch: branch.to_owned(),
                        reference: reference.to_owned(),
                    });
                }
                _ => {
                    runner.run_checked(&ancestry)?;
                }
            }
        }
        runner.run_checked(&self.git().args(["checkout", "-q", "-B", branch, reference]))?;
        Ok(BranchSwitch::Existing)
    }

    /// Whether git ever wrote an index for this checkout. `clone -n` and
    /// `reset --soft` leave it unborn, and a later `checkout` then does an
    /// initial checkout that fills the working tree.
    fn is_populated(&self) -> bool {
        self.dir.join(".git").join("index").is_file()
    }

    /// Run a git query whose exit status answers a yes/no question.
    fn ref_exists<R: CommandRunner>(
        &self,
        runner: &R,
        query: &[&str],
    ) -> Result<bool, IntegrationError> {
        Ok(runner.run(&self.git().args(query.iter().copied()))?.success())
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new(self.git.clone()).current_dir(&self.dir)
    }
}
