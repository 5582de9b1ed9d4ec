//! Fetch, verify, and integrate one component.

use std::path::{self, PathBuf};

use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use fontis_core::ProcessRunner;
use fontis_fetch::{BranchSwitch, FetchOutcome, FetchRequest, SourceFetcher, Tooling};
use fontis_verify::QuorumOutcome;

/// Arguments for one component fetch.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// The repository to clone from.
    pub component_repository: String,

    /// Absolute path of the component checkout to create or update.
    pub component_directory: String,

    /// Directory for the component's private keyring.
    #[arg(value_name = "GIT_KEYRING_DIR")]
    pub git_keyring_dir: PathBuf,

    /// Directory holding ASCII-armored `<fingerprint>.asc` key files.
    #[arg(value_name = "KEYS_DIR")]
    pub keys_dir: PathBuf,

    /// Branch to fetch and integrate into.
    #[arg(long, default_value = "main")]
    pub git_branch: String,

    /// Exact commit (full hash) to fetch. Takes precedence over the branch
    /// and bypasses --fetch-versions-only.
    #[arg(long, value_name = "HASH")]
    pub git_commit: Option<String>,

    /// Remove previous sources before fetching.
    #[arg(long)]
    pub clean: bool,

    /// Fetch with --depth=1 to reduce the amount of data.
    #[arg(long)]
    pub shallow_clone: bool,

    /// Fetch and verify but do not merge.
    #[arg(long)]
    pub fetch_only: bool,

    /// Only accept revisions carrying a version (`v*`) tag.
    #[arg(long)]
    pub fetch_versions_only: bool,

    /// Exit successfully if the remote branch or commit does not exist.
    #[arg(long)]
    pub ignore_missing: bool,

    /// Disable signature checking entirely.
    #[arg(long)]
    pub insecure_skip_checking: bool,

    /// Accept a signed commit when no signed tag points at it. Less secure:
    /// only reviewed commits get tagged.
    #[arg(long)]
    pub less_secure_signed_commits_sufficient: bool,

    /// Trusted maintainer fingerprint, expected as `<fingerprint>.asc` in
    /// KEYS_DIR. Repeatable.
    #[arg(long = "maintainer", value_name = "FINGERPRINT")]
    pub maintainers: Vec<String>,

    /// Import and trust every key in KEYS_DIR. Conflicts with --maintainer.
    #[arg(long)]
    pub trust_all_keys: bool,

    /// Minimum number of distinct maintainer tag signatures.
    #[arg(long, default_value_t = 1)]
    pub minimum_distinct_maintainers: usize,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

impl FetchArgs {
    /// Assemble the engine request. Keyring and keys directories are made
    /// absolute; the component directory is passed through for validation.
    pub fn into_request(self) -> Result<FetchRequest> {
        let keyring_dir = path::absolute(&self.git_keyring_dir).wrap_err_with(|| {
            format!("invalid keyring directory {}", self.git_keyring_dir.display())
        })?;
        let keys_dir = path::absolute(&self.keys_dir)
            .wrap_err_with(|| format!("invalid keys directory {}", self.keys_dir.display()))?;
        Ok(FetchRequest {
            url: self.component_repository,
            component_dir: self.component_directory,
            keyring_dir,
            keys_dir,
            branch: self.git_branch,
            commit: self.git_commit,
            clean: self.clean,
            shallow: self.shallow_clone,
            fetch_only: self.fetch_only,
            versions_only: self.fetch_versions_only,
            ignore_missing: self.ignore_missing,
            insecure_skip_checking: self.insecure_skip_checking,
            less_secure_signed_commits_sufficient: self.less_secure_signed_commits_sufficient,
            maintainers: self.maintainers,
            trust_all_keys: self.trust_all_keys,
            minimum_distinct_maintainers: self.minimum_distinct_maintainers,
        })
    }
}

/// Execute the fetch.
pub fn execute(args: FetchArgs, tooling: Tooling) -> Result<()> {
    let json = args.json;
    let request = args.into_request()?;
    let outcome = SourceFetcher::new(ProcessRunner, tooling).run(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in render(&outcome) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Human-readable lines for an outcome.
fn render(outcome: &FetchOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        FetchOutcome::Integrated {
            reference,
            branch,
            verification,
            integration,
        } => {
            render_verification(&mut lines, reference, verification.as_ref());
            if let Some(switch) = integration.switched {
                let new = match switch {
                    BranchSwitch::Existing => "",
                    BranchSwitch::New => "new ",
                };
                lines.push(format!(
                    "--> Switched branch from {} to {new}{branch}",
                    integration.previous_branch
                ));
            }
            if integration.submodules {
                lines.push("--> Updated submodules".to_owned());
            }
            lines.push(format!("--> {branch} is at {reference}"));
        }
        FetchOutcome::FetchedOnly {
            reference,
            verification,
        } => {
            render_verification(&mut lines, reference, verification.as_ref());
            lines.push(format!("--> Fetched {reference} (not merged)"));
        }
        FetchOutcome::RemoteMissing => {
            lines.push("--> Remote reference not found, nothing fetched".to_owned());
        }
        FetchOutcome::NoVersionTag => lines.push("No version tag.".to_owned()),
    }
    lines
}

fn render_verification(
    lines: &mut Vec<String>,
    reference: &str,
    verification: Option<&QuorumOutcome>,
) {
    match verification {
        None => lines.push("--> NOT verifying tags".to_owned()),
        Some(QuorumOutcome::SignedTags {
            signers,
            tags,
            required,
        }) => {
            lines.extend(tags.iter().map(ToString::to_string));
            lines.push(format!(
                "Enough distinct tag signatures. Found {}, mandatory minimum is {required}.",
                signers.len()
            ));
        }
        Some(QuorumOutcome::SignedCommit { signer }) => {
            lines.push(format!("---> No tag pointing at {reference}"));
            lines.push(format!(
                "---> {reference} does not have a signed tag. However, it is signed by a trusted key ({signer}). Accepting it anyway."
            ));
        }
    }
}
