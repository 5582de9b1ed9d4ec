//! The top-level fetch-and-verify pipeline.
//!
//! [`SourceFetcher::run`] validates every input, syncs the checkout,
//! resolves one revision, verifies it, and only then integrates it. No
//! git command runs before validation is complete, and nothing touches
//! the working branch before verification has passed.

use std::path::PathBuf;

use fontis_core::{
    BranchName, CommandRunner, ComponentDir, ExplicitCommit, Fingerprint, ValidationError,
};
use fontis_verify::quorum::DEFAULT_MAX_TAG_LISTING_BYTES;
use fontis_verify::{
    GpgClient, Keyring, ProvenanceVerifier, QuorumConfig, QuorumEvaluator, QuorumOutcome,
    SignaturePolicy, TrustSource,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::integrate::{IntegrationEngine, IntegrationReport};
use crate::repo::{RepositoryManager, RequestedRef, SyncOptions, SyncResult};
use crate::resolve::{ReferenceResolver, Resolution};

/// Everything one invocation asks for, as supplied by the caller.
///
/// Values are raw strings; [`SourceFetcher::run`] validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Remote to fetch from.
    pub url: String,
    /// Absolute path of the component checkout.
    pub component_dir: String,
    /// Directory holding the component's private keyring.
    pub keyring_dir: PathBuf,
    /// Directory holding `<fingerprint>.asc` key files.
    pub keys_dir: PathBuf,
    /// Branch to fetch and integrate into.
    pub branch: String,
    /// Exact commit to fetch instead of the branch tip.
    pub commit: Option<String>,
    /// Remove the checkout before fetching.
    pub clean: bool,
    /// Fetch with `--depth=1`.
    pub shallow: bool,
    /// Verify but do not integrate.
    pub fetch_only: bool,
    /// Only accept revisions carrying a `v*` tag.
    pub versions_only: bool,
    /// Treat a missing remote ref as success.
    pub ignore_missing: bool,
    /// Skip verification entirely.
    pub insecure_skip_checking: bool,
    /// Accept a signed commit when no tag points at it.
    pub less_secure_signed_commits_sufficient: bool,
    /// Fingerprints of trusted maintainers.
    pub maintainers: Vec<String>,
    /// Trust every key in `keys_dir`.
    pub trust_all_keys: bool,
    /// Minimum number of distinct trusted tag signers.
    pub minimum_distinct_maintainers: usize,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            component_dir: String::new(),
            keyring_dir: PathBuf::new(),
            keys_dir: PathBuf::new(),
            branch: "main".to_owned(),
            commit: None,
            clean: false,
            shallow: false,
            fetch_only: false,
            versions_only: false,
            ignore_missing: false,
            insecure_skip_checking: false,
            less_secure_signed_commits_sufficient: false,
            maintainers: Vec::new(),
            trust_all_keys: false,
            minimum_distinct_maintainers: 1,
        }
    }
}

/// Locations of the external tools the engine drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooling {
    /// git binary.
    pub git: String,
    /// OpenPGP clients to try, in order of preference.
    pub gpg_candidates: Vec<PathBuf>,
    /// gpgconf binary, used to restart the agent.
    pub gpgconf: String,
    /// Cap on the tag listing parsed per revision.
    pub max_tag_listing_bytes: usize,
}

impl Default for Tooling {
    fn default() -> Self {
        Self {
            git: "git".to_owned(),
            gpg_candidates: vec![
                PathBuf::from("/usr/bin/gpg-sq"),
                PathBuf::from("/usr/bin/gpg"),
            ],
            gpgconf: "gpgconf".to_owned(),
            max_tag_listing_bytes: DEFAULT_MAX_TAG_LISTING_BYTES,
        }
    }
}

/// How an invocation ended. Every variant is a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The working branch now sits at the verified revision.
    Integrated {
        /// Verified revision.
        reference: String,
        /// Working branch.
        branch: String,
        /// Why the revision was accepted; `None` when checking was skipped.
        verification: Option<QuorumOutcome>,
        /// What integration did.
        integration: IntegrationReport,
    },
    /// Verified, but integration was not requested.
    FetchedOnly {
        /// Verified revision.
        reference: String,
        /// Why the revision was accepted; `None` when checking was skipped.
        verification: Option<QuorumOutcome>,
    },
    /// The remote ref does not exist and missing refs are tolerated.
    RemoteMissing,
    /// Versions-only mode found no version tag.
    NoVersionTag,
}

/// Inputs after validation.
#[derive(Debug)]
struct Validated {
    dir: ComponentDir,
    branch: BranchName,
    requested: RequestedRef,
    versions_only: bool,
    trust: Option<(GpgClient, TrustSource)>,
}

/// Runs the pipeline for one component through a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct SourceFetcher<R> {
    runner: R,
    tooling: Tooling,
}

impl<R: CommandRunner> SourceFetcher<R> {
    /// Build an engine over a command runner and tool locations.
    pub const fn new(runner: R, tooling: Tooling) -> Self {
        Self { runner, tooling }
    }

    /// The command runner.
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Fetch, verify, and integrate per `request`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] in the category of the failing stage.
    pub fn run(&self, request: &FetchRequest) -> Result<FetchOutcome, EngineError> {
        let validated = self.validate(request)?;
        let dir = &validated.dir;
        let git = self.tooling.git.as_str();

        let manager = RepositoryManager::new(
            git,
            request.url.clone(),
            dir.clone(),
            SyncOptions {
                clean: request.clean,
                shallow: request.shallow,
                ignore_missing: request.ignore_missing,
            },
        );
        let fresh_clone = match manager.sync(&self.runner, &validated.requested)? {
            SyncResult::RemoteMissing => return Ok(FetchOutcome::RemoteMissing),
            SyncResult::Synced { plan } => plan.is_fresh_clone(),
        };

        let resolver = ReferenceResolver::new(git, dir.path());
        let reference =
            match resolver.resolve(&self.runner, fresh_clone, validated.versions_only)? {
                Resolution::Reference(reference) => reference,
                Resolution::NoVersionTag => {
                    if fresh_clone {
                        manager.remove_dir()?;
                    }
                    return Ok(FetchOutcome::NoVersionTag);
                }
            };

        let verification = match &validated.trust {
            None => {
                warn!(reference = %reference, "--> NOT verifying tags");
                None
            }
            Some((gpg, source)) => Some(
                self.verify(request, dir, gpg, source, &reference)
                    .map_err(|err| abandon(&manager, fresh_clone, err))?,
            ),
        };

        if request.fetch_only {
            return Ok(FetchOutcome::FetchedOnly {
                reference,
                verification,
            });
        }

        let integration = IntegrationEngine::new(git, dir.path(), validated.branch.clone())
            .integrate(&self.runner, &reference, fresh_clone)
            .map_err(|err| abandon(&manager, fresh_clone, err.into()))?;
        info!(
            branch = %validated.branch,
            reference = %reference,
            "component sources integrated"
        );
        Ok(FetchOutcome::Integrated {
            reference,
            branch: validated.branch.as_str().to_owned(),
            verification,
            integration,
        })
    }

    /// Check every input before anything is launched or mutated.
    fn validate(&self, request: &FetchRequest) -> Result<Validated, ValidationError> {
        let branch = BranchName::parse(&request.branch)?;
        let dir = ComponentDir::parse(&request.component_dir)?;
        let commit = request
            .commit
            .as_deref()
            .map(ExplicitCommit::parse)
            .transpose()?;
        let maintainers = request
            .maintainers
            .iter()
            .map(|m| Fingerprint::parse(m))
            .collect::<Result<Vec<_>, _>>()?;
        let source = TrustSource::from_flags(maintainers, request.trust_all_keys)?;

        let trust = if request.insecure_skip_checking {
            None
        } else {
            let gpg = GpgClient::discover(&self.tooling.gpg_candidates)?;
            source.check_key_files(&request.keys_dir)?;
            Some((gpg, source))
        };

        let requested = RequestedRef::select(branch.clone(), commit);
        Ok(Validated {
            versions_only: request.versions_only && !requested.is_explicit_commit(),
            dir,
            branch,
            requested,
            trust,
        })
    }

    fn verify(
        &self,
        request: &FetchRequest,
        dir: &ComponentDir,
        gpg: &GpgClient,
        source: &TrustSource,
        reference: &str,
    ) -> Result<QuorumOutcome, EngineError> {
        let policy = if request.less_secure_signed_commits_sufficient {
            info!("--> Verifying tags or commits...");
            SignaturePolicy::SignedTagOrCommit
        } else {
            info!("--> Verifying tags...");
            SignaturePolicy::SignedTag
        };

        let keyring = Keyring::new(
            request.keyring_dir.clone(),
            gpg.clone(),
            self.tooling.gpgconf.clone(),
        );
        keyring.populate(&self.runner, &request.keys_dir, source)?;

        let verifier = ProvenanceVerifier::new(self.tooling.git.clone(), dir.path(), keyring);
        let config = QuorumConfig {
            minimum_distinct_maintainers: request.minimum_distinct_maintainers,
            policy,
            max_tag_listing_bytes: self.tooling.max_tag_listing_bytes,
        };
        Ok(QuorumEvaluator::new(config, verifier).evaluate(&self.runner, reference)?)
    }
}

/// Remove a checkout this run created before surfacing `err`, so a failed
/// first run leaves no half-initialized directory behind.
fn abandon(manager: &RepositoryManager, fresh_clone: bool, err: EngineError) -> EngineError {
    if fresh_clone {
        if let Err(cleanup) = manager.remove_dir() {
            warn!(error = %cleanup, "could not remove unverified checkout");
        }
    }
    err
}
