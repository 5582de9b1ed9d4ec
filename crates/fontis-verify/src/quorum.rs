//! Maintainer quorum over signed tags, with a signed-commit fallback.

use std::collections::BTreeSet;
use std::fmt;

use fontis_core::{CommandRunner, CommandSpec, Fingerprint, ObjectId};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::VerificationError;
use crate::verifier::{ObjectKind, ProvenanceVerifier};

/// `git tag --format` emitting `<tag-object>:<target>:` for annotated tags.
///
/// The `%(if)` skips lightweight tags, which have no object to sign. The
/// trailing colon exposes a truncated record, and the separators tell a
/// SHA-1 apart from a truncated SHA-256.
pub const TAG_LISTING_FORMAT: &str =
    "%(if:equals=tag)%(objecttype)%(then)%(objectname):%(object):%(end)";

/// Default cap on how much of the tag listing is parsed.
pub const DEFAULT_MAX_TAG_LISTING_BYTES: usize = 500;

/// What a revision without any tag needs in order to be accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignaturePolicy {
    /// Only signed tags count. A signed but untagged commit is rejected.
    #[default]
    SignedTag,
    /// A trusted signature on the commit itself is enough when untagged.
    SignedTagOrCommit,
}

/// Quorum settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumConfig {
    /// Minimum number of distinct trusted tag signers.
    pub minimum_distinct_maintainers: usize,
    /// Fallback policy for untagged revisions.
    pub policy: SignaturePolicy,
    /// Cap applied to the raw tag listing before parsing.
    pub max_tag_listing_bytes: usize,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            minimum_distinct_maintainers: 1,
            policy: SignaturePolicy::default(),
            max_tag_listing_bytes: DEFAULT_MAX_TAG_LISTING_BYTES,
        }
    }
}

/// Result of verifying one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagVerdict {
    /// Tag object id.
    pub tag: ObjectId,
    /// Trusted signer, if the signature held.
    pub signer: Option<Fingerprint>,
}

impl fmt::Display for TagVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.signer.is_some() { "Good" } else { "Invalid" };
        write!(f, "---> {status} tag {}.", self.tag)
    }
}

/// Why a revision was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuorumOutcome {
    /// Enough distinct maintainers signed tags pointing at the revision.
    SignedTags {
        /// Distinct trusted signers.
        signers: BTreeSet<Fingerprint>,
        /// Every tag checked, signed or not.
        tags: Vec<TagVerdict>,
        /// The configured minimum.
        required: usize,
    },
    /// No tag exists; the commit's own signature was accepted.
    SignedCommit {
        /// The commit's trusted signer.
        signer: Fingerprint,
    },
}

/// Cut `listing` to at most `max` bytes on a character boundary.
pub fn cap_listing(listing: &str, max: usize) -> &str {
    if listing.len() <= max {
        return listing;
    }
    let mut end = max;
    while !listing.is_char_boundary(end) {
        end -= 1;
    }
    &listing[..end]
}

/// Parse a tag listing produced with [`TAG_LISTING_FORMAT`] into the
/// annotated tag objects pointing at `expected`.
///
/// Every record must be exactly `<hash>:<expected>:`. A record of the
/// wrong size or with a different target fails the whole listing; no
/// record is ever skipped.
///
/// # Errors
///
/// Returns [`VerificationError::MalformedTagRecord`],
/// [`VerificationError::TagHashMismatch`], or
/// [`VerificationError::MalformedHash`].
pub fn parse_tag_listing(
    listing: &str,
    expected: &ObjectId,
) -> Result<Vec<ObjectId>, VerificationError> {
    let hash_len = expected.hex_len();
    let suffix = format!(":{expected}:");

    listing
        .split_whitespace()
        .map(|record| {
            if !record.is_ascii() || record.len() != hash_len * 2 + 2 {
                return Err(VerificationError::MalformedTagRecord {
                    record: record.to_owned(),
                });
            }
            let (tag, rest) = record.split_at(hash_len);
            if rest != suffix {
                return Err(VerificationError::TagHashMismatch {
                    found: rest.trim_matches(':').to_owned(),
                    expected: expected.clone(),
                });
            }
            Ok(ObjectId::parse(tag)?)
        })
        .collect()
}

/// Decides whether a resolved revision is authorized.
#[derive(Debug, Clone)]
pub struct QuorumEvaluator {
    config: QuorumConfig,
    verifier: ProvenanceVerifier,
}

impl QuorumEvaluator {
    /// Combine quorum settings with a verifier bound to the checkout.
    pub const fn new(config: QuorumConfig, verifier: ProvenanceVerifier) -> Self {
        Self { config, verifier }
    }

    /// Evaluate `reference`, the raw hash printed by `git rev-parse`.
    ///
    /// The hash format is validated before any tag is listed or any
    /// signature is checked.
    ///
    /// # Errors
    ///
    /// Any [`VerificationError`]; all are fatal.
    pub fn evaluate<R: CommandRunner>(
        &self,
        runner: &R,
        reference: &str,
    ) -> Result<QuorumOutcome, VerificationError> {
        let expected = ObjectId::parse(reference)?;
        let tag_objects = self.list_tags(runner, &expected)?;

        if tag_objects.is_empty() {
            return self.evaluate_untagged(runner, expected);
        }

        let mut signers = BTreeSet::new();
        let mut tags = Vec::with_capacity(tag_objects.len());
        for tag in tag_objects {
            let signer = self.verifier.verify(runner, ObjectKind::Tag, tag.as_str())?;
            let verdict = TagVerdict { tag, signer };
            match &verdict.signer {
                Some(fpr) => {
                    info!(tag = %verdict.tag, signer = %fpr, "{verdict}");
                    signers.insert(fpr.clone());
                }
                None => warn!(tag = %verdict.tag, "{verdict}"),
            }
            tags.push(verdict);
        }

        let required = self.config.minimum_distinct_maintainers;
        if signers.len() < required {
            return Err(VerificationError::InsufficientQuorum {
                tags,
                found: signers.len(),
                required,
            });
        }
        info!(
            found = signers.len(),
            required, "Enough distinct tag signatures."
        );
        Ok(QuorumOutcome::SignedTags {
            signers,
            tags,
            required,
        })
    }

    fn list_tags<R: CommandRunner>(
        &self,
        runner: &R,
        expected: &ObjectId,
    ) -> Result<Vec<ObjectId>, VerificationError> {
        let spec = CommandSpec::new(self.verifier.git())
            .arg("tag")
            .arg(format!("--points-at={expected}"))
            .arg(format!("--format={TAG_LISTING_FORMAT}"))
            .current_dir(self.verifier.repo());
        let output = runner.run_checked(&spec)?;
        let listing = cap_listing(output.stdout.trim(), self.config.max_tag_listing_bytes);
        parse_tag_listing(listing, expected)
    }

    fn evaluate_untagged<R: CommandRunner>(
        &self,
        runner: &R,
        expected: ObjectId,
    ) -> Result<QuorumOutcome, VerificationError> {
        info!(commit = %expected, "---> No tag pointing at {expected}");
        let Some(signer) = self
            .verifier
            .verify(runner, ObjectKind::Commit, expected.as_str())?
        else {
            return Err(VerificationError::InvalidCommit(expected));
        };

        match self.config.policy {
            SignaturePolicy::SignedTagOrCommit => {
                warn!(
                    commit = %expected,
                    signer = %signer,
                    "commit has no signed tag but is signed by a trusted key; accepting under signed-tag-or-commit policy"
                );
                Ok(QuorumOutcome::SignedCommit { signer })
            }
            SignaturePolicy::SignedTag => Err(VerificationError::UntaggedSignedCommit(expected)),
        }
    }
}
