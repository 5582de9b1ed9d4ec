//! Error types for the verification subsystem.

use fontis_core::{CommandError, ObjectId, ObjectIdError, ValidationError};

use crate::quorum::TagVerdict;

/// Errors from provenance verification. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The revision to verify is not a well-formed full hash.
    #[error("---> {0}")]
    MalformedHash(#[from] ObjectIdError),

    /// A tag listing record has the wrong shape (truncated or oversized).
    #[error("---> Bad Git hash value (wrong length); failing (tag record `{record}`)")]
    MalformedTagRecord {
        /// The offending record as listed by git.
        record: String,
    },

    /// A tag record points somewhere other than the expected revision.
    #[error("---> Tag has wrong hash (found {found}, expected {expected})")]
    TagHashMismatch {
        /// Target embedded in the tag record.
        found: String,
        /// The revision being verified.
        expected: ObjectId,
    },

    /// Tags exist but too few distinct trusted maintainers signed them.
    #[error(
        "{}Not enough distinct tag signatures. Found {found}, mandatory minimum is {required}.",
        verdict_lines(.tags)
    )]
    InsufficientQuorum {
        /// Every tag checked, in listing order.
        tags: Vec<TagVerdict>,
        /// Distinct valid signers found.
        found: usize,
        /// Configured minimum.
        required: usize,
    },

    /// No tag, but a trusted signature on the commit, under the tag-required policy.
    #[error(
        "---> No tag pointing at {0}\n---> {0} is a commit signed by a trusted key. Did the signer forget to add a tag?"
    )]
    UntaggedSignedCommit(ObjectId),

    /// No tag and no trusted signature on the commit.
    #[error("---> No tag pointing at {0}\n---> Invalid commit {0}.")]
    InvalidCommit(ObjectId),

    /// Keyring setup was given bad input (missing key file, bad directory).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A git or verifier command needed for verification failed.
    #[error("verification command failed: {0}")]
    Command(#[from] CommandError),
}

/// One `---> Good/Invalid tag` line per verdict.
fn verdict_lines(tags: &[TagVerdict]) -> String {
    tags.iter().map(|verdict| format!("{verdict}\n")).collect()
}
