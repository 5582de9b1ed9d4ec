//! Error types for the fetch engine.

use std::path::PathBuf;

use fontis_core::{CommandError, ValidationError};
use fontis_verify::VerificationError;

/// The remote could not be reached, or the local checkout could not be
/// brought in line with it.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Fetch or clone from the remote failed (unreachable, or the branch
    /// or commit does not exist there).
    #[error("cannot fetch `{reference}` from {url}: {source}")]
    Remote {
        /// Remote URL.
        url: String,
        /// Branch or commit requested.
        reference: String,
        /// The failing git invocation.
        source: CommandError,
    },

    /// A local git step (init, reset, rev-parse) failed.
    #[error("git operation failed: {0}")]
    Git(#[from] CommandError),

    /// No revision could be resolved from the fetched state.
    #[error("Cannot determine reference to verify!")]
    Unresolvable,

    /// Removing or creating the component directory failed.
    #[error("cannot prepare component directory `{}`: {source}", .path.display())]
    Io {
        /// Component directory.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// The verified revision could not be integrated into the working copy.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    /// The existing branch tip is not an ancestor of the verified revision.
    #[error("branch `{branch}` cannot be fast-forwarded to {reference}")]
    NotFastForward {
        /// Local branch.
        branch: String,
        /// Verified revision.
        reference: String,
    },

    /// A checkout, merge, ref update, or submodule command failed.
    #[error("integration failed: {0}")]
    Git(#[from] CommandError),
}

/// Any failure of the engine, by category.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input or conflicting flags. Nothing was mutated.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Fetching the remote failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The revision is not authorized.
    #[error(transparent)]
    Verification(VerificationError),

    /// Moving the working copy to the verified revision failed.
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

impl From<VerificationError> for EngineError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Validation(inner) => Self::Validation(inner),
            other => Self::Verification(other),
        }
    }
}
