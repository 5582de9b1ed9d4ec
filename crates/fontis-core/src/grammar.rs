//! Validated input newtypes.
//!
//! Every value that ends up on a git or verifier command line passes
//! through one of these constructors first. The grammars are deliberately
//! narrow: nothing that starts with `-` or contains shell-significant
//! characters can be constructed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ObjectIdError, ValidationError};

static BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9/._-]+$").expect("static regex is valid")
});

static COMPONENT_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[A-Za-z][A-Za-z0-9/_-]*$").expect("static regex is valid")
});

static FINGERPRINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-fA-F0-9]{40}$").expect("static regex is valid"));

static EXPLICIT_COMMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-fA-F0-9]{40}|[a-fA-F0-9]{64})$").expect("static regex is valid")
});

/// Returns `true` for a full 40-hex SHA-1 in either case.
///
/// `git clone` cannot target such a value, so anything matching this is
/// obtained with `git init` + `git fetch` instead.
pub fn looks_like_commit(value: &str) -> bool {
    FINGERPRINT_RE.is_match(value)
}

/// A branch name matching `[A-Za-z0-9][A-Za-z0-9/._-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Validate a branch name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBranch`] if the grammar does not match.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if BRANCH_RE.is_match(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(ValidationError::InvalidBranch(value.to_owned()))
        }
    }

    /// The branch name as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this branch name is itself shaped like a commit hash.
    pub fn looks_like_commit(&self) -> bool {
        looks_like_commit(&self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The absolute path of a component checkout.
///
/// Must match `^/[A-Za-z][A-Za-z0-9/_-]*$`: absolute, no dots (so no
/// `..` traversal), no whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDir(PathBuf);

impl ComponentDir {
    /// Validate a component directory.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidComponentDir`] if the grammar does not match.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if COMPONENT_DIR_RE.is_match(value) {
            Ok(Self(PathBuf::from(value)))
        } else {
            Err(ValidationError::InvalidComponentDir(value.to_owned()))
        }
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The git metadata directory inside the checkout.
    pub fn git_dir(&self) -> PathBuf {
        self.0.join(".git")
    }
}

/// A full commit hash supplied explicitly by the caller.
///
/// Accepts 40 or 64 hex characters in either case; git resolves it to a
/// canonical [`ObjectId`] after the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExplicitCommit(String);

impl ExplicitCommit {
    /// Validate an explicit commit.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCommit`] unless the value is 40 or 64 hex characters.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if EXPLICIT_COMMIT_RE.is_match(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(ValidationError::InvalidCommit(value.to_owned()))
        }
    }

    /// The commit as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExplicitCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 40-hex OpenPGP key fingerprint.
///
/// Keeps the spelling it was given (so `<fingerprint>.asc` lookups match
/// the operator's file names) but compares, orders, and hashes
/// case-insensitively: `ABCD…` and `abcd…` are the same signer.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Validate a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFingerprint`] if not exactly 40 hex characters.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if FINGERPRINT_RE.is_match(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(ValidationError::InvalidFingerprint(value.to_owned()))
        }
    }

    /// The fingerprint as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the armored public key for this fingerprint.
    pub fn key_file_name(&self) -> String {
        format!("{}.asc", self.0)
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_uppercase())
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Fingerprint {}

impl Ord for Fingerprint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl PartialOrd for Fingerprint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.folded() {
            state.write_u8(b);
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A full git object id as printed by git: exactly 40 (SHA-1) or 64
/// (SHA-256) lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate a raw hash string.
    ///
    /// Length is checked before character set, so a truncated hash is
    /// always reported as a length problem.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectIdError`] for any other length or any character
    /// outside `0-9a-f`.
    pub fn parse(value: &str) -> Result<Self, ObjectIdError> {
        if value.len() != 40 && value.len() != 64 {
            return Err(ObjectIdError::WrongLength(value.len()));
        }
        if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(ObjectIdError::BadCharacter);
        }
        Ok(Self(value.to_owned()))
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash length in hex characters (40 or 64).
    pub fn hex_len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
