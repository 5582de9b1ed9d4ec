//! Parser for the OpenPGP client's machine-readable status protocol.
//!
//! `git verify-{tag,commit} --raw` forwards the client's `[GNUPG:]`
//! status lines on stderr. Three of them matter here:
//!
//! ```text
//! [GNUPG:] NEWSIG
//! [GNUPG:] VALIDSIG <40-hex fingerprint> <YYYY-MM-DD> ...
//! [GNUPG:] TRUST_FULLY 0 pgp   (or TRUST_ULTIMATE 0 pgp)
//! ```
//!
//! The parser is pure: it takes a transcript and produces a
//! [`StatusReport`]. The acceptance rule lives in
//! [`StatusReport::trusted_signer`].

use std::sync::LazyLock;

use fontis_core::Fingerprint;
use regex::Regex;

/// Marker emitted once per signature the client starts checking.
pub const NEW_SIGNATURE: &str = "[GNUPG:] NEWSIG";

const TRUST_FULLY: &str = "[GNUPG:] TRUST_FULLY 0 pgp";
const TRUST_ULTIMATE: &str = "[GNUPG:] TRUST_ULTIMATE 0 pgp";

static VALIDSIG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[GNUPG:\] VALIDSIG ([a-fA-F0-9]{40}) [0-9]{4}-[0-9]{2}-[0-9]{2}")
        .expect("static regex is valid")
});

/// Trust the client assigned to the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    /// `TRUST_FULLY`.
    Fully,
    /// `TRUST_ULTIMATE`.
    Ultimate,
}

/// Structured view of one status transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// How many times the new-signature marker appears.
    pub new_signatures: usize,
    /// Highest full/ultimate trust annotation seen, if any.
    pub trust: Option<TrustLevel>,
    /// Fingerprint from the last parseable `VALIDSIG` line.
    pub valid_signer: Option<Fingerprint>,
}

impl StatusReport {
    /// Parse a status transcript.
    pub fn parse(transcript: &str) -> Self {
        let mut report = Self {
            new_signatures: transcript.matches(NEW_SIGNATURE).count(),
            ..Self::default()
        };

        for line in transcript.lines() {
            let level = if line.starts_with(TRUST_ULTIMATE) {
                Some(TrustLevel::Ultimate)
            } else if line.starts_with(TRUST_FULLY) {
                Some(TrustLevel::Fully)
            } else {
                None
            };
            if level > report.trust {
                report.trust = level;
            }

            if let Some(caps) = VALIDSIG_RE.captures(line) {
                report.valid_signer = caps
                    .get(1)
                    .and_then(|m| Fingerprint::parse(m.as_str()).ok());
            }
        }

        report
    }

    /// The signer, if and only if the transcript proves exactly one
    /// signature made by a fully or ultimately trusted key.
    ///
    /// Zero or several signatures, missing trust, or a missing `VALIDSIG`
    /// line all yield `None`.
    pub fn trusted_signer(&self) -> Option<&Fingerprint> {
        if self.new_signatures != 1 || self.trust.is_none() {
            return None;
        }
        self.valid_signer.as_ref()
    }
}
