//! Provenance verification for fetched component sources.
//!
//! `fontis-verify` decides whether a resolved git revision may enter the
//! build. Signature mathematics is delegated to an external
//! OpenPGP-compatible client driven through `git verify-tag` /
//! `git verify-commit`; this crate only interprets its machine-readable
//! status output and enforces policy on top of it.
//!
//! The pipeline has three layers:
//! 1. **Keyring**: an isolated, owner-only credential home per component,
//!    populated with explicitly listed maintainers or every key on file
//! 2. **Verifier**: one object (tag or commit) checked against that
//!    keyring, yielding the signer's fingerprint or nothing
//! 3. **Quorum**: every annotated tag pointing at the revision verified,
//!    distinct signers counted against a minimum, with a signed-commit
//!    fallback governed by [`SignaturePolicy`]

pub mod error;
pub mod keyring;
pub mod quorum;
pub mod status;
pub mod verifier;

pub use error::VerificationError;
pub use keyring::{GpgClient, Keyring, TrustSource};
pub use quorum::{QuorumConfig, QuorumEvaluator, QuorumOutcome, SignaturePolicy, TagVerdict};
pub use status::{StatusReport, TrustLevel};
pub use verifier::{ObjectKind, ProvenanceVerifier};
