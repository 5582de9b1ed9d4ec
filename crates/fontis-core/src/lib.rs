//! Shared foundations for the fontis source-acquisition engine.
//!
//! `fontis-core` holds the pieces every other crate leans on:
//!
//! - **Grammar**: validated newtypes for branch names, component
//!   directories, maintainer fingerprints, and git object ids. Inputs are
//!   checked here, before any git or verifier process is launched.
//! - **Runner**: the single "run an external command, capture status and
//!   output" interface. The engine never touches `std::process` directly,
//!   so it can be driven by a scripted fake in tests.
//! - **Errors**: validation and command failures shared across crates.

pub mod error;
pub mod grammar;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use error::{CommandError, ObjectIdError, ValidationError};
pub use grammar::{BranchName, ComponentDir, ExplicitCommit, Fingerprint, ObjectId, looks_like_commit};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedRunner;
