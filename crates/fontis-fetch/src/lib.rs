//! Secure fetch-and-verify engine for component sources.
//!
//! `fontis-fetch` drives one component through the acquisition pipeline:
//!
//! 1. **Repository state** ([`repo`]): clone, or fetch into an existing
//!    checkout, without trusting anything yet
//! 2. **Reference resolution** ([`resolve`]): pick the one concrete
//!    revision to verify, honouring the versions-only filter
//! 3. **Verification**: delegated to [`fontis_verify`]'s quorum evaluator
//! 4. **Integration** ([`integrate`]): move the working branch to the
//!    verified revision and sync submodules
//!
//! [`SourceFetcher`] sequences the four stages. Every destructive step on
//! the working copy happens strictly after verification succeeded.

pub mod engine;
pub mod error;
pub mod integrate;
pub mod repo;
pub mod resolve;

pub use engine::{FetchOutcome, FetchRequest, SourceFetcher, Tooling};
pub use error::{EngineError, FetchError, IntegrationError};
pub use integrate::{BranchSwitch, IntegrationEngine, IntegrationReport};
pub use repo::{LocalState, RepositoryManager, RequestedRef, SyncOptions, SyncPlan, SyncResult};
pub use resolve::{ReferenceResolver, Resolution};
