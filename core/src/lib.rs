#![deny(missing_docs)]

//! # Testsync Core
//!
//! Incremental synchronization engine that keeps a directory of generated API
//! tests in step with an OpenAPI (3.x) or Swagger (2.0) contract.
//!
//! Each run classifies every endpoint as Created, Updated, Skipped or Deleted
//! by comparing contract fingerprints against the fingerprints embedded in the
//! marker regions of existing test files, then rewrites only those regions.

/// Boundary request/response types.
pub mod api;

/// Contract parsing into endpoint records.
pub mod contract;

/// Pipeline orchestration.
pub mod engine;

/// Shared error types.
pub mod error;

/// Stable endpoint digests.
pub mod fingerprint;

/// Language-neutral test plans.
pub mod generator;

/// Scan of existing artifacts.
pub mod inventory;

/// Generated-region markers.
pub mod markers;

/// Created/Updated/Skipped/Deleted classification.
pub mod reconcile;

/// Run totals and coverage.
pub mod report;

/// Strategy Pattern Interfaces.
pub mod strategies;

/// Region merging and atomic writes.
pub mod writer;

pub use api::{ErrorDetail, FileAction, FileResult, Summary, SyncRequest, SyncResponse};
pub use contract::{parse_contract, Contract, ContractFormat, EndpointId, EndpointSpec};
pub use engine::{sync, sync_with_cancel};
pub use error::{AppResult, SyncError};
pub use fingerprint::{fingerprint, Fingerprint};
pub use generator::{build_plan, GeneratorOptions, TestPlan, TestType};
pub use strategies::{PytestStrategy, StrategyKind, TestStrategy, UreqStrategy};
