//! Requirement-to-test traceability.
//!
//! Requirements live in two YAML documents under `.req/`. Tests are found in
//! source files by pattern, fingerprinted, and linked to requirements; a
//! requirement's verification status is derived from whether its linked tests
//! were assessed and are unchanged since.

pub mod domain;
pub use domain::{
    Config, Edit, Fingerprint, GithubIssue, HistoryKind, LinkCondition, NewRequirement, Priority,
    Report, Requirement, RequirementId, Source, SourceType, Status, Store, StoreError,
    VerificationStatus,
};

/// Test extraction from source text.
pub mod extract;
pub use extract::{ExtractedTest, extract};

/// Filesystem persistence and scanning.
pub mod storage;
pub use storage::{Project, ProjectError};
