//! Domain models for requirement traceability.
//!
//! This module contains the requirement records, their identifiers, the
//! in-memory store and the verification classification.

mod config;
pub use config::Config;

/// Content fingerprints.
pub mod fingerprint;
pub use fingerprint::Fingerprint;

/// Append-only requirement history.
pub mod history;
pub use history::{HistoryEntry, HistoryKind};

/// Requirement identifiers.
pub mod id;
pub use id::{Error as IdError, RequirementId};

/// Requirement records and their fields.
pub mod requirement;
pub use requirement::{
    Confirmation, GithubIssue, Priority, Requirement, Source, SourceType, Status, TestLink,
    ValidationError, VerificationSnapshot,
};

/// The in-memory active and archive stores.
pub mod store;
pub use store::{Edit, Location, NewRequirement, Store, StoreError};

pub mod verification;
pub use verification::{
    Assessment, LinkCondition, LinkReport, LiveTests, Report, VerificationStatus, coverage,
};
