use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

use crate::domain::{
    fingerprint::{Fingerprint, links_fingerprint},
    history::HistoryEntry,
    verification::VerificationStatus,
};

/// Malformed input, rejected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The description is empty or only whitespace.
    #[error("description must not be empty")]
    EmptyDescription,
    /// A confirmation was given without a verdict.
    #[error("verdict must not be empty")]
    EmptyVerdict,
    /// A link was requested without naming the test runner.
    #[error("runner must not be empty")]
    EmptyRunner,
    /// A tag is empty or only whitespace.
    #[error("tags must not be empty")]
    EmptyTag,
    /// Not one of critical, high, medium, low.
    #[error("unknown priority '{0}' (expected critical, high, medium or low)")]
    UnknownPriority(String),
    /// Not one of draft, approved, implemented, released.
    #[error("unknown status '{0}' (expected draft, approved, implemented or released)")]
    UnknownStatus(String),
    /// Not one of doc, ai, slack, jira, manual.
    #[error("unknown source type '{0}' (expected doc, ai, slack, jira or manual)")]
    UnknownSourceType(String),
}

/// Trim `text` and reject it if nothing is left.
pub(crate) fn non_empty(text: &str, error: ValidationError) -> Result<String, ValidationError> {
    NonEmptyString::new(text.trim().to_string())
        .map(|s| s.as_str().to_string())
        .map_err(|_| error)
}

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])* $name:ident, $error:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &[Self] = &[$(Self::$variant),+];

            /// The lower-case keyword for this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lower)
                    .ok_or_else(|| ValidationError::$error(s.to_string()))
            }
        }
    };
}

keyword_enum! {
    /// How urgent a requirement is.
    #[derive(Default)]
    Priority, UnknownPriority {
        /// Must be addressed first.
        Critical => "critical",
        /// Important.
        High => "high",
        /// The default.
        #[default]
        Medium => "medium",
        /// Nice to have.
        Low => "low",
    }
}

keyword_enum! {
    /// Where a requirement is in its lifecycle.
    #[derive(Default)]
    Status, UnknownStatus {
        /// Captured but not agreed.
        #[default]
        Draft => "draft",
        /// Agreed.
        Approved => "approved",
        /// Built.
        Implemented => "implemented",
        /// Shipped.
        Released => "released",
    }
}

keyword_enum! {
    /// Where a requirement was captured from.
    SourceType, UnknownSourceType {
        /// A document.
        Doc => "doc",
        /// An AI conversation.
        Ai => "ai",
        /// A Slack thread.
        Slack => "slack",
        /// A Jira ticket.
        Jira => "jira",
        /// Entered by hand.
        Manual => "manual",
    }
}

/// Provenance of a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// The kind of source.
    #[serde(rename = "type")]
    pub kind: SourceType,
    /// A pointer into the source (URL, document section, ticket key...).
    #[serde(default)]
    pub reference: String,
    /// When the requirement was captured.
    pub captured_at: DateTime<Utc>,
}

impl Source {
    /// A source captured now.
    #[must_use]
    pub fn new(kind: SourceType, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            captured_at: Utc::now(),
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::new(SourceType::Manual, String::new())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reference.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} ({})", self.kind, self.reference)
        }
    }
}

/// An assessment of a linked test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// The assessor's verdict.
    pub verdict: String,
    /// When the assessment was made.
    pub at: DateTime<Utc>,
    /// Fingerprint of the body that was assessed.
    pub hash: Fingerprint,
}

/// A pointer from a requirement to one test definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestLink {
    pub(crate) file: String,
    pub(crate) identifier: String,
    pub(crate) runner: String,
    pub(crate) hash: Fingerprint,
    pub(crate) linked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) confirmation: Option<Confirmation>,
}

impl TestLink {
    /// Project-relative path of the test file, with `/` separators.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The test's name as written in the source.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The framework that runs this test.
    #[must_use]
    pub fn runner(&self) -> &str {
        &self.runner
    }

    /// Fingerprint of the body when the test was linked (or last re-linked).
    #[must_use]
    pub const fn hash(&self) -> &Fingerprint {
        &self.hash
    }

    /// When the link was created.
    #[must_use]
    pub const fn linked_at(&self) -> DateTime<Utc> {
        self.linked_at
    }

    /// The latest assessment, if any.
    #[must_use]
    pub const fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    /// Whether this link points at `identifier` in `file`.
    #[must_use]
    pub fn is(&self, file: &str, identifier: &str) -> bool {
        self.file == file && self.identifier == identifier
    }
}

/// A GitHub issue associated with a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubIssue {
    /// The issue number.
    pub number: u64,
    /// The issue state as reported by GitHub (`open`, `closed`).
    pub state: String,
    /// The issue title.
    pub title: String,
}

/// A cached verification result.
///
/// Only meaningful while [`VerificationSnapshot::is_current`] holds; the status
/// can always be re-derived from the requirement's test links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSnapshot {
    /// The status that was computed.
    pub status: VerificationStatus,
    /// When it was computed.
    pub at: DateTime<Utc>,
    /// Fingerprint of the test links it was computed from.
    pub links: Fingerprint,
}

impl VerificationSnapshot {
    /// Whether this snapshot was computed from the requirement's present
    /// links.
    #[must_use]
    pub fn is_current(&self, requirement: &Requirement) -> bool {
        self.links == links_fingerprint(&requirement.tests)
    }
}

/// A tracked requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub(crate) description: String,
    pub(crate) source: Source,
    #[serde(default)]
    pub(crate) priority: Priority,
    #[serde(default)]
    pub(crate) status: Status,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) tests: Vec<TestLink>,
    #[serde(default)]
    pub(crate) history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_verified: Option<VerificationSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) github_issue: Option<GithubIssue>,
    pub(crate) created: DateTime<Utc>,
}

impl Requirement {
    /// The requirement text.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Where the requirement came from.
    #[must_use]
    pub const fn source(&self) -> &Source {
        &self.source
    }

    /// The requirement's priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// The requirement's lifecycle status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// The tags on the requirement
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Linked tests, in link order.
    #[must_use]
    pub fn tests(&self) -> &[TestLink] {
        &self.tests
    }

    /// The requirement's history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The cached verification result, whether or not it is still current.
    #[must_use]
    pub const fn last_verified(&self) -> Option<&VerificationSnapshot> {
        self.last_verified.as_ref()
    }

    /// The associated GitHub issue, if any.
    #[must_use]
    pub const fn github_issue(&self) -> Option<&GithubIssue> {
        self.github_issue.as_ref()
    }

    /// When the requirement was first created
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Find the link to `identifier` in `file`.
    #[must_use]
    pub fn link(&self, file: &str, identifier: &str) -> Option<&TestLink> {
        self.tests.iter().find(|link| link.is(file, identifier))
    }

    pub(crate) fn link_mut(&mut self, file: &str, identifier: &str) -> Option<&mut TestLink> {
        self.tests.iter_mut().find(|link| link.is(file, identifier))
    }

    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("critical", Priority::Critical)]
    #[test_case("HIGH", Priority::High)]
    #[test_case(" low ", Priority::Low)]
    fn priority_parses_case_insensitively(input: &str, expected: Priority) {
        assert_eq!(input.parse::<Priority>().unwrap(), expected);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_eq!(
            "done".parse::<Status>(),
            Err(ValidationError::UnknownStatus("done".to_string()))
        );
    }

    #[test]
    fn source_type_round_trips_through_display() {
        for kind in SourceType::ALL {
            assert_eq!(kind.to_string().parse::<SourceType>().unwrap(), *kind);
        }
    }

    #[test]
    fn defaults_are_medium_and_draft() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Status::default(), Status::Draft);
    }

    #[test]
    fn non_empty_trims() {
        assert_eq!(
            non_empty("  text ", ValidationError::EmptyDescription).unwrap(),
            "text"
        );
        assert_eq!(
            non_empty("   ", ValidationError::EmptyDescription),
            Err(ValidationError::EmptyDescription)
        );
    }

    #[test]
    fn source_serializes_type_key() {
        let source = Source::new(SourceType::Jira, "PROJ-12");
        let yaml = serde_yaml::to_string(&source).unwrap();
        assert!(yaml.contains("type: jira"));
        assert!(yaml.contains("capturedAt:"));
    }
}
