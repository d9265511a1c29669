//! Derived verification status of a requirement.
//!
//! Nothing here is stored as a source of truth. The status is recomputed from
//! a requirement's test links and, when available, a fresh scan of the linked
//! files.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize, Serializer};

use crate::{
    domain::{
        fingerprint::Fingerprint,
        id::RequirementId,
        requirement::{Requirement, TestLink},
        store::Store,
    },
    extract::ExtractedTest,
};

/// Coverage classification of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// No tests are linked.
    #[serde(rename = "n/a")]
    NotApplicable,
    /// Some linked test has never been assessed.
    #[serde(rename = "unverified")]
    Unverified,
    /// Every linked test was assessed and none has changed since.
    #[serde(rename = "verified")]
    Verified,
    /// A linked test changed after it was linked or assessed, or has gone.
    #[serde(rename = "stale")]
    Stale,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotApplicable => "n/a",
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Stale => "stale",
        })
    }
}

/// Why a linked test can no longer be located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orphan {
    /// The linked file does not exist.
    FileMissing,
    /// The file exists but no longer defines the identifier.
    TestMissing,
}

/// The state of one test link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCondition {
    /// Never assessed, unchanged.
    Unconfirmed,
    /// Assessed, unchanged.
    Confirmed,
    /// The assessment was made against a different body than the one stored.
    ConfirmationDrift,
    /// The live body no longer matches the stored hash.
    Drifted {
        /// Fingerprint of the body found by the scan.
        live: Fingerprint,
    },
    /// The test cannot be found any more.
    Orphaned(Orphan),
}

impl LinkCondition {
    /// Whether this condition forces the requirement to
    /// [`VerificationStatus::Stale`].
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(
            self,
            Self::ConfirmationDrift | Self::Drifted { .. } | Self::Orphaned(_)
        )
    }
}

impl fmt::Display for LinkCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfirmed => f.write_str("unconfirmed"),
            Self::Confirmed => f.write_str("confirmed"),
            Self::ConfirmationDrift => f.write_str("changed since assessment"),
            Self::Drifted { live } => write!(f, "changed since link (now {})", live.short()),
            Self::Orphaned(Orphan::FileMissing) => f.write_str("file missing"),
            Self::Orphaned(Orphan::TestMissing) => f.write_str("test missing"),
        }
    }
}

impl Serialize for LinkCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What a scan found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileScan {
    /// The file does not exist.
    Missing,
    /// Fingerprints of every test found, keyed by identifier.
    Scanned(BTreeMap<String, Fingerprint>),
}

/// Live fingerprints gathered by scanning test files.
///
/// Keyed by project-relative path. Files absent from the index provide no
/// live evidence either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTests {
    files: BTreeMap<String, FileScan>,
}

impl LiveTests {
    /// Record that `file` does not exist.
    pub fn insert_missing(&mut self, file: impl Into<String>) {
        self.files.insert(file.into(), FileScan::Missing);
    }

    /// Record the tests extracted from `file`.
    pub fn insert_scanned<'a>(
        &mut self,
        file: impl Into<String>,
        tests: impl IntoIterator<Item = &'a ExtractedTest>,
    ) {
        let found = tests
            .into_iter()
            .map(|test| (test.identifier.clone(), test.hash.clone()))
            .collect();
        self.files.insert(file.into(), FileScan::Scanned(found));
    }

    /// What the scan found for `file`, if it was scanned.
    #[must_use]
    pub fn file(&self, file: &str) -> Option<&FileScan> {
        self.files.get(file)
    }

    /// The number of files covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The condition of a single link within an [`Assessment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAssessment<'a> {
    /// The link that was assessed.
    pub link: &'a TestLink,
    /// What was found.
    pub condition: LinkCondition,
}

/// Full result of classifying a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment<'a> {
    /// The overall status.
    pub status: VerificationStatus,
    /// Per-link detail, in link order.
    pub links: Vec<LinkAssessment<'a>>,
}

impl<'a> Assessment<'a> {
    /// Links that cannot be located any more.
    pub fn orphaned(&self) -> impl Iterator<Item = &LinkAssessment<'a>> {
        self.links
            .iter()
            .filter(|l| matches!(l.condition, LinkCondition::Orphaned(_)))
    }
}

fn condition(link: &TestLink, live: Option<&LiveTests>) -> LinkCondition {
    match live.and_then(|live| live.file(&link.file)) {
        Some(FileScan::Missing) => return LinkCondition::Orphaned(Orphan::FileMissing),
        Some(FileScan::Scanned(found)) => match found.get(&link.identifier) {
            None => return LinkCondition::Orphaned(Orphan::TestMissing),
            Some(hash) if hash != &link.hash => {
                return LinkCondition::Drifted { live: hash.clone() };
            }
            Some(_) => {}
        },
        None => {}
    }

    match &link.confirmation {
        Some(confirmation) if confirmation.hash != link.hash => LinkCondition::ConfirmationDrift,
        Some(_) => LinkCondition::Confirmed,
        None => LinkCondition::Unconfirmed,
    }
}

/// Classify `requirement`, reporting the condition of every link.
///
/// Rules, first match wins:
///
/// 1. no tests: [`VerificationStatus::NotApplicable`]
/// 2. any link drifted, orphaned or assessed against another body:
///    [`VerificationStatus::Stale`]
/// 3. every link confirmed: [`VerificationStatus::Verified`]
/// 4. otherwise: [`VerificationStatus::Unverified`]
#[must_use]
pub fn assess<'a>(requirement: &'a Requirement, live: Option<&LiveTests>) -> Assessment<'a> {
    let links: Vec<_> = requirement
        .tests
        .iter()
        .map(|link| LinkAssessment {
            link,
            condition: condition(link, live),
        })
        .collect();

    let status = if links.is_empty() {
        VerificationStatus::NotApplicable
    } else if links.iter().any(|l| l.condition.is_stale()) {
        VerificationStatus::Stale
    } else if links
        .iter()
        .all(|l| l.condition == LinkCondition::Confirmed)
    {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Unverified
    };

    Assessment { status, links }
}

/// Classify `requirement` without per-link detail.
#[must_use]
pub fn classify(requirement: &Requirement, live: Option<&LiveTests>) -> VerificationStatus {
    assess(requirement, live).status
}

/// The condition of one link, detached from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    /// The linked file.
    pub file: String,
    /// The linked test.
    pub identifier: String,
    /// What was found.
    pub condition: LinkCondition,
}

/// The classification of one requirement, detached from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// The requirement.
    pub id: RequirementId,
    /// Its description.
    pub description: String,
    /// Its overall status.
    pub status: VerificationStatus,
    /// Per-link detail.
    pub links: Vec<LinkReport>,
}

impl Report {
    /// Classify one requirement.
    #[must_use]
    pub fn new(id: &RequirementId, requirement: &Requirement, live: Option<&LiveTests>) -> Self {
        let assessment = assess(requirement, live);
        Self {
            id: id.clone(),
            description: requirement.description.clone(),
            status: assessment.status,
            links: assessment
                .links
                .into_iter()
                .map(|l| LinkReport {
                    file: l.link.file.clone(),
                    identifier: l.link.identifier.clone(),
                    condition: l.condition,
                })
                .collect(),
        }
    }
}

/// Classify every active requirement, in ID order.
#[must_use]
pub fn coverage(store: &Store, live: Option<&LiveTests>) -> Vec<Report> {
    store
        .requirements()
        .map(|(id, requirement)| Report::new(id, requirement, live))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::domain::{
        history::{HistoryEntry, HistoryKind},
        requirement::{Confirmation, Priority, Source, Status},
    };

    fn link(identifier: &str, body: &str, confirmed_body: Option<&str>) -> TestLink {
        TestLink {
            file: "math.test.ts".to_string(),
            identifier: identifier.to_string(),
            runner: "jest".to_string(),
            hash: Fingerprint::of(body),
            linked_at: Utc::now(),
            confirmation: confirmed_body.map(|b| Confirmation {
                verdict: "covers the requirement".to_string(),
                at: Utc::now(),
                hash: Fingerprint::of(b),
            }),
        }
    }

    fn requirement(tests: Vec<TestLink>) -> Requirement {
        Requirement {
            description: "Adds numbers".to_string(),
            source: Source::default(),
            priority: Priority::High,
            status: Status::Approved,
            tags: BTreeSet::from(["math".to_string()]),
            tests,
            history: vec![HistoryEntry::now(HistoryKind::Created, "created", None)],
            last_verified: None,
            github_issue: None,
            created: Utc::now(),
        }
    }

    fn live(entries: &[(&str, &str)]) -> LiveTests {
        let mut live = LiveTests::default();
        live.files.insert(
            "math.test.ts".to_string(),
            FileScan::Scanned(
                entries
                    .iter()
                    .map(|(id, body)| ((*id).to_string(), Fingerprint::of(body)))
                    .collect(),
            ),
        );
        live
    }

    #[test]
    fn no_tests_is_not_applicable() {
        let req = requirement(Vec::new());
        assert_eq!(classify(&req, None), VerificationStatus::NotApplicable);
        assert_eq!(
            classify(&req, Some(&live(&[]))),
            VerificationStatus::NotApplicable
        );
    }

    #[test]
    fn unconfirmed_link_is_unverified() {
        let req = requirement(vec![link("a", "body", None)]);
        assert_eq!(classify(&req, None), VerificationStatus::Unverified);
    }

    #[test]
    fn all_confirmed_is_verified() {
        let req = requirement(vec![
            link("a", "body a", Some("body a")),
            link("b", "body b", Some("body b")),
        ]);
        assert_eq!(classify(&req, None), VerificationStatus::Verified);
    }

    #[test]
    fn partially_confirmed_is_unverified() {
        let req = requirement(vec![
            link("a", "body a", Some("body a")),
            link("b", "body b", None),
        ]);
        assert_eq!(classify(&req, None), VerificationStatus::Unverified);
    }

    #[test]
    fn confirmation_against_other_body_is_stale() {
        let req = requirement(vec![link("a", "new body", Some("old body"))]);
        let assessment = assess(&req, None);
        assert_eq!(assessment.status, VerificationStatus::Stale);
        assert_eq!(
            assessment.links[0].condition,
            LinkCondition::ConfirmationDrift
        );
    }

    #[test]
    fn one_drifted_link_outweighs_verified_ones() {
        let req = requirement(vec![
            link("a", "body a", Some("body a")),
            link("b", "body b", Some("body b")),
        ]);
        let live = live(&[("a", "body a"), ("b", "edited body b")]);
        assert_eq!(classify(&req, Some(&live)), VerificationStatus::Stale);
    }

    #[test]
    fn live_drift_beats_unverified() {
        let req = requirement(vec![link("a", "body", None)]);
        let live = live(&[("a", "edited")]);
        let assessment = assess(&req, Some(&live));
        assert_eq!(assessment.status, VerificationStatus::Stale);
        assert_eq!(
            assessment.links[0].condition,
            LinkCondition::Drifted {
                live: Fingerprint::of("edited")
            }
        );
    }

    #[test]
    fn unchanged_live_body_keeps_verified() {
        let req = requirement(vec![link("a", "body", Some("body"))]);
        let live = live(&[("a", "body")]);
        assert_eq!(classify(&req, Some(&live)), VerificationStatus::Verified);
    }

    #[test]
    fn missing_test_is_orphaned_and_stale() {
        let req = requirement(vec![link("a", "body", Some("body"))]);
        let live = live(&[("other", "body")]);
        let assessment = assess(&req, Some(&live));
        assert_eq!(assessment.status, VerificationStatus::Stale);
        assert_eq!(assessment.orphaned().count(), 1);
        assert_eq!(
            assessment.links[0].condition,
            LinkCondition::Orphaned(Orphan::TestMissing)
        );
    }

    #[test]
    fn missing_file_is_orphaned() {
        let req = requirement(vec![link("a", "body", None)]);
        let mut live = LiveTests::default();
        live.insert_missing("math.test.ts");
        assert_eq!(
            assess(&req, Some(&live)).links[0].condition,
            LinkCondition::Orphaned(Orphan::FileMissing)
        );
    }

    #[test]
    fn unscanned_files_provide_no_evidence() {
        let req = requirement(vec![link("a", "body", Some("body"))]);
        let mut live = LiveTests::default();
        live.insert_missing("elsewhere.test.ts");
        assert_eq!(classify(&req, Some(&live)), VerificationStatus::Verified);
    }

    #[test]
    fn classification_is_idempotent() {
        let req = requirement(vec![
            link("a", "body a", Some("body a")),
            link("b", "body b", None),
        ]);
        let live = live(&[("a", "body a"), ("b", "body b")]);
        assert_eq!(
            classify(&req, Some(&live)),
            classify(&req, Some(&live))
        );
    }

    #[test]
    fn report_lists_every_link() {
        let req = requirement(vec![
            link("a", "body a", Some("body a")),
            link("b", "body b", None),
        ]);
        let live = live(&[("a", "body a")]);
        let report = Report::new(&"REQ-1".parse().unwrap(), &req, Some(&live));

        assert_eq!(report.status, VerificationStatus::Stale);
        assert_eq!(report.links[0].condition, LinkCondition::Confirmed);
        assert_eq!(
            report.links[1].condition,
            LinkCondition::Orphaned(Orphan::TestMissing)
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["id"], "REQ-001");
        assert_eq!(json["status"], "stale");
        assert_eq!(json["links"][1]["condition"], "test missing");
    }

    #[test]
    fn status_serializes_with_slash() {
        let yaml = serde_yaml::to_string(&VerificationStatus::NotApplicable).unwrap();
        assert_eq!(yaml.trim(), "n/a");
    }
}
