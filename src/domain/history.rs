use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of transition a [`HistoryEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// The requirement was added.
    Created,
    /// A test was linked.
    Linked,
    /// A linked test's stored hash was explicitly refreshed.
    Relinked,
    /// A test was unlinked.
    Unlinked,
    /// A linked test was assessed.
    Confirmed,
    /// The description or source changed.
    Modified,
    /// The priority changed.
    PriorityChanged,
    /// The status changed.
    StatusChanged,
    /// Tags were added or removed.
    TagsChanged,
    /// The requirement moved to the archive.
    Archived,
    /// The requirement moved back out of the archive.
    Restored,
    /// A GitHub issue was associated.
    GithubLinked,
    /// The GitHub issue association was removed.
    GithubUnlinked,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Linked => "linked",
            Self::Relinked => "relinked",
            Self::Unlinked => "unlinked",
            Self::Confirmed => "confirmed",
            Self::Modified => "modified",
            Self::PriorityChanged => "priority_changed",
            Self::StatusChanged => "status_changed",
            Self::TagsChanged => "tags_changed",
            Self::Archived => "archived",
            Self::Restored => "restored",
            Self::GithubLinked => "github_linked",
            Self::GithubUnlinked => "github_unlinked",
        };
        f.write_str(s)
    }
}

/// One recorded transition in a requirement's life.
///
/// Entries are only ever appended; nothing edits or removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// What kind of change this was.
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    /// Free text describing the transition, e.g. `medium → high`.
    pub detail: String,
    /// Who made the change, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    /// When the change was made.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub(crate) fn now(kind: HistoryKind, detail: impl Into<String>, by: Option<&str>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            by: by.map(ToOwned::to_owned),
            timestamp: Utc::now(),
        }
    }
}

/// Describe a change from `old` to `new`.
pub(crate) fn transition(old: impl fmt::Display, new: impl fmt::Display) -> String {
    format!("{old} → {new}")
}

/// Describe a tag edit, omitting whichever half is empty.
pub(crate) fn tag_change(added: &[String], removed: &[String]) -> String {
    let mut parts = Vec::with_capacity(2);
    if !added.is_empty() {
        parts.push(format!("added: {}", added.join(", ")));
    }
    if !removed.is_empty() {
        parts.push(format!("removed: {}", removed.join(", ")));
    }
    parts.join("; ")
}
