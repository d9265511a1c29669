//! The in-memory requirement store.
//!
//! The [`Store`] knows nothing about the filesystem. It holds the active and
//! archived requirements plus the store configuration, and every operation is
//! a pure in-memory transform: all checks run before anything is changed, so
//! a failed operation leaves the store exactly as it was.

use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroUsize,
};

use chrono::Utc;
use thiserror::Error;

use crate::{
    domain::{
        Config,
        fingerprint::{Fingerprint, links_fingerprint},
        history::{self, HistoryEntry, HistoryKind},
        id::{InvalidPrefixError, RequirementId},
        requirement::{
            Confirmation, GithubIssue, Priority, Requirement, Source, Status, TestLink,
            ValidationError, VerificationSnapshot, non_empty,
        },
        verification::VerificationStatus,
    },
    extract::ExtractedTest,
};

/// Errors that can occur when changing the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The arguments were malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No active requirement has this ID.
    #[error("requirement {0} not found")]
    NotFound(RequirementId),

    /// No archived requirement has this ID.
    #[error("archived requirement {0} not found")]
    ArchivedNotFound(RequirementId),

    /// The file does not define a test with this identifier.
    #[error("test '{identifier}' not found in {file}")]
    TestNotFound {
        /// The file that was searched.
        file: String,
        /// The identifier that was looked for.
        identifier: String,
    },

    /// The requirement has no link to this test.
    #[error("{id} is not linked to '{identifier}' in {file}")]
    LinkNotFound {
        /// The requirement.
        id: RequirementId,
        /// The test file.
        file: String,
        /// The test identifier.
        identifier: String,
    },

    /// The requirement is already linked to this test.
    #[error("{id} is already linked to '{identifier}' in {file} (use relink to refresh it)")]
    AlreadyLinked {
        /// The requirement.
        id: RequirementId,
        /// The test file.
        file: String,
        /// The test identifier.
        identifier: String,
    },

    /// Moving the requirement would overwrite a record with the same ID.
    #[error("requirement {0} already exists in the target store")]
    Conflict(RequirementId),

    /// The configured ID prefix is invalid.
    #[error(transparent)]
    Prefix(#[from] InvalidPrefixError),
}

/// The fields of a requirement being added.
#[derive(Debug, Clone, Default)]
pub struct NewRequirement {
    /// The requirement text. Must not be blank.
    pub description: String,
    /// Where it came from.
    pub source: Source,
    /// Initial priority.
    pub priority: Priority,
    /// Initial status.
    pub status: Status,
    /// Initial tags.
    pub tags: BTreeSet<String>,
}

impl NewRequirement {
    /// A requirement with the given description and default fields.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }
}

/// A field edit that can be applied to many requirements at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Set the priority.
    Priority(Priority),
    /// Set the status.
    Status(Status),
    /// Add and remove tags.
    Tags {
        /// Tags to add.
        add: Vec<String>,
        /// Tags to remove.
        remove: Vec<String>,
    },
}

/// Which store a requirement is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The active store.
    Active,
    /// The archive.
    Archive,
}

/// Active and archived requirements, keyed by ID.
///
/// An ID is present in at most one of the two maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    config: Config,
    active: BTreeMap<RequirementId, Requirement>,
    archive: BTreeMap<RequirementId, Requirement>,
    actor: Option<String>,
}

fn active_mut<'a>(
    active: &'a mut BTreeMap<RequirementId, Requirement>,
    id: &RequirementId,
) -> Result<&'a mut Requirement, StoreError> {
    active
        .get_mut(id)
        .ok_or_else(|| StoreError::NotFound(id.clone()))
}

fn link_not_found(id: &RequirementId, file: &str, identifier: &str) -> StoreError {
    StoreError::LinkNotFound {
        id: id.clone(),
        file: file.to_string(),
        identifier: identifier.to_string(),
    }
}

fn clean_tags<'a>(
    tags: impl IntoIterator<Item = &'a String>,
) -> Result<Vec<String>, ValidationError> {
    let mut cleaned: Vec<String> = Vec::new();
    for tag in tags {
        let tag = non_empty(tag, ValidationError::EmptyTag)?;
        if !cleaned.contains(&tag) {
            cleaned.push(tag);
        }
    }
    Ok(cleaned)
}

impl Store {
    /// An empty store with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Assemble a store from loaded documents.
    ///
    /// # Errors
    ///
    /// Returns the first ID found in both maps.
    pub fn from_parts(
        config: Config,
        active: BTreeMap<RequirementId, Requirement>,
        archive: BTreeMap<RequirementId, Requirement>,
    ) -> Result<Self, RequirementId> {
        if let Some(id) = active.keys().find(|id| archive.contains_key(id)) {
            return Err(id.clone());
        }
        Ok(Self {
            config,
            active,
            archive,
            actor: None,
        })
    }

    /// Set who is recorded as making subsequent changes.
    pub fn set_actor(&mut self, actor: Option<String>) {
        self.actor = actor;
    }

    /// The store configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the store configuration.
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// An active requirement.
    #[must_use]
    pub fn get(&self, id: &RequirementId) -> Option<&Requirement> {
        self.active.get(id)
    }

    /// An archived requirement.
    #[must_use]
    pub fn get_archived(&self, id: &RequirementId) -> Option<&Requirement> {
        self.archive.get(id)
    }

    /// Which store holds `id`, if either does.
    #[must_use]
    pub fn locate(&self, id: &RequirementId) -> Option<Location> {
        if self.active.contains_key(id) {
            Some(Location::Active)
        } else if self.archive.contains_key(id) {
            Some(Location::Archive)
        } else {
            None
        }
    }

    /// Active requirements in ID order.
    pub fn requirements(&self) -> impl Iterator<Item = (&RequirementId, &Requirement)> {
        self.active.iter()
    }

    /// Archived requirements in ID order.
    pub fn archived(&self) -> impl Iterator<Item = (&RequirementId, &Requirement)> {
        self.archive.iter()
    }

    pub(crate) const fn active_map(&self) -> &BTreeMap<RequirementId, Requirement> {
        &self.active
    }

    pub(crate) const fn archive_map(&self) -> &BTreeMap<RequirementId, Requirement> {
        &self.archive
    }

    /// The ID the next [`Store::add`] will assign.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured prefix is invalid.
    pub fn next_id(&self) -> Result<RequirementId, InvalidPrefixError> {
        let highest = self
            .active
            .keys()
            .chain(self.archive.keys())
            .map(|id| id.number().get())
            .max()
            .unwrap_or(0)
            .max(self.config.last_id);

        Ok(RequirementId::new(
            self.config.prefix()?,
            NonZeroUsize::MIN.saturating_add(highest),
        ))
    }

    /// Add a new requirement to the active store.
    ///
    /// # Errors
    ///
    /// Fails if the description or a tag is blank, or if the configured
    /// prefix is invalid.
    pub fn add(&mut self, new: NewRequirement) -> Result<RequirementId, StoreError> {
        let description = non_empty(&new.description, ValidationError::EmptyDescription)?;
        let tags = clean_tags(&new.tags)?;
        let id = self.next_id()?;

        let detail = format!("created from {}", new.source);
        let mut requirement = Requirement {
            description,
            source: new.source,
            priority: new.priority,
            status: new.status,
            tags: tags.into_iter().collect(),
            tests: Vec::new(),
            history: Vec::new(),
            last_verified: None,
            github_issue: None,
            created: Utc::now(),
        };
        requirement.record(HistoryEntry::now(
            HistoryKind::Created,
            detail,
            self.actor.as_deref(),
        ));

        self.config.last_id = id.number().get();
        self.active.insert(id.clone(), requirement);

        tracing::info!("Added requirement {}", id.display(self.config.digits()));
        Ok(id)
    }

    /// Link an extracted test to a requirement, snapshotting its current
    /// fingerprint.
    ///
    /// # Errors
    ///
    /// Fails if the runner is blank, the requirement does not exist or the
    /// test is already linked.
    pub fn link(
        &mut self,
        id: &RequirementId,
        test: &ExtractedTest,
        runner: &str,
    ) -> Result<(), StoreError> {
        let runner = non_empty(runner, ValidationError::EmptyRunner)?;
        let requirement = active_mut(&mut self.active, id)?;

        if requirement.link(&test.file, &test.identifier).is_some() {
            return Err(StoreError::AlreadyLinked {
                id: id.clone(),
                file: test.file.clone(),
                identifier: test.identifier.clone(),
            });
        }

        requirement.tests.push(TestLink {
            file: test.file.clone(),
            identifier: test.identifier.clone(),
            runner,
            hash: test.hash.clone(),
            linked_at: Utc::now(),
            confirmation: None,
        });
        requirement.record(HistoryEntry::now(
            HistoryKind::Linked,
            format!("{} :: {} [{}]", test.file, test.identifier, test.hash.short()),
            self.actor.as_deref(),
        ));

        tracing::info!("Linked {} to '{}' in {}", id, test.identifier, test.file);
        Ok(())
    }

    /// Refresh the stored fingerprint of an existing link.
    ///
    /// This is the only way a link's hash changes. Any confirmation is kept,
    /// so a test whose body changed reads as stale until it is re-assessed.
    /// Returns `false` if the fingerprint was already current.
    ///
    /// # Errors
    ///
    /// Fails if the requirement or the link does not exist.
    pub fn relink(&mut self, id: &RequirementId, test: &ExtractedTest) -> Result<bool, StoreError> {
        let requirement = active_mut(&mut self.active, id)?;
        let link = requirement
            .link_mut(&test.file, &test.identifier)
            .ok_or_else(|| link_not_found(id, &test.file, &test.identifier))?;

        if link.hash == test.hash {
            return Ok(false);
        }

        let detail = format!(
            "{} :: {} {}",
            test.file,
            test.identifier,
            history::transition(link.hash.short(), test.hash.short())
        );
        link.hash = test.hash.clone();
        link.linked_at = Utc::now();
        requirement.record(HistoryEntry::now(
            HistoryKind::Relinked,
            detail,
            self.actor.as_deref(),
        ));
        Ok(true)
    }

    /// Remove a test link.
    ///
    /// # Errors
    ///
    /// Fails if the requirement or the link does not exist.
    pub fn unlink(
        &mut self,
        id: &RequirementId,
        file: &str,
        identifier: &str,
    ) -> Result<(), StoreError> {
        let requirement = active_mut(&mut self.active, id)?;
        let position = requirement
            .tests
            .iter()
            .position(|link| link.is(file, identifier))
            .ok_or_else(|| link_not_found(id, file, identifier))?;

        requirement.tests.remove(position);
        requirement.record(HistoryEntry::now(
            HistoryKind::Unlinked,
            format!("{file} :: {identifier}"),
            self.actor.as_deref(),
        ));

        tracing::info!("Unlinked {id} from '{identifier}' in {file}");
        Ok(())
    }

    /// Record an assessment of a linked test.
    ///
    /// `assessed` is the fingerprint of the body that was actually assessed.
    /// If it differs from the link's stored hash the requirement will read as
    /// stale.
    ///
    /// # Errors
    ///
    /// Fails if the verdict is blank or the requirement or link does not
    /// exist.
    pub fn confirm(
        &mut self,
        id: &RequirementId,
        file: &str,
        identifier: &str,
        verdict: &str,
        assessed: Fingerprint,
    ) -> Result<(), StoreError> {
        let verdict = non_empty(verdict, ValidationError::EmptyVerdict)?;
        let requirement = active_mut(&mut self.active, id)?;
        let link = requirement
            .link_mut(file, identifier)
            .ok_or_else(|| link_not_found(id, file, identifier))?;

        let detail = format!("{file} :: {identifier} [{}]: {verdict}", assessed.short());
        link.confirmation = Some(Confirmation {
            verdict,
            at: Utc::now(),
            hash: assessed,
        });
        requirement.record(HistoryEntry::now(
            HistoryKind::Confirmed,
            detail,
            self.actor.as_deref(),
        ));
        Ok(())
    }

    /// Set the priority. Returns `false` (and records nothing) if unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist.
    pub fn set_priority(
        &mut self,
        id: &RequirementId,
        priority: Priority,
    ) -> Result<bool, StoreError> {
        self.apply(id, &Edit::Priority(priority))
    }

    /// Set the status. Returns `false` (and records nothing) if unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist.
    pub fn set_status(&mut self, id: &RequirementId, status: Status) -> Result<bool, StoreError> {
        self.apply(id, &Edit::Status(status))
    }

    /// Add and remove tags in one change.
    ///
    /// Tags already present are not re-added and absent tags are not
    /// removed; if nothing remains to do, nothing is recorded.
    ///
    /// # Errors
    ///
    /// Fails if a tag is blank or the requirement does not exist.
    pub fn edit_tags(
        &mut self,
        id: &RequirementId,
        add: &[String],
        remove: &[String],
    ) -> Result<bool, StoreError> {
        self.apply(
            id,
            &Edit::Tags {
                add: add.to_vec(),
                remove: remove.to_vec(),
            },
        )
    }

    /// Replace the description. Returns `false` if unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the description is blank or the requirement does not exist.
    pub fn set_description(
        &mut self,
        id: &RequirementId,
        description: &str,
    ) -> Result<bool, StoreError> {
        let description = non_empty(description, ValidationError::EmptyDescription)?;
        let requirement = active_mut(&mut self.active, id)?;
        if requirement.description == description {
            return Ok(false);
        }

        let detail = format!(
            "description: {}",
            history::transition(&requirement.description, &description)
        );
        requirement.description = description;
        requirement.record(HistoryEntry::now(
            HistoryKind::Modified,
            detail,
            self.actor.as_deref(),
        ));
        Ok(true)
    }

    /// Replace the source. The capture time is not compared; only the type
    /// and reference decide whether anything changed.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist.
    pub fn set_source(&mut self, id: &RequirementId, source: Source) -> Result<bool, StoreError> {
        let requirement = active_mut(&mut self.active, id)?;
        if requirement.source.kind == source.kind
            && requirement.source.reference == source.reference
        {
            return Ok(false);
        }

        let detail = format!(
            "source: {}",
            history::transition(&requirement.source, &source)
        );
        requirement.source = source;
        requirement.record(HistoryEntry::now(
            HistoryKind::Modified,
            detail,
            self.actor.as_deref(),
        ));
        Ok(true)
    }

    /// Apply `edit` to one requirement. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Fails if the edit is malformed or the requirement does not exist.
    pub fn apply(&mut self, id: &RequirementId, edit: &Edit) -> Result<bool, StoreError> {
        let edit = validate(edit)?;
        let requirement = active_mut(&mut self.active, id)?;
        Ok(apply_edit(requirement, &edit, self.actor.as_deref()))
    }

    /// Apply `edit` to every listed requirement present in the active store.
    ///
    /// Unknown IDs are skipped. Returns the number of requirements that
    /// actually changed.
    ///
    /// # Errors
    ///
    /// Fails, changing nothing, if the edit is malformed.
    pub fn bulk(&mut self, ids: &[RequirementId], edit: &Edit) -> Result<usize, StoreError> {
        let edit = validate(edit)?;
        let mut modified = 0;

        for id in ids {
            let Some(requirement) = self.active.get_mut(id) else {
                tracing::debug!("Skipping unknown requirement {id}");
                continue;
            };
            if apply_edit(requirement, &edit, self.actor.as_deref()) {
                modified += 1;
            }
        }

        tracing::info!("Bulk edit changed {modified} of {} requirements", ids.len());
        Ok(modified)
    }

    /// Associate a GitHub issue. Returns `false` if the same issue was
    /// already recorded.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist.
    pub fn link_github(
        &mut self,
        id: &RequirementId,
        issue: GithubIssue,
    ) -> Result<bool, StoreError> {
        let requirement = active_mut(&mut self.active, id)?;
        if requirement.github_issue.as_ref() == Some(&issue) {
            return Ok(false);
        }

        let detail = format!("#{} {} ({})", issue.number, issue.title, issue.state);
        requirement.github_issue = Some(issue);
        requirement.record(HistoryEntry::now(
            HistoryKind::GithubLinked,
            detail,
            self.actor.as_deref(),
        ));
        Ok(true)
    }

    /// Remove the GitHub issue association. Returns `false` if there was
    /// none.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist.
    pub fn unlink_github(&mut self, id: &RequirementId) -> Result<bool, StoreError> {
        let requirement = active_mut(&mut self.active, id)?;
        let Some(issue) = requirement.github_issue.take() else {
            return Ok(false);
        };

        requirement.record(HistoryEntry::now(
            HistoryKind::GithubUnlinked,
            format!("#{}", issue.number),
            self.actor.as_deref(),
        ));
        Ok(true)
    }

    /// Move a requirement from the active store to the archive.
    ///
    /// # Errors
    ///
    /// Fails if the requirement is not active, or if the archive already
    /// holds the ID.
    pub fn archive(&mut self, id: &RequirementId, reason: Option<&str>) -> Result<(), StoreError> {
        if !self.active.contains_key(id) {
            return Err(StoreError::NotFound(id.clone()));
        }
        if self.archive.contains_key(id) {
            return Err(StoreError::Conflict(id.clone()));
        }

        let Some(mut requirement) = self.active.remove(id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        requirement.record(HistoryEntry::now(
            HistoryKind::Archived,
            reason.unwrap_or("archived"),
            self.actor.as_deref(),
        ));
        self.archive.insert(id.clone(), requirement);

        tracing::info!("Archived requirement {id}");
        Ok(())
    }

    /// Move a requirement from the archive back to the active store.
    ///
    /// # Errors
    ///
    /// Fails if the requirement is not archived, or with
    /// [`StoreError::Conflict`] if the active store already holds the ID. In
    /// both cases neither store is changed.
    pub fn restore(&mut self, id: &RequirementId) -> Result<(), StoreError> {
        if !self.archive.contains_key(id) {
            return Err(StoreError::ArchivedNotFound(id.clone()));
        }
        if self.active.contains_key(id) {
            return Err(StoreError::Conflict(id.clone()));
        }

        let Some(mut requirement) = self.archive.remove(id) else {
            return Err(StoreError::ArchivedNotFound(id.clone()));
        };
        requirement.record(HistoryEntry::now(
            HistoryKind::Restored,
            "restored",
            self.actor.as_deref(),
        ));
        self.active.insert(id.clone(), requirement);

        tracing::info!("Restored requirement {id}");
        Ok(())
    }

    /// Cache a verification result on a requirement.
    ///
    /// This is not a state transition, so no history is recorded.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist.
    pub fn record_snapshot(
        &mut self,
        id: &RequirementId,
        status: VerificationStatus,
    ) -> Result<(), StoreError> {
        let requirement = active_mut(&mut self.active, id)?;
        requirement.last_verified = Some(VerificationSnapshot {
            status,
            at: Utc::now(),
            links: links_fingerprint(&requirement.tests),
        });
        Ok(())
    }
}

fn validate(edit: &Edit) -> Result<Edit, ValidationError> {
    Ok(match edit {
        Edit::Tags { add, remove } => Edit::Tags {
            add: clean_tags(add)?,
            remove: clean_tags(remove)?,
        },
        other => other.clone(),
    })
}

fn apply_edit(requirement: &mut Requirement, edit: &Edit, by: Option<&str>) -> bool {
    let entry = match edit {
        Edit::Priority(priority) => {
            if requirement.priority == *priority {
                return false;
            }
            let detail = history::transition(requirement.priority, priority);
            requirement.priority = *priority;
            HistoryEntry::now(HistoryKind::PriorityChanged, detail, by)
        }
        Edit::Status(status) => {
            if requirement.status == *status {
                return false;
            }
            let detail = history::transition(requirement.status, status);
            requirement.status = *status;
            HistoryEntry::now(HistoryKind::StatusChanged, detail, by)
        }
        Edit::Tags { add, remove } => {
            let added: Vec<String> = add
                .iter()
                .filter(|tag| !requirement.tags.contains(*tag) && !remove.contains(*tag))
                .cloned()
                .collect();
            let removed: Vec<String> = remove
                .iter()
                .filter(|tag| requirement.tags.contains(*tag))
                .cloned()
                .collect();
            if added.is_empty() && removed.is_empty() {
                return false;
            }
            for tag in &removed {
                requirement.tags.remove(tag);
            }
            requirement.tags.extend(added.iter().cloned());
            HistoryEntry::now(
                HistoryKind::TagsChanged,
                history::tag_change(&added, &removed),
                by,
            )
        }
    };

    requirement.record(entry);
    true
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        domain::verification::{LiveTests, classify},
        extract::extract,
    };

    fn id(s: &str) -> RequirementId {
        s.parse().unwrap()
    }

    fn store_with(n: usize) -> Store {
        let mut store = Store::new(Config::default());
        for i in 1..=n {
            store
                .add(NewRequirement::new(format!("requirement {i}")))
                .unwrap();
        }
        store
    }

    fn extracted(content: &str, identifier: &str) -> ExtractedTest {
        extract(content, Path::new("math.test.ts"), Path::new("math.test.ts"))
            .into_iter()
            .find(|t| t.identifier == identifier)
            .unwrap()
    }

    fn kinds(requirement: &Requirement) -> Vec<HistoryKind> {
        requirement.history().iter().map(|e| e.kind).collect()
    }

    const ORIGINAL: &str = "test('adds two numbers', () => { expect(1+1).toBe(2); })";
    const EDITED: &str = "test('adds two numbers', () => { expect(1+1).toBe(3); })";

    #[test]
    fn ids_are_sequential() {
        let mut store = Store::new(Config::default());
        let first = store.add(NewRequirement::new("one")).unwrap();
        let second = store.add(NewRequirement::new("two")).unwrap();
        assert_eq!(first.to_string(), "REQ-001");
        assert_eq!(second.to_string(), "REQ-002");
    }

    #[test]
    fn add_records_created_history() {
        let store = store_with(1);
        let requirement = store.get(&id("REQ-001")).unwrap();
        assert_eq!(kinds(requirement), [HistoryKind::Created]);
        assert_eq!(requirement.priority(), Priority::Medium);
    }

    #[test]
    fn blank_description_is_rejected_without_mutation() {
        let mut store = store_with(1);
        let before = store.clone();
        assert_eq!(
            store.add(NewRequirement::new("   ")),
            Err(StoreError::Validation(ValidationError::EmptyDescription))
        );
        assert_eq!(store, before);
    }

    #[test]
    fn ids_are_not_reused_after_archiving() {
        let mut store = store_with(3);
        store.archive(&id("REQ-003"), None).unwrap();
        let next = store.add(NewRequirement::new("four")).unwrap();
        assert_eq!(next, id("REQ-004"));
    }

    #[test]
    fn ids_respect_the_high_water_mark() {
        let mut store = Store::new(Config::default());
        store.config_mut().last_id = 41;
        assert_eq!(store.add(NewRequirement::new("x")).unwrap(), id("REQ-042"));
    }

    #[test]
    fn from_parts_rejects_overlapping_stores() {
        let store = store_with(1);
        let active = store.active_map().clone();
        let result = Store::from_parts(Config::default(), active.clone(), active);
        assert_eq!(result.unwrap_err(), id("REQ-001"));
    }

    #[test]
    fn link_snapshots_the_hash() {
        let mut store = store_with(1);
        let test = extracted(ORIGINAL, "adds two numbers");
        store.link(&id("REQ-001"), &test, "jest").unwrap();

        let requirement = store.get(&id("REQ-001")).unwrap();
        assert_eq!(requirement.tests().len(), 1);
        assert_eq!(requirement.tests()[0].hash(), &test.hash);
        assert_eq!(kinds(requirement), [HistoryKind::Created, HistoryKind::Linked]);
    }

    #[test]
    fn linking_twice_is_a_conflict() {
        let mut store = store_with(1);
        let test = extracted(ORIGINAL, "adds two numbers");
        store.link(&id("REQ-001"), &test, "jest").unwrap();
        assert!(matches!(
            store.link(&id("REQ-001"), &test, "jest"),
            Err(StoreError::AlreadyLinked { .. })
        ));
    }

    #[test]
    fn link_to_unknown_requirement_is_not_found() {
        let mut store = store_with(1);
        let test = extracted(ORIGINAL, "adds two numbers");
        assert_eq!(
            store.link(&id("REQ-009"), &test, "jest"),
            Err(StoreError::NotFound(id("REQ-009")))
        );
    }

    #[test]
    fn unlink_removes_the_link() {
        let mut store = store_with(1);
        let test = extracted(ORIGINAL, "adds two numbers");
        store.link(&id("REQ-001"), &test, "jest").unwrap();
        store
            .unlink(&id("REQ-001"), "math.test.ts", "adds two numbers")
            .unwrap();

        let requirement = store.get(&id("REQ-001")).unwrap();
        assert!(requirement.tests().is_empty());
        assert_eq!(requirement.history().last().unwrap().kind, HistoryKind::Unlinked);
    }

    #[test]
    fn unlink_missing_link_is_not_found() {
        let mut store = store_with(1);
        let before = store.clone();
        assert!(matches!(
            store.unlink(&id("REQ-001"), "math.test.ts", "nope"),
            Err(StoreError::LinkNotFound { .. })
        ));
        assert_eq!(store, before);
    }

    #[test]
    fn verified_requirement_goes_stale_when_the_test_is_edited() {
        let mut store = store_with(1);
        let original = extracted(ORIGINAL, "adds two numbers");
        let req = id("REQ-001");
        store.link(&req, &original, "jest").unwrap();
        store
            .confirm(
                &req,
                "math.test.ts",
                "adds two numbers",
                "asserts addition",
                original.hash.clone(),
            )
            .unwrap();
        assert_eq!(
            classify(store.get(&req).unwrap(), None),
            VerificationStatus::Verified
        );

        let edited = extracted(EDITED, "adds two numbers");
        assert_ne!(original.hash, edited.hash);

        let mut live = LiveTests::default();
        live.insert_scanned("math.test.ts", [&edited]);
        assert_eq!(
            classify(store.get(&req).unwrap(), Some(&live)),
            VerificationStatus::Stale
        );

        // An explicit relink keeps the old confirmation, so it is still stale
        // (now without needing the live scan) until re-confirmed.
        assert!(store.relink(&req, &edited).unwrap());
        assert_eq!(
            classify(store.get(&req).unwrap(), None),
            VerificationStatus::Stale
        );

        store
            .confirm(&req, "math.test.ts", "adds two numbers", "ok", edited.hash.clone())
            .unwrap();
        assert_eq!(
            classify(store.get(&req).unwrap(), Some(&live)),
            VerificationStatus::Verified
        );
    }

    #[test]
    fn relink_with_unchanged_hash_is_a_no_op() {
        let mut store = store_with(1);
        let test = extracted(ORIGINAL, "adds two numbers");
        store.link(&id("REQ-001"), &test, "jest").unwrap();
        let before = store.clone();
        assert!(!store.relink(&id("REQ-001"), &test).unwrap());
        assert_eq!(store, before);
    }

    #[test]
    fn unchanged_field_records_nothing() {
        let mut store = store_with(1);
        let before = store.clone();
        assert!(!store.set_priority(&id("REQ-001"), Priority::Medium).unwrap());
        assert!(!store.set_status(&id("REQ-001"), Status::Draft).unwrap());
        assert!(!store.set_description(&id("REQ-001"), "requirement 1").unwrap());
        assert!(!store.edit_tags(&id("REQ-001"), &[], &["absent".into()]).unwrap());
        assert_eq!(store, before);
    }

    #[test]
    fn changed_priority_records_transition() {
        let mut store = store_with(1);
        assert!(store.set_priority(&id("REQ-001"), Priority::Critical).unwrap());
        let entry = store.get(&id("REQ-001")).unwrap().history().last().unwrap().clone();
        assert_eq!(entry.kind, HistoryKind::PriorityChanged);
        assert_eq!(entry.detail, "medium → critical");
    }

    #[test]
    fn tag_edit_records_one_entry() {
        let mut store = store_with(1);
        store
            .edit_tags(&id("REQ-001"), &["ui".into(), "api".into()], &[])
            .unwrap();
        store
            .edit_tags(&id("REQ-001"), &["perf".into(), "ui".into()], &["api".into()])
            .unwrap();

        let requirement = store.get(&id("REQ-001")).unwrap();
        let tags: Vec<_> = requirement.tags().iter().map(String::as_str).collect();
        assert_eq!(tags, ["perf", "ui"]);

        let details: Vec<_> = requirement
            .history()
            .iter()
            .filter(|e| e.kind == HistoryKind::TagsChanged)
            .map(|e| e.detail.as_str())
            .collect();
        assert_eq!(details, ["added: ui, api", "added: perf; removed: api"]);
    }

    #[test]
    fn source_change_ignores_capture_time() {
        let mut store = store_with(1);
        assert!(!store.set_source(&id("REQ-001"), Source::default()).unwrap());
        assert!(
            store
                .set_source(&id("REQ-001"), Source::new(crate::domain::SourceType::Jira, "PRJ-1"))
                .unwrap()
        );
        let entry = store.get(&id("REQ-001")).unwrap().history().last().unwrap().clone();
        assert_eq!(entry.kind, HistoryKind::Modified);
        assert_eq!(entry.detail, "source: manual → jira (PRJ-1)");
    }

    #[test]
    fn bulk_counts_only_changed_requirements() {
        let mut store = store_with(3);
        store.set_priority(&id("REQ-002"), Priority::High).unwrap();

        let ids = [id("REQ-001"), id("REQ-002"), id("REQ-003"), id("REQ-099")];
        let modified = store.bulk(&ids, &Edit::Priority(Priority::High)).unwrap();
        assert_eq!(modified, 2);
    }

    #[test]
    fn bulk_with_blank_tag_changes_nothing() {
        let mut store = store_with(2);
        let before = store.clone();
        let edit = Edit::Tags {
            add: vec!["ok".into(), " ".into()],
            remove: Vec::new(),
        };
        assert_eq!(
            store.bulk(&[id("REQ-001"), id("REQ-002")], &edit),
            Err(StoreError::Validation(ValidationError::EmptyTag))
        );
        assert_eq!(store, before);
    }

    #[test]
    fn archive_and_restore_move_the_record() {
        let mut store = store_with(7);
        let req = id("REQ-007");

        store.archive(&req, Some("superseded")).unwrap();
        assert!(store.get(&req).is_none());
        let archived = store.get_archived(&req).unwrap();
        let last = archived.history().last().unwrap();
        assert_eq!(last.kind, HistoryKind::Archived);
        assert_eq!(last.detail, "superseded");
        assert_eq!(store.locate(&req), Some(Location::Archive));

        store.restore(&req).unwrap();
        assert!(store.get_archived(&req).is_none());
        assert_eq!(
            kinds(store.get(&req).unwrap()),
            [HistoryKind::Created, HistoryKind::Archived, HistoryKind::Restored]
        );
        assert_eq!(store.locate(&req), Some(Location::Active));
    }

    #[test]
    fn restore_into_occupied_id_is_a_conflict() {
        let mut store = store_with(1);
        let req = id("REQ-001");
        let record = store.get(&req).unwrap().clone();
        store.archive.insert(req.clone(), record);
        let before = store.clone();

        assert_eq!(store.restore(&req), Err(StoreError::Conflict(req)));
        assert_eq!(store, before);
    }

    #[test]
    fn archive_unknown_is_not_found() {
        let mut store = store_with(1);
        assert_eq!(
            store.archive(&id("REQ-002"), None),
            Err(StoreError::NotFound(id("REQ-002")))
        );
        assert_eq!(
            store.restore(&id("REQ-001")),
            Err(StoreError::ArchivedNotFound(id("REQ-001")))
        );
    }

    #[test]
    fn every_id_lives_in_exactly_one_store() {
        let mut store = store_with(5);
        store.archive(&id("REQ-002"), None).unwrap();
        store.archive(&id("REQ-004"), None).unwrap();
        store.restore(&id("REQ-002")).unwrap();
        store.add(NewRequirement::new("six")).unwrap();

        for n in 1..=6 {
            let req = id(&format!("REQ-{n}"));
            let count = usize::from(store.get(&req).is_some())
                + usize::from(store.get_archived(&req).is_some());
            assert_eq!(count, 1, "{req}");
        }
    }

    #[test]
    fn github_link_and_unlink() {
        let mut store = store_with(1);
        let issue = GithubIssue {
            number: 12,
            state: "open".into(),
            title: "Add numbers".into(),
        };
        assert!(store.link_github(&id("REQ-001"), issue.clone()).unwrap());
        assert!(!store.link_github(&id("REQ-001"), issue).unwrap());
        assert!(store.unlink_github(&id("REQ-001")).unwrap());
        assert!(!store.unlink_github(&id("REQ-001")).unwrap());
        assert_eq!(
            kinds(store.get(&id("REQ-001")).unwrap()),
            [
                HistoryKind::Created,
                HistoryKind::GithubLinked,
                HistoryKind::GithubUnlinked
            ]
        );
    }

    #[test]
    fn snapshot_is_current_until_links_change() {
        let mut store = store_with(1);
        let req = id("REQ-001");
        let test = extracted(ORIGINAL, "adds two numbers");
        store.link(&req, &test, "jest").unwrap();
        store
            .record_snapshot(&req, VerificationStatus::Unverified)
            .unwrap();

        let requirement = store.get(&req).unwrap();
        let snapshot = requirement.last_verified().unwrap();
        assert!(snapshot.is_current(requirement));
        let history_len = requirement.history().len();

        store
            .confirm(&req, "math.test.ts", "adds two numbers", "ok", test.hash.clone())
            .unwrap();
        let requirement = store.get(&req).unwrap();
        assert!(!requirement.last_verified().unwrap().is_current(requirement));
        assert_eq!(requirement.history().len(), history_len + 1);
    }
}
