//! The YAML documents holding the active and archived requirements.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::{Config, Requirement, RequirementId};

/// One store document: the configuration plus a map of requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Store configuration. Authoritative in the active document; the archive
    /// carries a copy.
    pub config: Config,
    /// Requirements keyed by ID.
    pub requirements: BTreeMap<RequirementId, Requirement>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "_version")]
enum DocumentVersion {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        config: Config,
        #[serde(default)]
        requirements: BTreeMap<RequirementId, Requirement>,
    },
}

impl From<DocumentVersion> for Document {
    fn from(version: DocumentVersion) -> Self {
        match version {
            DocumentVersion::V1 {
                config,
                requirements,
            } => Self {
                config,
                requirements,
            },
        }
    }
}

impl From<Document> for DocumentVersion {
    fn from(document: Document) -> Self {
        let Document {
            config,
            requirements,
        } = document;
        Self::V1 {
            config,
            requirements,
        }
    }
}

/// Errors that can occur while loading the store documents.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A document could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The document.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A document is not valid.
    #[error("failed to parse {}", path.display())]
    Yaml {
        /// The document.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The same ID appears in both the active and the archive document.
    #[error("requirement {0} appears in both the active and the archive store")]
    DuplicateId(RequirementId),

    /// An interrupted commit could not be completed.
    #[error("failed to recover an interrupted commit: {0}")]
    Journal(String),
}

impl Document {
    /// Parse a document from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid store document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<DocumentVersion>(text).map(Self::from)
    }

    /// Render the document as YAML.
    #[must_use]
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&DocumentVersion::from(self.clone())).expect("this must never fail")
    }

    /// Read a document from `path`.
    ///
    /// A missing file reads as an empty document with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} does not exist, using an empty document", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_yaml(&text).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The path a document is staged at before being renamed into place.
pub(crate) fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Write `contents` beside `target` and flush it to disk, returning the
/// staged path.
pub(crate) fn stage(target: &Path, contents: &str) -> io::Result<PathBuf> {
    let temp = temp_path(target);
    let mut file = File::create(&temp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok(temp)
}

/// Replace `target` with `contents` so that readers see either the old file or
/// the new one, never a mixture.
///
/// # Errors
///
/// Returns an error if the staged file cannot be written or renamed.
pub fn write_atomic(target: &Path, contents: &str) -> io::Result<()> {
    let temp = stage(target, contents)?;
    fs::rename(&temp, target)?;
    tracing::debug!("Wrote {}", target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{NewRequirement, Store};

    fn sample() -> Document {
        let mut store = Store::new(Config::default());
        store.add(NewRequirement::new("Adds numbers")).unwrap();
        store.add(NewRequirement::new("Subtracts numbers")).unwrap();
        Document {
            config: store.config().clone(),
            requirements: store.requirements().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    #[test]
    fn round_trips_through_yaml() {
        let document = sample();
        let yaml = document.to_yaml();
        assert!(yaml.starts_with("_version: '1'"));
        assert_eq!(Document::from_yaml(&yaml).unwrap(), document);
    }

    #[test]
    fn round_trips_every_requirement_field() {
        use std::path::Path;

        use crate::{
            domain::{GithubIssue, Priority, Source, SourceType, VerificationStatus},
            extract::extract,
        };

        let mut store = Store::new(Config::default());
        store.set_actor(Some("alice".to_string()));

        let mut new = NewRequirement::new("Exports to CSV");
        new.source = Source::new(SourceType::Jira, "PRJ-12");
        new.priority = Priority::High;
        new.tags = ["export".to_string(), "ui".to_string()].into();
        let id = store.add(new).unwrap();

        let path = Path::new("export.test.ts");
        let tests = extract("test('writes a header row', () => {});", path, path);
        store.link(&id, &tests[0], "vitest").unwrap();
        store
            .confirm(
                &id,
                &tests[0].file,
                &tests[0].identifier,
                "asserts the header",
                tests[0].hash.clone(),
            )
            .unwrap();
        store
            .link_github(
                &id,
                GithubIssue {
                    number: 42,
                    state: "open".to_string(),
                    title: "CSV export".to_string(),
                },
            )
            .unwrap();
        store.record_snapshot(&id, VerificationStatus::Verified).unwrap();

        let document = Document {
            config: store.config().clone(),
            requirements: store.requirements().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        let yaml = document.to_yaml();
        assert!(yaml.contains("lastVerified"));
        assert!(yaml.contains("githubIssue"));
        assert!(yaml.contains("by: alice"));

        let parsed = Document::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, document);

        let requirement = &parsed.requirements[&id];
        assert_eq!(requirement.tests().len(), 1);
        assert!(requirement.tests()[0].confirmation().is_some());
        assert!(requirement.last_verified().unwrap().is_current(requirement));
    }

    #[test]
    fn parses_hand_written_document() {
        let created = Utc.with_ymd_and_hms(2025, 7, 14, 7, 15, 0).unwrap();
        let yaml = r"_version: '1'
config:
  prefix: FEAT
requirements:
  FEAT-7:
    description: Export to CSV
    source:
      type: doc
      reference: design.md#export
      capturedAt: 2025-07-14T07:15:00Z
    priority: high
    created: 2025-07-14T07:15:00Z
";
        let document = Document::from_yaml(yaml).unwrap();
        let (id, requirement) = document.requirements.iter().next().unwrap();
        assert_eq!(id.to_string(), "FEAT-007");
        assert_eq!(requirement.description(), "Export to CSV");
        assert_eq!(requirement.created(), created);
        assert!(requirement.tests().is_empty());
        assert_eq!(document.config.prefix().unwrap().as_str(), "FEAT");
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(Document::from_yaml("_version: '2'\nrequirements: {}\n").is_err());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let document = Document::read(&tmp.path().join("archive.yaml")).unwrap();
        assert_eq!(document, Document::default());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("requirements.yaml");
        let document = sample();

        write_atomic(&target, &document.to_yaml()).unwrap();
        assert!(!temp_path(&target).exists());
        assert_eq!(Document::read(&target).unwrap(), document);
    }

    #[test]
    fn malformed_file_is_a_yaml_error() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("requirements.yaml");
        fs::write(&target, "_version: '1'\nrequirements: [").unwrap();
        assert!(matches!(
            Document::read(&target),
            Err(LoadError::Yaml { .. })
        ));
    }
}
