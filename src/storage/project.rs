//! A requirement store persisted under a project root.
//!
//! A [`Project`] loads both store documents, hands out the in-memory
//! [`Store`] for pure transforms, and writes back whichever documents changed
//! on [`Project::flush`]. Operations that need to look at test source (linking,
//! confirming, coverage checks) read the files relative to the project root.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Component, Path, PathBuf},
};

use crate::{
    domain::{
        Config, Location, Report, RequirementId, Store, StoreError, VerificationStatus, coverage,
    },
    extract::{ExtractedTest, extract, path_key},
    storage::{
        document::{Document, LoadError, write_atomic},
        scan::{self, ScanError},
        transaction::{self, Transaction},
    },
};

/// Directory holding the store documents, relative to the project root.
pub const STORE_DIR: &str = ".req";

/// File name of the active requirements document.
pub const ACTIVE_FILE: &str = "requirements.yaml";

/// File name of the archive document.
pub const ARCHIVE_FILE: &str = "archive.yaml";

/// Errors that can occur when working with a project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// There is no requirement store under the root.
    #[error("no requirement store found in {} (run `reqtrace init` first)", .0.display())]
    NotInitialised(PathBuf),

    /// `init` was run where a store already exists.
    #[error("a requirement store already exists in {}", .0.display())]
    AlreadyInitialised(PathBuf),

    /// A test file path does not lie under the project root.
    #[error("{} is outside the project root", .0.display())]
    OutsideRoot(PathBuf),

    /// A store operation was rejected.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store documents could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Test files could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A configured test glob is invalid.
    #[error("invalid test glob: {0}")]
    Glob(#[from] globset::Error),

    /// A test file could not be read.
    #[error("failed to read {}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The store documents could not be written.
    #[error("failed to write the requirement store")]
    Write(#[from] io::Error),
}

/// A requirement store rooted at a project directory.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    store: Store,
    saved: Store,
}

impl Project {
    /// Create an empty store under `root`.
    ///
    /// An interrupted commit is completed first. If an archive document
    /// survives without its active document, its requirements are kept and
    /// new IDs continue above them.
    ///
    /// # Errors
    ///
    /// Fails if a store already exists, a surviving document is unreadable,
    /// or the documents cannot be written.
    pub fn init(root: PathBuf, mut config: Config) -> Result<Self, ProjectError> {
        let dir = root.join(STORE_DIR);
        transaction::recover(&dir)?;
        if dir.join(ACTIVE_FILE).exists() {
            return Err(ProjectError::AlreadyInitialised(root));
        }
        fs::create_dir_all(&dir)?;

        let archive = Document::read(&dir.join(ARCHIVE_FILE))?;
        if !archive.requirements.is_empty() {
            tracing::warn!(
                "Keeping {} archived requirements from an earlier store",
                archive.requirements.len()
            );
        }
        config.last_id = config.last_id.max(archive.config.last_id);
        let store = Store::from_parts(config, BTreeMap::new(), archive.requirements)
            .map_err(LoadError::DuplicateId)?;
        let mut project = Self {
            root,
            saved: store.clone(),
            store,
        };
        project.write(true, true)?;

        tracing::info!("Initialised requirement store in {}", dir.display());
        Ok(project)
    }

    /// Load the store under `root`, first completing any interrupted commit.
    ///
    /// # Errors
    ///
    /// Fails if there is no store, a document is unreadable, or the two
    /// documents share an ID.
    pub fn open(root: PathBuf) -> Result<Self, ProjectError> {
        let dir = root.join(STORE_DIR);
        if !dir.is_dir() {
            return Err(ProjectError::NotInitialised(root));
        }

        transaction::recover(&dir)?;

        let active_path = dir.join(ACTIVE_FILE);
        if !active_path.exists() {
            return Err(ProjectError::NotInitialised(root));
        }
        let active = Document::read(&active_path)?;
        let archive = Document::read(&dir.join(ARCHIVE_FILE))?;

        let store = Store::from_parts(active.config, active.requirements, archive.requirements)
            .map_err(LoadError::DuplicateId)?;

        tracing::debug!(
            "Loaded {} active and {} archived requirements",
            store.requirements().count(),
            store.archived().count()
        );

        Ok(Self {
            root,
            saved: store.clone(),
            store,
        })
    }

    /// The nearest ancestor of `start` (inclusive) that holds a store.
    #[must_use]
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(STORE_DIR).join(ACTIVE_FILE).is_file())
            .map(Path::to_path_buf)
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The in-memory store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Mutable access to the in-memory store. Changes are persisted by
    /// [`Project::flush`].
    pub const fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Set who is recorded as making subsequent changes.
    pub fn set_actor(&mut self, actor: Option<String>) {
        self.store.set_actor(actor);
    }

    /// Express `path` relative to the project root.
    ///
    /// Relative paths are taken to be relative to the root already.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::OutsideRoot`] if the path escapes the root.
    pub fn relative(&self, path: &Path) -> Result<PathBuf, ProjectError> {
        if path.is_relative() {
            if path.components().any(|c| c == Component::ParentDir) {
                return Err(ProjectError::OutsideRoot(path.to_path_buf()));
            }
            return Ok(path
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect());
        }

        let root = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        path.strip_prefix(&root)
            .map(Path::to_path_buf)
            .map_err(|_| ProjectError::OutsideRoot(path.clone()))
    }

    /// Extract `identifier` from `file` as it is on disk now.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::TestNotFound`] if the file does not exist or
    /// does not define the test.
    pub fn find_test(&self, file: &Path, identifier: &str) -> Result<ExtractedTest, ProjectError> {
        let relative = self.relative(file)?;
        let path = self.root.join(&relative);
        let not_found = || StoreError::TestNotFound {
            file: path_key(&relative),
            identifier: identifier.to_string(),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found().into()),
            Err(source) => return Err(ProjectError::Read { path, source }),
        };

        extract(&content, &path, &relative)
            .into_iter()
            .find(|test| test.identifier == identifier)
            .ok_or_else(|| not_found().into())
    }

    fn require(&self, id: &RequirementId) -> Result<(), StoreError> {
        self.store
            .get(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Link a test, read from disk, to a requirement.
    ///
    /// The runner defaults to `config.default_runner`.
    ///
    /// # Errors
    ///
    /// Fails if the requirement or test does not exist, or the test is
    /// already linked.
    pub fn link(
        &mut self,
        id: &RequirementId,
        file: &Path,
        identifier: &str,
        runner: Option<&str>,
    ) -> Result<ExtractedTest, ProjectError> {
        self.require(id)?;
        let test = self.find_test(file, identifier)?;
        let runner = runner.map_or_else(
            || self.store.config().default_runner.clone(),
            str::to_string,
        );
        self.store.link(id, &test, &runner)?;
        Ok(test)
    }

    /// Refresh a link's stored fingerprint from the file on disk.
    ///
    /// # Errors
    ///
    /// Fails if the requirement, link or test does not exist.
    pub fn relink(
        &mut self,
        id: &RequirementId,
        file: &Path,
        identifier: &str,
    ) -> Result<bool, ProjectError> {
        self.require(id)?;
        let test = self.find_test(file, identifier)?;
        Ok(self.store.relink(id, &test)?)
    }

    /// Record an assessment of a linked test as it is on disk now.
    ///
    /// # Errors
    ///
    /// Fails if the verdict is blank or the requirement, link or test does
    /// not exist.
    pub fn confirm(
        &mut self,
        id: &RequirementId,
        file: &Path,
        identifier: &str,
        verdict: &str,
    ) -> Result<ExtractedTest, ProjectError> {
        self.require(id)?;
        let test = self.find_test(file, identifier)?;
        self.store
            .confirm(id, &test.file, &test.identifier, verdict, test.hash.clone())?;
        Ok(test)
    }

    /// Remove a link. The file does not need to exist.
    ///
    /// # Errors
    ///
    /// Fails if the requirement or link does not exist.
    pub fn unlink(
        &mut self,
        id: &RequirementId,
        file: &Path,
        identifier: &str,
    ) -> Result<(), ProjectError> {
        let key = path_key(&self.relative(file)?);
        Ok(self.store.unlink(id, &key, identifier)?)
    }

    /// Every file linked from an active requirement.
    #[must_use]
    pub fn linked_files(&self) -> Vec<PathBuf> {
        self.store
            .requirements()
            .flat_map(|(_, requirement)| requirement.tests())
            .map(|link| link.file())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    /// Re-extract every linked file.
    ///
    /// # Errors
    ///
    /// Fails if any linked file exists but cannot be read.
    pub fn scan(&self) -> Result<scan::Scan, ProjectError> {
        Ok(scan::scan(&self.root, &self.linked_files())?)
    }

    /// Classify every active requirement against the files on disk.
    ///
    /// With `record`, each requirement's cached snapshot is refreshed unless
    /// it is already current and agrees. Nothing is recorded unless the whole
    /// scan succeeded.
    ///
    /// # Errors
    ///
    /// Fails if any linked file exists but cannot be read.
    pub fn check(&mut self, record: bool) -> Result<Vec<Report>, ProjectError> {
        let scan = self.scan()?;
        let reports = coverage(&self.store, Some(&scan.live));

        if record {
            for report in &reports {
                if !self.snapshot_agrees(&report.id, report.status) {
                    self.store.record_snapshot(&report.id, report.status)?;
                }
            }
        }

        Ok(reports)
    }

    fn snapshot_agrees(&self, id: &RequirementId, status: VerificationStatus) -> bool {
        self.store.get(id).is_some_and(|requirement| {
            requirement
                .last_verified()
                .is_some_and(|s| s.status == status && s.is_current(requirement))
        })
    }

    /// Every test defined in the files selected by the configured globs.
    ///
    /// # Errors
    ///
    /// Fails if a glob is invalid or a test file cannot be read.
    pub fn discover(&self) -> Result<Vec<ExtractedTest>, ProjectError> {
        let files = scan::discover(&self.root, self.store.config())?;
        Ok(scan::scan(&self.root, &files)?.tests)
    }

    /// Active requirements linked to `test`.
    pub fn linked_to<'a>(
        &'a self,
        test: &'a ExtractedTest,
    ) -> impl Iterator<Item = &'a RequirementId> + 'a {
        self.store
            .requirements()
            .filter(|(_, requirement)| requirement.link(&test.file, &test.identifier).is_some())
            .map(|(id, _)| id)
    }

    fn document(&self, location: Location) -> Document {
        let requirements = match location {
            Location::Active => self.store.active_map(),
            Location::Archive => self.store.archive_map(),
        };
        Document {
            config: self.store.config().clone(),
            requirements: requirements.clone(),
        }
    }

    fn write(&mut self, active: bool, archive: bool) -> io::Result<()> {
        let dir = self.root.join(STORE_DIR);
        match (active, archive) {
            (false, false) => {}
            (true, false) => {
                write_atomic(&dir.join(ACTIVE_FILE), &self.document(Location::Active).to_yaml())?;
            }
            (false, true) => {
                write_atomic(&dir.join(ARCHIVE_FILE), &self.document(Location::Archive).to_yaml())?;
            }
            (true, true) => {
                let mut transaction = Transaction::new(dir);
                transaction.stage(ACTIVE_FILE, &self.document(Location::Active).to_yaml())?;
                transaction.stage(ARCHIVE_FILE, &self.document(Location::Archive).to_yaml())?;
                transaction.commit()?;
            }
        }
        self.saved = self.store.clone();
        Ok(())
    }

    /// Persist whichever documents changed since loading (or the last flush).
    ///
    /// When both changed they are committed together, so a move between the
    /// active store and the archive is never half-written. Returns whether
    /// anything was written.
    ///
    /// # Errors
    ///
    /// Fails if a document cannot be written.
    pub fn flush(&mut self) -> Result<bool, ProjectError> {
        let active = self.store.config() != self.saved.config()
            || self.store.active_map() != self.saved.active_map();
        let archive = self.store.archive_map() != self.saved.archive_map();

        if !active && !archive {
            tracing::debug!("No changes to write");
            return Ok(false);
        }

        self.write(active, archive)?;
        Ok(true)
    }
}
