//! All-or-nothing replacement of several documents.
//!
//! Each document is first staged beside its target and flushed. A journal
//! listing the staged files is then written atomically, and only after that
//! are the staged files renamed into place. If the process dies part way
//! through the renames, [`recover`] finishes them on the next start, so the
//! documents either all change or none do.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::storage::document::{self, LoadError};

/// File name of the journal within the store directory.
pub const JOURNAL_FILE: &str = "journal.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Journal {
    /// File names (relative to the store directory) to move into place.
    targets: Vec<String>,
}

/// A set of staged document writes.
#[derive(Debug)]
pub struct Transaction {
    dir: PathBuf,
    targets: Vec<String>,
}

impl Transaction {
    /// Begin a transaction over documents in `dir`.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            targets: Vec::new(),
        }
    }

    /// Stage new contents for the document `name`.
    ///
    /// Nothing visible changes until [`Transaction::commit`].
    ///
    /// # Errors
    ///
    /// Returns an error if the staged file cannot be written.
    pub fn stage(&mut self, name: &str, contents: &str) -> io::Result<()> {
        document::stage(&self.dir.join(name), contents)?;
        self.targets.push(name.to_string());
        Ok(())
    }

    /// Move every staged document into place.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be written or a rename fails. A
    /// failure after the journal is written is completed by [`recover`].
    pub fn commit(self) -> io::Result<()> {
        let journal = Journal {
            targets: self.targets,
        };
        let text = serde_yaml::to_string(&journal).expect("this must never fail");
        let journal_path = self.dir.join(JOURNAL_FILE);
        document::write_atomic(&journal_path, &text)?;

        apply(&self.dir, &journal)?;
        fs::remove_file(&journal_path)?;

        tracing::debug!("Committed {} documents", journal.targets.len());
        Ok(())
    }
}

fn apply(dir: &Path, journal: &Journal) -> io::Result<()> {
    for name in &journal.targets {
        let target = dir.join(name);
        let temp = document::temp_path(&target);
        if temp.exists() {
            fs::rename(&temp, &target)?;
        }
    }
    Ok(())
}

/// Bring the store directory to a consistent state.
///
/// A journal left behind by an interrupted commit is rolled forward. Staged
/// files not covered by a journal belong to a commit that never happened and
/// are deleted. Returns whether a commit was rolled forward.
///
/// # Errors
///
/// Returns an error if the journal cannot be read or the renames fail.
pub fn recover(dir: &Path) -> Result<bool, LoadError> {
    let journal_path = dir.join(JOURNAL_FILE);
    let rolled_forward = match fs::read_to_string(&journal_path) {
        Ok(text) => {
            let journal: Journal = serde_yaml::from_str(&text)
                .map_err(|e| LoadError::Journal(format!("{}: {e}", journal_path.display())))?;
            tracing::warn!(
                "Completing an interrupted commit of {}",
                journal.targets.join(", ")
            );
            apply(dir, &journal).map_err(|e| LoadError::Journal(e.to_string()))?;
            fs::remove_file(&journal_path).map_err(|e| LoadError::Journal(e.to_string()))?;
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(source) => {
            return Err(LoadError::Io {
                path: journal_path,
                source,
            });
        }
    };

    remove_stray_temps(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(rolled_forward)
}

fn remove_stray_temps(dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            tracing::debug!("Removing uncommitted {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
