//! Finding test files and extracting their tests in parallel.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use nonempty::NonEmpty;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use walkdir::WalkDir;

use crate::{
    domain::{Config, LiveTests},
    extract::{ExtractedTest, extract, path_key},
};

/// Compiled `config.test_globs`.
///
/// Patterns match `/`-separated paths relative to the project root. `*` and
/// `?` never cross a `/`; `**` matches any number of directories, and
/// `{a,b}` alternation and `[...]` classes are supported.
#[derive(Debug, Clone)]
pub struct TestGlobs(GlobSet);

impl TestGlobs {
    /// Compile a list of glob patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is malformed.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                GlobBuilder::new(pattern.as_ref())
                    .literal_separator(true)
                    .build()?,
            );
        }
        builder.build().map(Self)
    }

    /// Whether `path` (relative, `/`-separated) matches any pattern.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.0.is_match(path)
    }
}

/// Files that could not be read during a scan.
#[derive(Debug, thiserror::Error)]
pub struct ScanError {
    failures: NonEmpty<(PathBuf, io::Error)>,
}

impl ScanError {
    /// Every failed path with its error.
    #[must_use]
    pub const fn failures(&self) -> &NonEmpty<(PathBuf, io::Error)> {
        &self.failures
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_DISPLAY: usize = 5;

        write!(f, "failed to read test files: ")?;

        let total = self.failures.len();

        let displayed_paths: Vec<String> = self
            .failures
            .iter()
            .take(MAX_DISPLAY)
            .map(|(p, e)| format!("{} ({e})", p.display()))
            .collect();

        let msg = displayed_paths.join(", ");

        if total <= MAX_DISPLAY {
            write!(f, "{msg}")
        } else {
            write!(f, "{msg}... (and {} more)", total - MAX_DISPLAY)
        }
    }
}

/// Every file under `root` selected by the configured test globs, as
/// root-relative paths, sorted.
///
/// Directories named in `config.ignore_dirs` are not entered.
///
/// # Errors
///
/// Returns an error if a test glob is invalid.
pub fn discover(root: &Path, config: &Config) -> Result<Vec<PathBuf>, globset::Error> {
    let globs = TestGlobs::new(&config.test_globs)?;

    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !config
                    .ignore_dirs
                    .iter()
                    .any(|dir| entry.file_name() == dir.as_str())
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|relative| globs.is_match(&path_key(relative)))
        .collect();

    paths.sort();
    tracing::debug!("Discovered {} test files under {}", paths.len(), root.display());
    Ok(paths)
}

enum Outcome {
    Missing(PathBuf),
    Scanned(PathBuf, Vec<ExtractedTest>),
}

fn scan_file(root: &Path, relative: &Path) -> Result<Outcome, (PathBuf, io::Error)> {
    let path = root.join(relative);
    match fs::read_to_string(&path) {
        Ok(content) => Ok(Outcome::Scanned(
            relative.to_path_buf(),
            extract(&content, &path, relative),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Ok(Outcome::Missing(relative.to_path_buf()))
        }
        Err(e) => Err((path, e)),
    }
}

/// Read and extract `files` (relative to `root`) in parallel.
///
/// Missing files are recorded as such. Any other read failure aborts the
/// whole scan, so callers never act on a partial index.
///
/// # Errors
///
/// Returns every file that could not be read.
pub fn scan(root: &Path, files: &[PathBuf]) -> Result<Scan, ScanError> {
    let (outcomes, failures): (Vec<_>, Vec<_>) = files
        .par_iter()
        .map(|relative| scan_file(root, relative))
        .partition(Result::is_ok);

    let failures: Vec<_> = failures.into_iter().filter_map(Result::err).collect();
    if let Some(failures) = NonEmpty::from_vec(failures) {
        return Err(ScanError { failures });
    }

    let mut result = Scan::default();
    for outcome in outcomes.into_iter().filter_map(Result::ok) {
        match outcome {
            Outcome::Missing(relative) => {
                tracing::debug!("{} no longer exists", relative.display());
                result.live.insert_missing(path_key(&relative));
            }
            Outcome::Scanned(relative, tests) => {
                result.live.insert_scanned(path_key(&relative), &tests);
                result.tests.extend(tests);
            }
        }
    }

    Ok(result)
}

/// The aggregated result of [`scan`].
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Live fingerprints for classification.
    pub live: LiveTests,
    /// Every extracted test, grouped by file in input order.
    pub tests: Vec<ExtractedTest>,
}
