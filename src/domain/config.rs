use serde::{Deserialize, Serialize};

use crate::domain::id::{DEFAULT_DIGITS, InvalidPrefixError, Prefix};

/// Store-level configuration.
///
/// Lives in the `config` section of the active requirements document; the
/// archive document carries a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// The alphabetic prefix of new requirement IDs, e.g. `REQ`.
    #[serde(default = "default_prefix")]
    prefix: String,

    /// The number of digits in the ID.
    ///
    /// Digits are padded to this width with leading zeros.
    #[serde(default = "default_digits")]
    digits: usize,

    /// The highest ID number ever minted.
    ///
    /// New IDs are always above both this and every ID present in either
    /// store, so numbers are never reused.
    #[serde(default)]
    pub(crate) last_id: usize,

    /// Globs (relative to the project root) selecting test files.
    #[serde(default = "default_test_globs")]
    pub test_globs: Vec<String>,

    /// Directory names skipped while discovering test files.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Runner recorded on a link when none is given.
    #[serde(default = "default_runner")]
    pub default_runner: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            digits: default_digits(),
            last_id: 0,
            test_globs: default_test_globs(),
            ignore_dirs: default_ignore_dirs(),
            default_runner: default_runner(),
        }
    }
}

impl Config {
    /// Returns the number of digits for padding IDs.
    #[must_use]
    pub const fn digits(&self) -> usize {
        self.digits
    }

    /// The prefix used for new IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured prefix is not uppercase alphabetic.
    pub fn prefix(&self) -> Result<Prefix, InvalidPrefixError> {
        Prefix::new(self.prefix.clone())
    }

    /// Set the prefix used for new IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` is not uppercase alphabetic. The
    /// configuration is unchanged in that case.
    pub fn set_prefix(&mut self, prefix: String) -> Result<(), InvalidPrefixError> {
        let prefix = Prefix::new(prefix)?;
        self.prefix = prefix.as_str().to_string();
        Ok(())
    }

    /// Set the digit width used when displaying IDs.
    pub const fn set_digits(&mut self, digits: usize) {
        self.digits = digits;
    }
}

fn default_prefix() -> String {
    "REQ".to_string()
}

const fn default_digits() -> usize {
    DEFAULT_DIGITS
}

fn default_test_globs() -> Vec<String> {
    [
        "**/*.test.ts",
        "**/*.test.tsx",
        "**/*.test.js",
        "**/*.spec.ts",
        "**/*.spec.tsx",
        "**/*.spec.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_ignore_dirs() -> Vec<String> {
    ["node_modules", ".git", "dist", ".req"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_runner() -> String {
    "jest".to_string()
}
