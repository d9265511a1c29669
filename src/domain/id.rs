use std::{fmt, num::NonZeroUsize, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Width used when an ID is rendered without an explicit digit count.
pub const DEFAULT_DIGITS: usize = 3;

/// A validated ID prefix containing only uppercase alphabetic characters
/// ([A-Z]+).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Prefix(NonEmptyString);

impl Prefix {
    /// Creates a new `Prefix` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefixError` if the string is empty or contains
    /// characters other than uppercase letters (A-Z).
    pub fn new(s: String) -> Result<Self, InvalidPrefixError> {
        let non_empty =
            NonEmptyString::new(s.clone()).map_err(|_| InvalidPrefixError(s.clone()))?;

        if !s.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(InvalidPrefixError(s));
        }

        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Prefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Prefix {
    type Err = InvalidPrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Error returned when a prefix doesn't match the required pattern [A-Z]+.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid prefix '{0}': must be non-empty and contain only uppercase letters (A-Z)")]
pub struct InvalidPrefixError(String);

/// The identifier of a requirement.
///
/// Format: `{PREFIX}-{NUMBER}`, for example `REQ-007`. The number is a
/// positive integer; leading zeros are presentation only, so `REQ-7` and
/// `REQ-007` are the same ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequirementId {
    prefix: Prefix,
    number: NonZeroUsize,
}

impl RequirementId {
    /// Create an ID from pre-validated parts.
    #[must_use]
    pub const fn new(prefix: Prefix, number: NonZeroUsize) -> Self {
        Self { prefix, number }
    }

    /// The alphabetic prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    /// The numeric part.
    #[must_use]
    pub const fn number(&self) -> NonZeroUsize {
        self.number
    }

    /// Returns a displayable representation with the specified digit width.
    ///
    /// ```
    /// use reqtrace::RequirementId;
    ///
    /// let id: RequirementId = "REQ-7".parse().unwrap();
    /// assert_eq!(id.display(3).to_string(), "REQ-007");
    /// assert_eq!(id.display(1).to_string(), "REQ-7");
    /// ```
    #[must_use]
    pub const fn display(&self, digits: usize) -> FormattedId<'_> {
        FormattedId { id: self, digits }
    }
}

/// An ID formatted with a fixed digit width.
///
/// Returned by [`RequirementId::display`].
#[derive(Debug, Clone, Copy)]
pub struct FormattedId<'a> {
    id: &'a RequirementId,
    digits: usize,
}

impl fmt::Display for FormattedId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.id.prefix,
            self.id.number.get(),
            width = self.digits
        )
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.display(DEFAULT_DIGITS).fmt(f)
    }
}

/// Errors that can occur while parsing an ID.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Malformed structure (missing or misplaced `-`).
    #[error("Invalid requirement ID format: {0}")]
    Syntax(String),

    /// The numeric part is not a positive integer.
    #[error("Invalid number in requirement ID '{0}': expected a non-zero integer, got {1}")]
    Number(String, String),

    /// The prefix is not uppercase alphabetic.
    #[error(transparent)]
    Prefix(#[from] InvalidPrefixError),
}

impl FromStr for RequirementId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((prefix, number)) = s.rsplit_once('-') else {
            return Err(Error::Syntax(s.to_string()));
        };
        if prefix.is_empty() || number.is_empty() {
            return Err(Error::Syntax(s.to_string()));
        }

        let number = number
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| Error::Number(s.to_string(), number.to_string()))?;

        Ok(Self::new(Prefix::from_str(prefix)?, number))
    }
}

impl TryFrom<&str> for RequirementId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl Serialize for RequirementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequirementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
